//! Acquiring the interactive map backend.
//!
//! Loading happens off the UI thread: the script fetch runs on a
//! `map-script` worker shared by everyone asking for the same URL, and
//! constructor resolution runs on a per-acquisition `map-acquire` worker.
//! The UI thread only polls.

use super::auth::AuthChannel;
use super::{resolve_constructors, Constructors, MapNamespace};
use crate::error::AcquisitionError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::task::Poll;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Fetches a map library from a URL.
pub trait ScriptTransport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Arc<dyn MapNamespace>, String>;
}

type ScriptOutcome = Result<Arc<dyn MapNamespace>, String>;

enum ScriptEntry {
    Loading(Vec<Sender<ScriptOutcome>>),
    Loaded(Arc<dyn MapNamespace>),
    Failed(String),
}

/// Remembers every script URL requested in this process.
///
/// A URL is fetched at most once: concurrent requests wait on the in-flight
/// fetch and later ones get the remembered outcome.
#[derive(Default)]
pub struct ScriptRegistry {
    entries: Mutex<HashMap<String, ScriptEntry>>,
}

static GLOBAL_REGISTRY: LazyLock<Arc<ScriptRegistry>> = LazyLock::new(Arc::default);

impl ScriptRegistry {
    pub fn global() -> Arc<ScriptRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, ScriptEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn load(self: &Arc<Self>, url: &str, transport: Arc<dyn ScriptTransport>) -> Receiver<ScriptOutcome> {
        let (tx, rx) = mpsc::channel();
        let mut entries = self.entries();
        match entries.get_mut(url) {
            Some(ScriptEntry::Loaded(namespace)) => {
                let _ = tx.send(Ok(Arc::clone(namespace)));
                return rx;
            }
            Some(ScriptEntry::Failed(message)) => {
                let _ = tx.send(Err(message.clone()));
                return rx;
            }
            Some(ScriptEntry::Loading(waiters)) => {
                debug!("map script already loading, attaching");
                waiters.push(tx);
                return rx;
            }
            None => {
                entries.insert(url.to_string(), ScriptEntry::Loading(vec![tx]));
            }
        }
        drop(entries);

        let registry = Arc::clone(self);
        let url_owned = url.to_string();
        let spawned = thread::Builder::new()
            .name("map-script".into())
            .spawn(move || {
                let outcome = transport.fetch(&url_owned);
                registry.finish(&url_owned, outcome);
            });
        if let Err(err) = spawned {
            self.finish(url, Err(format!("could not start loader thread: {err}")));
        }
        rx
    }

    fn finish(&self, url: &str, outcome: ScriptOutcome) {
        let settled = match &outcome {
            Ok(namespace) => ScriptEntry::Loaded(Arc::clone(namespace)),
            Err(message) => ScriptEntry::Failed(message.clone()),
        };
        let previous = self.entries().insert(url.to_string(), settled);
        if let Some(ScriptEntry::Loading(waiters)) = previous {
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        }
    }
}

/// Starts acquisitions against one map provider.
#[derive(Clone)]
pub struct MapLoader {
    provider_url: String,
    transport: Arc<dyn ScriptTransport>,
    registry: Arc<ScriptRegistry>,
}

impl MapLoader {
    pub fn new(provider_url: &str, transport: Arc<dyn ScriptTransport>) -> Self {
        Self::with_registry(provider_url, transport, ScriptRegistry::global())
    }

    pub fn with_registry(
        provider_url: &str,
        transport: Arc<dyn ScriptTransport>,
        registry: Arc<ScriptRegistry>,
    ) -> Self {
        Self {
            provider_url: provider_url.to_string(),
            transport,
            registry,
        }
    }

    /// Resource URL for a key; the key is the cache identity too.
    pub fn script_url(&self, api_key: &str) -> String {
        let separator = if self.provider_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}key={}&loading=async",
            self.provider_url,
            separator,
            urlencoding::encode(api_key)
        )
    }

    /// Begin acquiring the backend. Without a key the returned acquisition is
    /// already resolved with `MissingCredential` and nothing is fetched.
    pub fn acquire(&self, api_key: Option<&str>, timeout: Duration, now: Instant) -> Acquisition {
        let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) else {
            return Acquisition::resolved(AcquisitionError::MissingCredential, now);
        };

        let url = self.script_url(key);
        info!(provider = %self.provider_url, timeout_ms = timeout.as_millis() as u64, "acquiring map backend");
        let script_rx = self.registry.load(&url, Arc::clone(&self.transport));

        let auth = AuthChannel::new();
        let notifier = auth.notifier();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let worker_cancel = Arc::clone(&cancel);

        let spawned = thread::Builder::new()
            .name("map-acquire".into())
            .spawn(move || {
                let outcome = match script_rx.recv() {
                    Ok(Ok(namespace)) => {
                        namespace.register_auth_listener(notifier);
                        resolve_constructors(namespace.as_ref())
                    }
                    Ok(Err(message)) => Err(AcquisitionError::ScriptLoadFailure(message)),
                    Err(_) => Err(AcquisitionError::ScriptLoadFailure("script loader went away".into())),
                };
                if !worker_cancel.load(Ordering::Acquire) {
                    let _ = tx.send(outcome);
                }
            });
        if let Err(err) = spawned {
            return Acquisition::resolved(
                AcquisitionError::ScriptLoadFailure(format!("could not start acquisition thread: {err}")),
                now,
            );
        }

        Acquisition {
            deadline: now + timeout,
            state: State::Loading { rx, auth, cancel },
        }
    }
}

/// A successfully acquired backend plus the auth channel that keeps
/// watching it.
pub struct Acquired {
    pub constructors: Constructors,
    pub auth: AuthChannel,
}

enum State {
    Failed(AcquisitionError),
    Loading {
        rx: Receiver<Result<Constructors, AcquisitionError>>,
        auth: AuthChannel,
        cancel: Arc<AtomicBool>,
    },
    Settled,
}

/// A pending backend acquisition. Resolves exactly once.
pub struct Acquisition {
    deadline: Instant,
    state: State,
}

impl Acquisition {
    fn resolved(error: AcquisitionError, now: Instant) -> Self {
        Self {
            deadline: now,
            state: State::Failed(error),
        }
    }

    /// Drive the race between the load, auth rejection and the deadline.
    ///
    /// Signals already delivered win over the deadline. After the first
    /// `Ready` every further poll is `Pending`.
    pub fn poll(&mut self, now: Instant) -> Poll<Result<Acquired, AcquisitionError>> {
        let outcome = match &self.state {
            State::Settled => return Poll::Pending,
            State::Failed(_) => None,
            State::Loading { rx, auth, .. } => {
                if let Some(failure) = auth.try_take() {
                    warn!(reason = %failure.reason, "map provider rejected credentials during load");
                    Some(Err(AcquisitionError::AuthRejected))
                } else {
                    match rx.try_recv() {
                        Ok(result) => Some(result),
                        Err(TryRecvError::Disconnected) => Some(Err(AcquisitionError::ScriptLoadFailure(
                            "acquisition worker exited".into(),
                        ))),
                        Err(TryRecvError::Empty) if now >= self.deadline => Some(Err(AcquisitionError::Timeout)),
                        Err(TryRecvError::Empty) => None,
                    }
                }
            }
        };

        match (std::mem::replace(&mut self.state, State::Settled), outcome) {
            (State::Failed(error), _) => Poll::Ready(Err(error)),
            (State::Loading { auth, cancel, .. }, Some(Ok(constructors))) => {
                cancel.store(true, Ordering::Release);
                Poll::Ready(Ok(Acquired { constructors, auth }))
            }
            (State::Loading { auth, cancel, .. }, Some(Err(error))) => {
                cancel.store(true, Ordering::Release);
                auth.dispose();
                Poll::Ready(Err(error))
            }
            (state, None) => {
                self.state = state;
                Poll::Pending
            }
            (State::Settled, Some(_)) => Poll::Pending,
        }
    }

    /// Stop listening; whatever the workers produce later is discarded.
    pub fn cancel(&mut self) {
        if let State::Loading { auth, cancel, .. } = std::mem::replace(&mut self.state, State::Settled) {
            cancel.store(true, Ordering::Release);
            auth.dispose();
        }
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Per-controller channel for provider authentication failures.
//!
//! A map library reports a rejected key through every notifier registered
//! with it. Each view owns its own channel; once the view disposes the
//! channel, its notifier silently drops further reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    pub reason: String,
}

/// Sending half handed to the map library.
#[derive(Clone)]
pub struct AuthNotifier {
    tx: Sender<AuthFailure>,
    disposed: Arc<AtomicBool>,
}

impl AuthNotifier {
    /// Report a failure. Returns false when the owning view is gone.
    pub fn notify(&self, reason: &str) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.tx
            .send(AuthFailure {
                reason: reason.to_string(),
            })
            .is_ok()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Receiving half, polled from the UI thread.
pub struct AuthChannel {
    rx: Receiver<AuthFailure>,
    notifier: AuthNotifier,
}

impl AuthChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            rx,
            notifier: AuthNotifier {
                tx,
                disposed: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    pub fn notifier(&self) -> AuthNotifier {
        self.notifier.clone()
    }

    pub fn try_take(&self) -> Option<AuthFailure> {
        if self.notifier.is_disposed() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn dispose(&self) {
        self.notifier.disposed.store(true, Ordering::Release);
    }
}

impl Default for AuthChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AuthChannel {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[derive(Default)]
struct ListenerState {
    listeners: Vec<AuthNotifier>,
    rejected: Option<String>,
}

/// Registry a map library keeps of the notifiers attached to it.
///
/// A rejection is latched: notifiers registered after the fact hear about it
/// immediately.
#[derive(Default)]
pub struct AuthListeners {
    state: Mutex<ListenerState>,
}

impl AuthListeners {
    pub fn rejected(reason: &str) -> Self {
        Self {
            state: Mutex::new(ListenerState {
                listeners: Vec::new(),
                rejected: Some(reason.to_string()),
            }),
        }
    }

    pub fn register(&self, notifier: AuthNotifier) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.rejected {
            Some(reason) => {
                notifier.notify(reason);
            }
            None => {
                state.listeners.retain(|n| !n.is_disposed());
                state.listeners.push(notifier);
            }
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rejected
            .is_some()
    }

    pub fn fire(&self, reason: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.rejected = Some(reason.to_string());
        for notifier in state.listeners.drain(..) {
            notifier.notify(reason);
        }
    }
}

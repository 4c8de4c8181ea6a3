//! Map backend served as a TileJSON manifest over HTTP.
//!
//! TileJSON 3 manifests expose the library importer; older manifests only
//! expose the direct constructors. A 401/403 response or a `REQUEST_DENIED`
//! status means the key was refused, which is reported through the auth
//! listeners rather than as a load failure. Once loaded, the manifest is
//! fetched again every few minutes so a key revoked mid-session is noticed.

use super::auth::{AuthListeners, AuthNotifier};
use super::loader::ScriptTransport;
use super::surface::{BrailleSurfaceFactory, DotMarkerFactory};
use super::{Library, LibraryImporter, MapNamespace, MarkerFactory, SurfaceFactory};
use serde::Deserialize;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_PROVIDER_URL: &str = "https://tiles.openfreemap.org/planet";
pub const RECHECK_EVERY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TileManifest {
    #[serde(default)]
    pub tilejson: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tiles: Vec<String>,
    #[serde(default)]
    pub minzoom: Option<f64>,
    #[serde(default)]
    pub maxzoom: Option<f64>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TileManifest {
    /// Major TileJSON version; manifests without one are treated as 2.x.
    pub fn major_version(&self) -> u32 {
        self.tilejson
            .as_deref()
            .and_then(|v| v.split('.').next())
            .and_then(|major| major.trim().parse().ok())
            .unwrap_or(2)
    }

    pub fn is_denied(&self) -> bool {
        self.status.as_deref() == Some("REQUEST_DENIED")
    }
}

pub struct HttpTransport {
    agent: ureq::Agent,
    recheck: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            recheck: RECHECK_EVERY,
        }
    }
}

/// Why a fresh fetch of the manifest refuses the key, if it does.
/// `Err(Some(code))` is an HTTP status, `Err(None)` a transport failure.
fn refusal(outcome: Result<TileManifest, Option<u16>>) -> Option<String> {
    match outcome {
        Ok(manifest) if manifest.is_denied() => Some("REQUEST_DENIED".to_string()),
        Err(Some(code @ (401 | 403))) => Some(format!("HTTP {}", code)),
        _ => None,
    }
}

fn recheck(agent: &ureq::Agent, url: &str) -> Option<String> {
    let outcome = match agent.get(url).call() {
        Ok(response) => response.into_json::<TileManifest>().map_err(|_| None),
        Err(ureq::Error::Status(code, _)) => Err(Some(code)),
        Err(e) => {
            debug!(error = %e, "manifest recheck failed");
            Err(None)
        }
    };
    refusal(outcome)
}

/// Re-fetch the manifest every `every` until the key is refused or the
/// namespace is dropped.
fn watch(agent: ureq::Agent, url: String, namespace: Weak<TileNamespace>, every: Duration) {
    thread::spawn(move || loop {
        thread::sleep(every);
        let Some(namespace) = namespace.upgrade() else {
            return;
        };
        if let Some(reason) = recheck(&agent, &url) {
            namespace.revoke(&reason);
            return;
        }
    });
}

impl ScriptTransport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Arc<dyn MapNamespace>, String> {
        match self.agent.get(url).call() {
            Ok(response) => {
                let manifest: TileManifest = response
                    .into_json()
                    .map_err(|e| format!("invalid tile manifest: {}", e))?;
                debug!(
                    name = manifest.name.as_deref().unwrap_or("unnamed"),
                    version = manifest.major_version(),
                    "tile manifest loaded"
                );
                let namespace = Arc::new(TileNamespace::from_manifest(manifest));
                if !namespace.is_refused() {
                    watch(self.agent.clone(), url.to_string(), Arc::downgrade(&namespace), self.recheck);
                }
                Ok(namespace)
            }
            Err(ureq::Error::Status(code @ (401 | 403), _)) => {
                warn!(status = code, "map provider refused the key");
                Ok(Arc::new(TileNamespace::denied(&format!("HTTP {}", code))))
            }
            Err(ureq::Error::Status(code, _)) => Err(format!("HTTP {}", code)),
            Err(e) => Err(e.to_string()),
        }
    }
}

struct TileImporter {
    surfaces: Option<Arc<BrailleSurfaceFactory>>,
    markers: Arc<DotMarkerFactory>,
}

impl LibraryImporter for TileImporter {
    fn import(&self, name: &str) -> Result<Library, String> {
        match name {
            "maps" => self
                .surfaces
                .as_ref()
                .map(|f| Library::Maps(Arc::clone(f) as Arc<dyn SurfaceFactory>))
                .ok_or_else(|| "manifest lists no tile sources".to_string()),
            "marker" => Ok(Library::Marker(Arc::clone(&self.markers) as Arc<dyn MarkerFactory>)),
            other => Err(format!("unknown library {:?}", other)),
        }
    }
}

/// Namespace built from one manifest.
pub struct TileNamespace {
    importer: Option<TileImporter>,
    surfaces: Option<Arc<BrailleSurfaceFactory>>,
    markers: Arc<DotMarkerFactory>,
    auth: AuthListeners,
}

impl TileNamespace {
    pub fn from_manifest(manifest: TileManifest) -> Self {
        if manifest.is_denied() {
            return Self::denied("REQUEST_DENIED");
        }
        let surfaces = (!manifest.tiles.is_empty()).then(|| {
            Arc::new(BrailleSurfaceFactory::new(
                manifest.minzoom.unwrap_or(0.0),
                manifest.maxzoom.unwrap_or(18.0),
                manifest.attribution.clone(),
            ))
        });
        let markers = Arc::new(DotMarkerFactory);
        let importer = (manifest.major_version() >= 3).then(|| TileImporter {
            surfaces: surfaces.clone(),
            markers: Arc::clone(&markers),
        });
        Self {
            importer,
            surfaces,
            markers,
            auth: AuthListeners::default(),
        }
    }

    /// The provider refused the key after load; every listener hears it.
    pub fn revoke(&self, reason: &str) {
        warn!(reason, "map provider refused the key after load");
        self.auth.fire(reason);
    }

    fn is_refused(&self) -> bool {
        self.auth.is_rejected()
    }

    fn denied(reason: &str) -> Self {
        Self {
            importer: None,
            surfaces: None,
            markers: Arc::new(DotMarkerFactory),
            auth: AuthListeners::rejected(reason),
        }
    }
}

impl MapNamespace for TileNamespace {
    fn importer(&self) -> Option<&dyn LibraryImporter> {
        self.importer.as_ref().map(|i| i as &dyn LibraryImporter)
    }

    fn legacy_surface(&self) -> Option<Arc<dyn SurfaceFactory>> {
        self.surfaces
            .as_ref()
            .map(|f| Arc::clone(f) as Arc<dyn SurfaceFactory>)
    }

    fn legacy_marker(&self) -> Option<Arc<dyn MarkerFactory>> {
        Some(Arc::clone(&self.markers) as Arc<dyn MarkerFactory>)
    }

    fn register_auth_listener(&self, notifier: AuthNotifier) {
        self.auth.register(notifier);
    }
}

//! Interactive map backend: the collaborator contracts and constructor
//! resolution.
//!
//! A backend is reached through a [`MapNamespace`] that a
//! [`loader::ScriptTransport`] fetched. The namespace exposes map and marker
//! constructors either through a modern "import library by name" accessor or
//! through legacy direct properties; [`probe`] decides which shape is
//! present once, during acquisition.

pub mod auth;
pub mod http;
pub mod loader;
pub mod surface;
#[cfg(test)]
pub mod testing;

use crate::colors::MarkerColor;
use crate::error::AcquisitionError;
use crate::geo::{GeoBounds, GeoPoint};
use crate::terminal::Terminal;
use auth::AuthNotifier;
use std::sync::Arc;
use tracing::{debug, warn};

pub type ClickListener = Box<dyn Fn()>;

/// What a marker shows.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: GeoPoint,
    pub title: String,
    pub color: MarkerColor,
    pub scale: f32,
    pub pulsing: bool,
}

/// A visual marker bound to one position on the map surface.
pub trait Marker {
    fn spec(&self) -> &MarkerSpec;
    fn add_click_listener(&mut self, listener: ClickListener);
    /// Dispatch a click to the registered listeners.
    fn click(&self);
    /// Detach from the surface; a released marker is never drawn again.
    fn release(&mut self);
    fn is_attached(&self) -> bool;
}

pub trait MarkerFactory: Send + Sync {
    fn create(&self, spec: MarkerSpec) -> Box<dyn Marker>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub center: GeoPoint,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceOptions {
    pub center: GeoPoint,
    pub zoom: f64,
    /// Size in terminal cells.
    pub viewport: (u16, u16),
}

/// An interactive, pannable map.
pub trait MapSurface {
    fn camera(&self) -> Camera;
    fn pan_to(&mut self, center: GeoPoint);
    fn set_zoom(&mut self, zoom: f64);
    fn fit_bounds(&mut self, bounds: &GeoBounds);
    fn resize(&mut self, cols: u16, rows: u16);
    /// Cell a point falls on, `None` when off screen.
    fn locate(&self, point: GeoPoint) -> Option<(u16, u16)>;
    fn draw(&self, term: &mut Terminal, markers: &[&MarkerSpec], frame: u64);
    fn attribution(&self) -> Option<&str> {
        None
    }
}

pub trait SurfaceFactory: Send + Sync {
    fn create(&self, options: &SurfaceOptions) -> Box<dyn MapSurface>;
}

/// Result of importing a library by name.
pub enum Library {
    Maps(Arc<dyn SurfaceFactory>),
    Marker(Arc<dyn MarkerFactory>),
}

/// Modern accessor: load a named sub-library. May block.
pub trait LibraryImporter: Send + Sync {
    fn import(&self, name: &str) -> Result<Library, String>;
}

/// A loaded map library.
pub trait MapNamespace: Send + Sync {
    fn importer(&self) -> Option<&dyn LibraryImporter>;
    fn legacy_surface(&self) -> Option<Arc<dyn SurfaceFactory>>;
    fn legacy_marker(&self) -> Option<Arc<dyn MarkerFactory>>;
    fn register_auth_listener(&self, notifier: AuthNotifier);
}

/// Map and marker constructors resolved from a namespace.
#[derive(Clone)]
pub struct Constructors {
    pub surface: Arc<dyn SurfaceFactory>,
    pub marker: Arc<dyn MarkerFactory>,
}

/// The live interactive backend owned by a view.
pub struct BackendHandle {
    pub surface: Box<dyn MapSurface>,
    pub markers: Arc<dyn MarkerFactory>,
}

/// Which accessor shape a namespace offers.
pub enum Accessor<'a> {
    Modern(&'a dyn LibraryImporter),
    Legacy(Constructors),
    Unavailable,
}

pub fn probe(namespace: &dyn MapNamespace) -> Accessor<'_> {
    if let Some(importer) = namespace.importer() {
        return Accessor::Modern(importer);
    }
    match (namespace.legacy_surface(), namespace.legacy_marker()) {
        (Some(surface), Some(marker)) => Accessor::Legacy(Constructors { surface, marker }),
        _ => Accessor::Unavailable,
    }
}

/// Resolve both constructors, modern accessor first, legacy per constructor
/// as the fallback.
pub fn resolve_constructors(namespace: &dyn MapNamespace) -> Result<Constructors, AcquisitionError> {
    match probe(namespace) {
        Accessor::Modern(importer) => {
            debug!("resolving map constructors through the library importer");
            let surface = import_surface(importer).or_else(|| namespace.legacy_surface());
            let marker = import_marker(importer).or_else(|| namespace.legacy_marker());
            match (surface, marker) {
                (Some(surface), Some(marker)) => Ok(Constructors { surface, marker }),
                _ => Err(AcquisitionError::ConstructorUnavailable),
            }
        }
        Accessor::Legacy(constructors) => {
            debug!("resolving map constructors through legacy properties");
            Ok(constructors)
        }
        Accessor::Unavailable => Err(AcquisitionError::ConstructorUnavailable),
    }
}

fn import_surface(importer: &dyn LibraryImporter) -> Option<Arc<dyn SurfaceFactory>> {
    match importer.import("maps") {
        Ok(Library::Maps(factory)) => Some(factory),
        Ok(Library::Marker(_)) => {
            warn!("importing \"maps\" returned the marker library");
            None
        }
        Err(err) => {
            warn!(error = %err, "failed to import the maps library");
            None
        }
    }
}

fn import_marker(importer: &dyn LibraryImporter) -> Option<Arc<dyn MarkerFactory>> {
    match importer.import("marker") {
        Ok(Library::Marker(factory)) => Some(factory),
        Ok(Library::Maps(_)) => {
            warn!("importing \"marker\" returned the maps library");
            None
        }
        Err(err) => {
            warn!(error = %err, "failed to import the marker library");
            None
        }
    }
}

//! Error types shared across the crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a map backend could not be acquired.
///
/// None of these are fatal: every variant routes the view to the offline
/// vector renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    #[error("no map API key configured")]
    MissingCredential,
    #[error("map backend did not become ready in time")]
    Timeout,
    #[error("map provider rejected the API key")]
    AuthRejected,
    #[error("map library exposes no usable map/marker constructors")]
    ConstructorUnavailable,
    #[error("map library failed to load: {0}")]
    ScriptLoadFailure(String),
}

/// Invalid coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
}

/// Top-level application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid settings file {path:?}: {message}")]
    Settings { path: PathBuf, message: String },
    #[error("invalid target roster {path:?}: {message}")]
    Roster { path: PathBuf, message: String },
    #[error("unknown target id {0:?}")]
    UnknownTarget(String),
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error("failed to install logger: {0}")]
    Logging(String),
}

//! Tracing subscriber setup.

use crate::error::AppError;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Environment variable with the log filter directives.
pub const LOG_ENV: &str = "TACMAP_LOG";

pub enum LogTarget {
    Stderr,
    /// Used while the terminal is in the alternate screen.
    File(PathBuf),
}

pub fn log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tacmap")
        .join("tacmap.log")
}

pub fn init(target: LogTarget) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(io::stderr).try_init(),
        LogTarget::File(path) => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
    };
    installed.map_err(|e| AppError::Logging(e.to_string()))
}

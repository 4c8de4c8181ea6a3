use crate::backend::http::DEFAULT_PROVIDER_URL;
use crate::backend::loader::DEFAULT_TIMEOUT;
use crate::controller::ControllerConfig;
use crate::error::AppError;
use crate::geo::LocatableEntity;
use crate::settings::Settings;
use crate::share::DEFAULT_ORIGIN;
use crate::targets;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the map API key.
pub const API_KEY_ENV: &str = "TACMAP_API_KEY";

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub provider_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub targets: Option<PathBuf>,
    pub origin: Option<String>,
}

/// Resolved configuration for a map session
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub api_key: Option<String>,
    pub provider_url: String,
    pub timeout: Duration,
    pub targets: Option<PathBuf>,
    pub share_origin: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl MapConfig {
    /// Precedence: command line, then environment (key only), then the
    /// settings file, then built-in defaults.
    pub fn resolve(settings: Settings, env_key: Option<String>, overrides: Overrides) -> Self {
        let map = settings.map;
        Self {
            api_key: non_blank(overrides.api_key)
                .or_else(|| non_blank(env_key))
                .or_else(|| non_blank(map.api_key)),
            provider_url: non_blank(overrides.provider_url)
                .or_else(|| non_blank(map.provider_url))
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            timeout: overrides
                .timeout_ms
                .or(map.timeout_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
            targets: overrides.targets.or(map.targets),
            share_origin: non_blank(overrides.origin)
                .or_else(|| non_blank(settings.share.origin))
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
        }
    }

    pub fn controller_config(&self, viewport: (u16, u16)) -> ControllerConfig {
        let mut config = ControllerConfig::new(self.api_key.clone());
        config.timeout = self.timeout;
        config.surface.viewport = viewport;
        config
    }

    /// The configured roster file, or the demo roster.
    pub fn roster(&self) -> Result<Vec<LocatableEntity>, AppError> {
        match &self.targets {
            Some(path) => targets::load(path),
            None => Ok(targets::demo()),
        }
    }
}

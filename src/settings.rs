use crate::error::AppError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub map: MapSettings,
    #[serde(default)]
    pub share: ShareSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct MapSettings {
    pub api_key: Option<String>,
    pub provider_url: Option<String>, // TileJSON manifest URL
    pub timeout_ms: Option<u64>,
    pub targets: Option<PathBuf>, // Roster file (JSON or TOML)
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareSettings {
    pub origin: Option<String>, // Base URL of shared links
}

impl Settings {
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tacmap")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(settings.map.api_key.is_none());
        assert!(settings.share.origin.is_none());
    }

    #[test]
    fn reads_map_and_share_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[map]
api_key = "abc"
provider_url = "https://tiles.example/planet"
timeout_ms = 2500
targets = "/tmp/roster.json"

[share]
origin = "https://ops.example"
"#
        )
        .unwrap();
        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.map.api_key.as_deref(), Some("abc"));
        assert_eq!(settings.map.timeout_ms, Some(2500));
        assert_eq!(settings.map.targets, Some(PathBuf::from("/tmp/roster.json")));
        assert_eq!(settings.share.origin.as_deref(), Some("https://ops.example"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[map\napi_key = ").unwrap();
        assert!(matches!(Settings::load_from(file.path()), Err(AppError::Settings { .. })));
    }
}

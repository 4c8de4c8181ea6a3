//! Target rosters: the built-in demo set and JSON/TOML roster files.

use crate::error::AppError;
use crate::geo::{GeoPoint, LocatableEntity, RiskTier};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    targets: Vec<LocatableEntity>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonRoster {
    List(Vec<LocatableEntity>),
    File(RosterFile),
}

pub fn demo() -> Vec<LocatableEntity> {
    vec![
        LocatableEntity::new("T-001", "PHANTOM", RiskTier::Critical, GeoPoint::new(48.8566, 2.3522).ok()),
        LocatableEntity::new("T-002", "VIPER", RiskTier::High, GeoPoint::new(35.6762, 139.6503).ok()),
        LocatableEntity::new("T-003", "GHOST", RiskTier::Medium, GeoPoint::new(40.7128, -74.0060).ok()),
        LocatableEntity::new("T-004", "WRAITH", RiskTier::Low, None),
    ]
}

/// Load a roster. `.toml` files use `[[targets]]` tables; anything else is
/// read as JSON, either a bare array or `{ "targets": [...] }`.
pub fn load(path: &Path) -> Result<Vec<LocatableEntity>, AppError> {
    let content = fs::read_to_string(path)?;
    let invalid = |message: String| AppError::Roster {
        path: path.to_path_buf(),
        message,
    };
    let is_toml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        let file: RosterFile = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        return Ok(file.targets);
    }
    match serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))? {
        JsonRoster::List(targets) => Ok(targets),
        JsonRoster::File(file) => Ok(file.targets),
    }
}

//! Geographic value types: points, bounds and the entities placed on the map.

use crate::error::GeoError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    lat: f64,
    #[serde(alias = "lon")]
    lng: f64,
}

/// Where the map opens and what is reported when nothing is selected.
pub const DEFAULT_CENTER: GeoPoint = GeoPoint { lat: 20.0, lng: 0.0 };

impl TryFrom<RawPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lng)
    }
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::Longitude(lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*}, {:.*}", p, self.lat, p, self.lng),
            None => write!(f, "{}, {}", self.lat, self.lng),
        }
    }
}

/// Threat classification of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Critical => "CRITICAL",
        }
    }
}

/// Something trackable with an optional last known position.
///
/// Accepts the dashboard export field names (`codeName`, `riskLevel`,
/// `lastKnownLocation`) as well as the short ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatableEntity {
    pub id: String,
    #[serde(alias = "codeName")]
    pub label: String,
    #[serde(alias = "riskLevel")]
    pub risk: RiskTier,
    #[serde(default, alias = "lastKnownLocation")]
    pub location: Option<GeoPoint>,
}

impl LocatableEntity {
    pub fn new(id: &str, label: &str, risk: RiskTier, location: Option<GeoPoint>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            risk,
            location,
        }
    }
}

/// Find an entity's position by id. The first entity with that id that has a
/// location wins, the same entity that gets the marker or pin.
pub fn location_of(entities: &[LocatableEntity], id: &str) -> Option<GeoPoint> {
    entities.iter().filter(|e| e.id == id).find_map(|e| e.location)
}

/// Axis-aligned lat/lng rectangle grown point by point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn from_point(p: GeoPoint) -> Self {
        Self {
            south: p.lat,
            west: p.lng,
            north: p.lat,
            east: p.lng,
        }
    }

    pub fn extend(&mut self, p: GeoPoint) {
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
        self.west = self.west.min(p.lng);
        self.east = self.east.max(p.lng);
    }

    /// Bounds of all points, `None` when the iterator is empty.
    pub fn enclosing<I: IntoIterator<Item = GeoPoint>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.south + self.north) / 2.0,
            lng: (self.west + self.east) / 2.0,
        }
    }

    #[cfg(test)]
    pub fn contains(&self, p: GeoPoint) -> bool {
        (self.south..=self.north).contains(&p.lat) && (self.west..=self.east).contains(&p.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert_eq!(GeoPoint::new(91.0, 0.0), Err(GeoError::Latitude(91.0)));
        assert_eq!(GeoPoint::new(0.0, -180.5), Err(GeoError::Longitude(-180.5)));
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn deserializes_dashboard_field_names() {
        let json = r#"{
            "id": "T-001",
            "codeName": "PHANTOM",
            "riskLevel": "CRITICAL",
            "lastKnownLocation": { "lat": 48.8566, "lng": 2.3522 }
        }"#;
        let entity: LocatableEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.label, "PHANTOM");
        assert_eq!(entity.risk, RiskTier::Critical);
        assert_eq!(entity.location.unwrap().lat(), 48.8566);
    }

    #[test]
    fn missing_location_is_none() {
        let json = r#"{ "id": "B", "label": "B", "risk": "LOW" }"#;
        let entity: LocatableEntity = serde_json::from_str(json).unwrap();
        assert!(entity.location.is_none());
    }

    #[test]
    fn location_of_skips_unlocated_duplicates() {
        let paris = GeoPoint::new(48.8566, 2.3522).unwrap();
        let entities = vec![
            LocatableEntity::new("A", "A", RiskTier::Low, None),
            LocatableEntity::new("A", "A", RiskTier::High, Some(paris)),
            LocatableEntity::new("A", "A", RiskTier::High, Some(GeoPoint::new(1.0, 1.0).unwrap())),
        ];
        assert_eq!(location_of(&entities, "A"), Some(paris));
        assert_eq!(location_of(&entities, "B"), None);
    }

    #[test]
    fn invalid_location_fails_to_deserialize() {
        let json = r#"{ "id": "B", "label": "B", "risk": "LOW", "location": { "lat": 120, "lng": 0 } }"#;
        assert!(serde_json::from_str::<LocatableEntity>(json).is_err());
    }

    #[test]
    fn bounds_of_single_point_is_degenerate() {
        let p = GeoPoint::new(48.8566, 2.3522).unwrap();
        let bounds = GeoBounds::enclosing([p]).unwrap();
        assert_eq!(bounds.center(), p);
        assert!(bounds.contains(p));
        assert!(GeoBounds::enclosing(Vec::<GeoPoint>::new()).is_none());
    }

    #[test]
    fn bounds_grow_to_cover_points() {
        let a = GeoPoint::new(48.0, 2.0).unwrap();
        let b = GeoPoint::new(35.0, 139.0).unwrap();
        let bounds = GeoBounds::enclosing([a, b]).unwrap();
        assert_eq!(bounds.south, 35.0);
        assert_eq!(bounds.east, 139.0);
        assert!(bounds.contains(a) && bounds.contains(b));
    }

    #[test]
    fn display_honours_precision() {
        let p = GeoPoint::new(48.8566, 2.3522).unwrap();
        assert_eq!(format!("{:.2}", p), "48.86, 2.35");
    }
}

//! Mercator projections used by both renderers.

use crate::geo::GeoPoint;
use std::f64::consts::{FRAC_PI_4, PI, TAU};

/// Position on the offline canvas, in percent of width and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub x: f64,
    pub y: f64,
}

/// Project lat/lng (degrees) onto a 0..100 square.
///
/// Longitude maps linearly; latitude goes through the Mercator transform and
/// is clamped so polar positions stay on the canvas.
pub fn project(lat: f64, lng: f64) -> Projected {
    let x = (lng + 180.0) * 100.0 / 360.0;
    let merc_n = (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    let y = 50.0 - 100.0 * merc_n / TAU;
    Projected {
        x,
        y: y.clamp(0.0, 100.0),
    }
}

pub fn project_point(p: GeoPoint) -> Projected {
    project(p.lat(), p.lng())
}

/// Latitude where Web Mercator is cut off.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Web Mercator world coordinates in [0, 1] (origin top-left).
pub fn world_unit(lat: f64, lng: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (lng + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    (x, y)
}

/// Inverse of [`world_unit`].
pub fn from_world_unit(x: f64, y: f64) -> (f64, f64) {
    let lng = x * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * y);
    let lat = n.sinh().atan().to_degrees();
    (lat, lng)
}

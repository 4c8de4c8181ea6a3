//! Share links and e-mail reports for the current map location.

use crate::geo::{location_of, GeoPoint, LocatableEntity, DEFAULT_CENTER};
use chrono::{DateTime, SecondsFormat, Utc};

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";

/// Selected entity's position, or the default map center.
pub fn current_location(entities: &[LocatableEntity], selected: Option<&str>) -> GeoPoint {
    selected
        .and_then(|id| location_of(entities, id))
        .unwrap_or(DEFAULT_CENTER)
}

pub fn share_link(origin: &str, location: GeoPoint, selected: Option<&str>) -> String {
    format!(
        "{}/ops?lat={:.6}&lng={:.6}&target={}",
        origin.trim_end_matches('/'),
        location.lat(),
        location.lng(),
        urlencoding::encode(selected.unwrap_or("none"))
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub subject: String,
    pub body: String,
}

pub fn report(origin: &str, location: GeoPoint, selected: Option<&str>, at: DateTime<Utc>) -> Report {
    let subject = format!("Tactical report - coordinates {:.4}", location);
    let body = format!(
        "GEOSPATIAL INTELLIGENCE REPORT\n\
         -----------------------------------\n\
         CLASSIFICATION: CONFIDENTIAL\n\
         DATE: {date}\n\
         \n\
         TARGET LOCATION:\n\
         Latitude: {lat}\n\
         Longitude: {lng}\n\
         \n\
         TARGET ID: {target}\n\
         \n\
         SECURE LINK:\n\
         {link}\n\
         \n\
         -----------------------------------\n\
         Generated by tacmap\n",
        date = at.to_rfc3339_opts(SecondsFormat::Millis, true),
        lat = location.lat(),
        lng = location.lng(),
        target = selected.unwrap_or("N/A"),
        link = format!(
            "{}/ops?lat={}&lng={}",
            origin.trim_end_matches('/'),
            location.lat(),
            location.lng()
        ),
    );
    Report { subject, body }
}

impl Report {
    pub fn mailto(&self) -> String {
        format!(
            "mailto:?subject={}&body={}",
            urlencoding::encode(&self.subject),
            urlencoding::encode(&self.body)
        )
    }
}

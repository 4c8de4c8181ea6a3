//! Keeps backend markers in step with the entity list and the selection.
//!
//! Every pass throws the previous markers away and builds a fresh set, so the
//! live markers always match the located entities of the latest input.

use crate::backend::{BackendHandle, MapSurface, Marker, MarkerSpec};
use crate::colors::MarkerColor;
use crate::geo::{GeoBounds, GeoPoint, LocatableEntity};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, warn};

/// Host hook invoked with the id of a clicked entity.
pub type SelectionCallback = Rc<dyn Fn(&str)>;

pub const SELECTED_ZOOM: f64 = 12.0;
pub const SELECTED_SCALE: f32 = 12.0;
pub const DEFAULT_SCALE: f32 = 8.0;

/// A backend marker bound to one entity. Released when dropped.
pub struct MarkerHandle {
    entity_id: String,
    marker: Box<dyn Marker>,
}

impl MarkerHandle {
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn spec(&self) -> &MarkerSpec {
        self.marker.spec()
    }
}

impl Drop for MarkerHandle {
    fn drop(&mut self) {
        self.marker.release();
    }
}

/// How the camera was placed by a sync pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Framing {
    Selected(GeoPoint),
    Bounds(GeoBounds),
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncReport {
    pub markers: usize,
    pub framing: Framing,
}

#[derive(Default)]
pub struct MarkerSynchronizer {
    handles: Vec<MarkerHandle>,
}

impl MarkerSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(
        &mut self,
        entities: &[LocatableEntity],
        selected: Option<&str>,
        backend: &mut BackendHandle,
        on_select: &SelectionCallback,
    ) -> SyncReport {
        self.release_all();

        let mut seen = HashSet::new();
        for entity in entities {
            let Some(position) = entity.location else {
                continue;
            };
            if !seen.insert(entity.id.as_str()) {
                warn!(id = %entity.id, "duplicate entity id, keeping the first");
                continue;
            }
            let is_selected = selected == Some(entity.id.as_str());
            let spec = MarkerSpec {
                position,
                title: entity.label.clone(),
                color: MarkerColor::for_risk(entity.risk),
                scale: if is_selected { SELECTED_SCALE } else { DEFAULT_SCALE },
                pulsing: is_selected,
            };
            let mut marker = backend.markers.create(spec);
            let callback = Rc::clone(on_select);
            let id = entity.id.clone();
            marker.add_click_listener(Box::new(move || callback(&id)));
            self.handles.push(MarkerHandle {
                entity_id: entity.id.clone(),
                marker,
            });
        }

        let target = selected.and_then(|id| self.handles.iter().find(|h| h.entity_id() == id));
        let framing = match target.map(|h| h.spec().position) {
            Some(target) => {
                backend.surface.pan_to(target);
                backend.surface.set_zoom(SELECTED_ZOOM);
                Framing::Selected(target)
            }
            None => match GeoBounds::enclosing(self.handles.iter().map(|h| h.spec().position)) {
                Some(bounds) => {
                    backend.surface.fit_bounds(&bounds);
                    Framing::Bounds(bounds)
                }
                None => Framing::Unchanged,
            },
        };

        debug!(markers = self.handles.len(), ?framing, "markers synchronized");
        SyncReport {
            markers: self.handles.len(),
            framing,
        }
    }

    pub fn release_all(&mut self) {
        self.handles.clear();
    }

    /// Click the marker drawn at (or right next to) a cell. Returns the
    /// entity id that received the click.
    pub fn click_at(&self, col: u16, row: u16, surface: &dyn MapSurface) -> Option<&str> {
        let hit = self
            .handles
            .iter()
            .filter_map(|h| {
                let (c, r) = surface.locate(h.spec().position)?;
                let distance = c.abs_diff(col).max(r.abs_diff(row));
                (distance <= 1).then_some((distance, h))
            })
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, h)| h)?;
        hit.marker.click();
        Some(hit.entity_id())
    }

    pub fn specs(&self) -> Vec<&MarkerSpec> {
        self.handles
            .iter()
            .filter(|h| h.marker.is_attached())
            .map(MarkerHandle::spec)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{FakeMarkerFactory, FakeSurfaceFactory, SurfaceOp};
    use crate::backend::{MarkerFactory, SurfaceFactory, SurfaceOptions};
    use crate::geo::RiskTier;
    use std::cell::RefCell;
    use std::sync::Arc;

    struct Rig {
        surfaces: Arc<FakeSurfaceFactory>,
        markers: Arc<FakeMarkerFactory>,
        backend: BackendHandle,
    }

    fn rig() -> Rig {
        let surfaces = Arc::new(FakeSurfaceFactory::default());
        let markers = Arc::new(FakeMarkerFactory::default());
        let surface = surfaces.create(&SurfaceOptions {
            center: GeoPoint::new(20.0, 0.0).unwrap(),
            zoom: 2.0,
            viewport: (361, 181),
        });
        let backend = BackendHandle {
            surface,
            markers: Arc::clone(&markers) as Arc<dyn MarkerFactory>,
        };
        Rig {
            surfaces,
            markers,
            backend,
        }
    }

    fn noop() -> SelectionCallback {
        Rc::new(|_: &str| {})
    }

    fn located(id: &str, risk: RiskTier, lat: f64, lng: f64) -> LocatableEntity {
        LocatableEntity::new(id, id, risk, Some(GeoPoint::new(lat, lng).unwrap()))
    }

    fn paris() -> LocatableEntity {
        located("A", RiskTier::Critical, 48.8566, 2.3522)
    }

    #[test]
    fn single_unselected_entity_fits_bounds() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        let report = sync.sync(&[paris()], None, &mut rig.backend, &noop());

        assert_eq!(report.markers, 1);
        let p = GeoPoint::new(48.8566, 2.3522).unwrap();
        assert_eq!(report.framing, Framing::Bounds(GeoBounds::from_point(p)));
        assert_eq!(rig.surfaces.ops(), vec![SurfaceOp::FitBounds(GeoBounds::from_point(p))]);
        assert_eq!(rig.markers.live(), 1);
    }

    #[test]
    fn selected_entity_is_centered_and_unlocated_skipped() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        let entities = vec![paris(), LocatableEntity::new("B", "B", RiskTier::Low, None)];
        let report = sync.sync(&entities, Some("A"), &mut rig.backend, &noop());

        assert_eq!(report.markers, 1);
        let p = GeoPoint::new(48.8566, 2.3522).unwrap();
        assert_eq!(rig.backend.surface.camera().center, p);
        assert_eq!(rig.backend.surface.camera().zoom, SELECTED_ZOOM);
        assert_eq!(
            rig.surfaces.ops(),
            vec![SurfaceOp::PanTo(p), SurfaceOp::SetZoom(SELECTED_ZOOM)]
        );
    }

    #[test]
    fn marker_style_follows_risk_and_selection() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        let entities = vec![paris(), located("C", RiskTier::Medium, 40.7128, -74.0060)];
        sync.sync(&entities, Some("C"), &mut rig.backend, &noop());

        let specs = sync.specs();
        assert_eq!(specs[0].color, MarkerColor::Alert);
        assert_eq!(specs[0].scale, DEFAULT_SCALE);
        assert!(!specs[0].pulsing);
        assert_eq!(specs[1].color, MarkerColor::Accent);
        assert_eq!(specs[1].scale, SELECTED_SCALE);
        assert!(specs[1].pulsing);
    }

    #[test]
    fn resync_is_idempotent_and_leak_free() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        let entities = vec![paris(), located("C", RiskTier::Medium, 40.7128, -74.0060)];

        let first = sync.sync(&entities, None, &mut rig.backend, &noop());
        let camera = rig.backend.surface.camera();
        let second = sync.sync(&entities, None, &mut rig.backend, &noop());

        assert_eq!(first, second);
        assert_eq!(rig.backend.surface.camera(), camera);
        assert_eq!(rig.markers.created(), 4);
        assert_eq!(rig.markers.live(), 2);
    }

    #[test]
    fn no_located_entities_leaves_camera_alone() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        let entities = vec![LocatableEntity::new("B", "B", RiskTier::Low, None)];
        let report = sync.sync(&entities, Some("B"), &mut rig.backend, &noop());
        assert_eq!(report.framing, Framing::Unchanged);
        assert!(rig.surfaces.ops().is_empty());
    }

    #[test]
    fn duplicate_ids_create_one_marker() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        let entities = vec![paris(), located("A", RiskTier::Low, 10.0, 10.0)];
        sync.sync(&entities, None, &mut rig.backend, &noop());
        assert_eq!(sync.len(), 1);
        assert_eq!(sync.specs()[0].color, MarkerColor::Alert);
    }

    #[test]
    fn selection_centers_on_the_marked_duplicate() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        let entities = vec![LocatableEntity::new("A", "A", RiskTier::Low, None), paris()];
        let report = sync.sync(&entities, Some("A"), &mut rig.backend, &noop());

        let p = GeoPoint::new(48.8566, 2.3522).unwrap();
        assert_eq!(report.markers, 1);
        assert!(sync.specs()[0].pulsing);
        assert_eq!(report.framing, Framing::Selected(p));
        assert_eq!(rig.backend.surface.camera().center, p);
    }

    #[test]
    fn click_reports_entity_id() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        let clicked = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&clicked);
        let on_select: SelectionCallback = Rc::new(move |id: &str| sink.borrow_mut().push(id.to_string()));
        sync.sync(&[paris()], None, &mut rig.backend, &on_select);

        let (col, row) = rig
            .backend
            .surface
            .locate(GeoPoint::new(48.8566, 2.3522).unwrap())
            .unwrap();
        assert_eq!(sync.click_at(col, row, rig.backend.surface.as_ref()), Some("A"));
        assert_eq!(sync.click_at(0, 0, rig.backend.surface.as_ref()), None);
        assert_eq!(*clicked.borrow(), vec!["A".to_string()]);
    }

    #[test]
    fn release_all_detaches_every_marker() {
        let mut rig = rig();
        let mut sync = MarkerSynchronizer::new();
        sync.sync(&[paris()], None, &mut rig.backend, &noop());
        sync.release_all();
        assert!(sync.is_empty());
        assert_eq!(rig.markers.live(), 0);
    }
}

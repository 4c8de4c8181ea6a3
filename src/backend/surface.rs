//! Interactive Web Mercator map drawn with braille dots.

use super::{Camera, ClickListener, MapSurface, Marker, MarkerFactory, MarkerSpec, SurfaceFactory, SurfaceOptions};
use crate::braille::DotCanvas;
use crate::colors::{COASTLINE, GRID, TEXT};
use crate::geo::{GeoBounds, GeoPoint};
use crate::projection::{from_world_unit, world_unit};
use crate::terminal::Terminal;
use crate::world::coastline_edges;

/// Width of the whole world in dots at zoom 0.
pub const TILE_DOTS: f64 = 64.0;
/// Share of the viewport a fitted bounding box may cover.
const FIT_PADDING: f64 = 0.8;

pub struct BrailleSurfaceFactory {
    min_zoom: f64,
    max_zoom: f64,
    attribution: Option<String>,
}

impl BrailleSurfaceFactory {
    pub fn new(min_zoom: f64, max_zoom: f64, attribution: Option<String>) -> Self {
        Self {
            min_zoom,
            max_zoom: max_zoom.max(min_zoom),
            attribution,
        }
    }
}

impl SurfaceFactory for BrailleSurfaceFactory {
    fn create(&self, options: &SurfaceOptions) -> Box<dyn MapSurface> {
        Box::new(BrailleSurface {
            camera: Camera {
                center: options.center,
                zoom: options.zoom.clamp(self.min_zoom, self.max_zoom),
            },
            viewport: options.viewport,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            attribution: self.attribution.clone(),
        })
    }
}

pub struct BrailleSurface {
    camera: Camera,
    viewport: (u16, u16),
    min_zoom: f64,
    max_zoom: f64,
    attribution: Option<String>,
}

impl BrailleSurface {
    fn world_dots(&self) -> f64 {
        TILE_DOTS * self.camera.zoom.exp2()
    }

    fn dot_size(&self) -> (f64, f64) {
        (self.viewport.0 as f64 * 2.0, self.viewport.1 as f64 * 4.0)
    }

    fn to_dots(&self, lat: f64, lng: f64) -> (f64, f64) {
        let scale = self.world_dots();
        let (cx, cy) = world_unit(self.camera.center.lat(), self.camera.center.lng());
        let (x, y) = world_unit(lat, lng);
        let (w, h) = self.dot_size();
        ((x - cx) * scale + w / 2.0, (y - cy) * scale + h / 2.0)
    }

    fn draw_graticule(&self, canvas: &mut DotCanvas) {
        let (w, h) = self.dot_size();
        for lat in (-60..=60).step_by(30) {
            let (_, y) = self.to_dots(lat as f64, 0.0);
            if (0.0..h).contains(&y) {
                canvas.line((0.0, y), (w - 1.0, y), 1);
            }
        }
        for lng in (-180..=180).step_by(30) {
            let (x, _) = self.to_dots(0.0, lng as f64);
            if (0.0..w).contains(&x) {
                canvas.line((x, 0.0), (x, h - 1.0), 1);
            }
        }
    }

    fn draw_coastlines(&self, canvas: &mut DotCanvas) {
        let (w, h) = self.dot_size();
        for (a, b) in coastline_edges() {
            if (a.1 - b.1).abs() > 180.0 {
                continue;
            }
            let from = self.to_dots(a.0, a.1);
            let to = self.to_dots(b.0, b.1);
            if let Some((from, to)) = clip(from, to, w, h) {
                canvas.line(from, to, 2);
            }
        }
    }
}

impl MapSurface for BrailleSurface {
    fn camera(&self) -> Camera {
        self.camera
    }

    fn pan_to(&mut self, center: GeoPoint) {
        self.camera.center = center;
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.camera.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds) {
        let (x1, y1) = world_unit(bounds.north, bounds.west);
        let (x2, y2) = world_unit(bounds.south, bounds.east);
        let (w, h) = self.dot_size();
        let fit = |span: f64, dots: f64| {
            if span < 1e-9 {
                f64::INFINITY
            } else {
                dots * FIT_PADDING / (span * TILE_DOTS)
            }
        };
        let zoom = fit((x2 - x1).abs(), w).min(fit((y2 - y1).abs(), h)).log2();
        let center = if bounds.south == bounds.north && bounds.west == bounds.east {
            bounds.center()
        } else {
            let (lat, lng) = from_world_unit((x1 + x2) / 2.0, (y1 + y2) / 2.0);
            GeoPoint::new(lat, lng).unwrap_or_else(|_| bounds.center())
        };
        self.camera = Camera {
            center,
            zoom: zoom.clamp(self.min_zoom, self.max_zoom),
        };
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.viewport = (cols, rows);
    }

    fn locate(&self, point: GeoPoint) -> Option<(u16, u16)> {
        let (x, y) = self.to_dots(point.lat(), point.lng());
        let (w, h) = self.dot_size();
        if !(0.0..w).contains(&x) || !(0.0..h).contains(&y) {
            return None;
        }
        Some(((x / 2.0) as u16, (y / 4.0) as u16))
    }

    fn draw(&self, term: &mut Terminal, markers: &[&MarkerSpec], frame: u64) {
        let (cols, rows) = self.viewport;
        let mut canvas = DotCanvas::new(cols, rows);
        self.draw_graticule(&mut canvas);
        self.draw_coastlines(&mut canvas);
        canvas.blit(term, |level| if level >= 2 { COASTLINE } else { GRID });

        for spec in markers {
            let Some((col, row)) = self.locate(spec.position) else {
                continue;
            };
            let glyph = match (spec.pulsing, frame / 5 % 2) {
                (true, 0) => '◉',
                (true, _) => '◎',
                (false, _) => '●',
            };
            term.set(col as i32, row as i32, glyph, Some(spec.color.color()), spec.pulsing);
            if spec.pulsing {
                term.set_str(col as i32 + 2, row as i32, &spec.title, Some(TEXT), true);
            }
        }
    }

    fn attribution(&self) -> Option<&str> {
        self.attribution.as_deref()
    }
}

/// Liang-Barsky clip of a segment to the dot area.
fn clip(p: (f64, f64), q: (f64, f64), w: f64, h: f64) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (q.0 - p.0, q.1 - p.1);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (pk, qk) in [(-dx, p.0), (dx, w - 1.0 - p.0), (-dy, p.1), (dy, h - 1.0 - p.1)] {
        if pk == 0.0 {
            if qk < 0.0 {
                return None;
            }
            continue;
        }
        let r = qk / pk;
        if pk < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some(((p.0 + t0 * dx, p.1 + t0 * dy), (p.0 + t1 * dx, p.1 + t1 * dy)))
}

pub struct DotMarkerFactory;

impl MarkerFactory for DotMarkerFactory {
    fn create(&self, spec: MarkerSpec) -> Box<dyn Marker> {
        Box::new(DotMarker {
            spec,
            listeners: Vec::new(),
            attached: true,
        })
    }
}

pub struct DotMarker {
    spec: MarkerSpec,
    listeners: Vec<ClickListener>,
    attached: bool,
}

impl Marker for DotMarker {
    fn spec(&self) -> &MarkerSpec {
        &self.spec
    }

    fn add_click_listener(&mut self, listener: ClickListener) {
        self.listeners.push(listener);
    }

    fn click(&self) {
        if !self.attached {
            return;
        }
        for listener in &self.listeners {
            listener();
        }
    }

    fn release(&mut self) {
        self.attached = false;
        self.listeners.clear();
    }

    fn is_attached(&self) -> bool {
        self.attached
    }
}

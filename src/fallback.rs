//! Offline vector map: Mercator pins on a percentage canvas.

use crate::braille::DotCanvas;
use crate::colors::{MarkerColor, COASTLINE, GRID, TEXT, TEXT_DIM};
use crate::geo::{LocatableEntity, RiskTier};
use crate::projection::{project, project_point};
use crate::terminal::Terminal;
use crate::world::coastline_edges;
use std::collections::HashSet;

/// A located entity placed on the offline canvas (x, y in 0..=100).
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPin {
    pub id: String,
    pub label: String,
    pub risk: RiskTier,
    pub x: f64,
    pub y: f64,
}

/// Pins for every located entity, first occurrence of an id wins.
pub fn pins(entities: &[LocatableEntity]) -> Vec<FallbackPin> {
    let mut seen = HashSet::new();
    entities
        .iter()
        .filter_map(|e| Some((e, e.location?)))
        .filter(|&(e, _)| seen.insert(e.id.as_str()))
        .map(|(e, location)| {
            let p = project_point(location);
            FallbackPin {
                id: e.id.clone(),
                label: e.label.clone(),
                risk: e.risk,
                x: p.x,
                y: p.y,
            }
        })
        .collect()
}

/// Cell a pin is drawn in for a canvas of `cols` x `rows`.
pub fn pin_cell(pin: &FallbackPin, cols: u16, rows: u16) -> (u16, u16) {
    let col = (pin.x / 100.0 * cols.saturating_sub(1) as f64).round() as u16;
    let row = (pin.y / 100.0 * rows.saturating_sub(1) as f64).round() as u16;
    (col, row)
}

/// Pin under (or right next to) a cell, nearest first.
pub fn pin_at(pins: &[FallbackPin], col: u16, row: u16, cols: u16, rows: u16) -> Option<&FallbackPin> {
    pins.iter()
        .map(|pin| {
            let (c, r) = pin_cell(pin, cols, rows);
            (c.abs_diff(col).max(r.abs_diff(row)), pin)
        })
        .filter(|(distance, _)| *distance <= 1)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, pin)| pin)
}

fn to_dots(x: f64, y: f64, canvas: &DotCanvas) -> (f64, f64) {
    (
        x / 100.0 * (canvas.width() - 1) as f64,
        y / 100.0 * (canvas.height() - 1) as f64,
    )
}

pub fn draw(term: &mut Terminal, pins: &[FallbackPin], selected: Option<&str>, frame: u64) {
    let (cols, rows) = term.size();
    if cols == 0 || rows == 0 {
        return;
    }
    let mut canvas = DotCanvas::new(cols, rows);

    for step in 0..=10 {
        let pct = step as f64 * 10.0;
        let top = to_dots(pct, 0.0, &canvas);
        let bottom = to_dots(pct, 100.0, &canvas);
        canvas.line(top, bottom, 1);
        let left = to_dots(0.0, pct, &canvas);
        let right = to_dots(100.0, pct, &canvas);
        canvas.line(left, right, 1);
    }

    for ((lat_a, lng_a), (lat_b, lng_b)) in coastline_edges() {
        let a = project(lat_a, lng_a);
        let b = project(lat_b, lng_b);
        canvas.line(to_dots(a.x, a.y, &canvas), to_dots(b.x, b.y, &canvas), 2);
    }
    canvas.blit(term, |level| if level >= 2 { COASTLINE } else { GRID });

    for pin in pins {
        let (col, row) = pin_cell(pin, cols, rows);
        let color = MarkerColor::for_risk(pin.risk).color();
        let is_selected = selected == Some(pin.id.as_str());
        let glyph = if is_selected && frame / 5 % 2 == 0 { '◉' } else { '●' };
        term.set(col as i32, row as i32, glyph, Some(color), is_selected);
        let label_color = if is_selected { TEXT } else { TEXT_DIM };
        term.set_str(col as i32 + 2, row as i32, &pin.label, Some(label_color), is_selected);
    }
}

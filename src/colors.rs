//! HUD palette.

use crate::geo::RiskTier;
use crossterm::style::Color;

pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

/// Critical targets.
pub const ALERT: Color = rgb(0xEF, 0x44, 0x44);
/// Everything else that is highlighted.
pub const ACCENT: Color = rgb(0x2D, 0x9C, 0xDB);
pub const WARNING: Color = rgb(0xF9, 0x73, 0x16);
pub const COASTLINE: Color = rgb(0x74, 0x68, 0x55);
pub const GRID: Color = rgb(0x1E, 0x3A, 0x4F);
pub const PANEL_BORDER: Color = rgb(0x37, 0x41, 0x51);
pub const TEXT: Color = Color::White;
pub const TEXT_DIM: Color = rgb(0x6B, 0x72, 0x80);

/// Marker fill keyed by risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerColor {
    Alert,
    Accent,
}

impl MarkerColor {
    pub fn for_risk(risk: RiskTier) -> Self {
        match risk {
            RiskTier::Critical => MarkerColor::Alert,
            _ => MarkerColor::Accent,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            MarkerColor::Alert => ALERT,
            MarkerColor::Accent => ACCENT,
        }
    }
}

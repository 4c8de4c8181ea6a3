//! Sub-cell drawing with braille dots (2x4 per terminal cell).

use crate::terminal::Terminal;
use crossterm::style::Color;

const DOT_BITS: [(usize, usize, u8); 8] = [
    (0, 0, 0x01),
    (0, 1, 0x02),
    (0, 2, 0x04),
    (1, 0, 0x08),
    (1, 1, 0x10),
    (1, 2, 0x20),
    (0, 3, 0x40),
    (1, 3, 0x80),
];

/// Intensity grid; the brightest dot in a cell picks the cell color.
pub struct DotCanvas {
    width: usize,
    height: usize,
    dots: Vec<u8>,
}

impl DotCanvas {
    pub fn new(cols: u16, rows: u16) -> Self {
        let width = cols as usize * 2;
        let height = rows as usize * 4;
        Self {
            width,
            height,
            dots: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn plot(&mut self, x: i32, y: i32, level: u8) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        self.dots[idx] = self.dots[idx].max(level);
    }

    pub fn level(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.dots[y * self.width + x]
    }

    /// Straight segment between two dot positions.
    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), level: u8) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.plot(x.round() as i32, y.round() as i32, level);
        }
    }

    /// Write non-empty cells into the terminal buffer.
    pub fn blit<F>(&self, term: &mut Terminal, color_for: F)
    where
        F: Fn(u8) -> Color,
    {
        for cy in 0..self.height / 4 {
            for cx in 0..self.width / 2 {
                let mut bits: u8 = 0;
                let mut max_level: u8 = 0;
                for &(dx, dy, bit) in &DOT_BITS {
                    let level = self.level(cx * 2 + dx, cy * 4 + dy);
                    if level > 0 {
                        bits |= bit;
                        max_level = max_level.max(level);
                    }
                }
                if bits > 0 {
                    let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
                    term.set(cx as i32, cy as i32, ch, Some(color_for(max_level)), false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_dot_maps_to_braille_bit() {
        let mut canvas = DotCanvas::new(2, 1);
        canvas.plot(3, 3, 1);
        let mut term = Terminal::headless(2, 1);
        canvas.blit(&mut term, |_| Color::White);
        assert_eq!(term.get(1, 0).unwrap().ch, '\u{2880}');
        assert_eq!(term.get(0, 0).unwrap().ch, ' ');
    }

    #[test]
    fn plot_keeps_brightest_level() {
        let mut canvas = DotCanvas::new(1, 1);
        canvas.plot(0, 0, 2);
        canvas.plot(0, 0, 1);
        assert_eq!(canvas.level(0, 0), 2);
        canvas.plot(-1, 9, 3);
    }

    #[test]
    fn line_covers_endpoints() {
        let mut canvas = DotCanvas::new(4, 2);
        canvas.line((0.0, 0.0), (7.0, 7.0), 1);
        assert_eq!(canvas.level(0, 0), 1);
        assert_eq!(canvas.level(7, 7), 1);
    }
}

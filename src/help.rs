use crate::colors::{PANEL_BORDER, TEXT};
use crate::terminal::Terminal;

pub const MAP_HELP: &str = "\
TACMAP
Tab / Shift-Tab  next / previous target
Click            select target under cursor
Esc              clear selection
s                show share link
e                show e-mail report link
?                toggle this help
q                quit";

/// Render a centered help overlay box with the provided text.
pub fn render_help_overlay(term: &mut Terminal, help_text: &str) {
    if help_text.is_empty() {
        return;
    }
    let (width, height) = term.size();

    let lines: Vec<&str> = help_text.lines().collect();
    let max_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_width = max_width + 4; // 2 chars padding each side
    let box_height = lines.len() + 2;

    let start_x = (width as usize).saturating_sub(box_width) / 2;
    let start_y = (height as usize).saturating_sub(box_height) / 2;
    let right = start_x + box_width - 1;
    let bottom = start_y + box_height - 1;

    for x in start_x..=right {
        let (top_ch, bottom_ch) = match x {
            x if x == start_x => ('┌', '└'),
            x if x == right => ('┐', '┘'),
            _ => ('─', '─'),
        };
        term.set(x as i32, start_y as i32, top_ch, Some(PANEL_BORDER), false);
        term.set(x as i32, bottom as i32, bottom_ch, Some(PANEL_BORDER), false);
    }

    for (i, line) in lines.iter().enumerate() {
        let y = (start_y + 1 + i) as i32;
        term.set(start_x as i32, y, '│', Some(PANEL_BORDER), false);
        let padding = max_width.saturating_sub(line.chars().count());
        let padded = format!(" {}{} ", line, " ".repeat(padding));
        // First line is the title
        term.set_str(start_x as i32 + 1, y, &padded, Some(TEXT), i == 0);
        term.set(right as i32, y, '│', Some(PANEL_BORDER), false);
    }
}

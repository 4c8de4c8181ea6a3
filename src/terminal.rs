use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        poll, read, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, stdout, IsTerminal, Write};
use std::time::Duration;

/// Cell buffer drawn either to the live terminal or, headless, to stdout.
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
    live: bool,
}

/// A single cell in the terminal buffer
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bold: false,
        }
    }
}

/// Input events the map view reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Key(KeyCode, KeyModifiers),
    Click(u16, u16),
    Resize(u16, u16),
}

impl Terminal {
    /// Take over the terminal: raw mode, alternate screen, mouse capture.
    pub fn new() -> io::Result<Self> {
        let (width, height) = size()?;
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, EnableMouseCapture, Hide)?;

        Ok(Self {
            width,
            height,
            buffer: blank(width, height),
            live: true,
        })
    }

    /// Offscreen buffer of a fixed size (print mode, tests).
    pub fn headless(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            buffer: blank(width, height),
            live: false,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.buffer = blank(width, height);
    }

    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            for cell in row {
                *cell = Cell::default();
            }
        }
    }

    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(stdout(), Clear(ClearType::All))
    }

    /// Set a character at position with optional color
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize][x as usize] = Cell { ch, fg, bold };
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    #[cfg(test)]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.buffer.get(y as usize)?.get(x as usize)
    }

    /// Characters of one row, trailing blanks trimmed.
    pub fn row_text(&self, y: u16) -> String {
        self.buffer
            .get(y as usize)
            .map(|row| row.iter().map(|c| c.ch).collect::<String>())
            .unwrap_or_default()
            .trim_end()
            .to_string()
    }

    /// Flush the buffer to the screen.
    pub fn present(&self) -> io::Result<()> {
        let mut out = stdout();
        for (y, row) in self.buffer.iter().enumerate() {
            queue!(out, MoveTo(0, y as u16))?;
            for cell in row {
                if cell.bold {
                    queue!(out, SetAttribute(Attribute::Bold))?;
                }
                match cell.fg {
                    Some(color) => queue!(out, SetForegroundColor(color), Print(cell.ch), ResetColor)?,
                    None => queue!(out, Print(cell.ch))?,
                }
                if cell.bold {
                    queue!(out, SetAttribute(Attribute::Reset))?;
                }
            }
        }
        out.flush()
    }

    /// Wait up to `timeout` for the next relevant input event.
    pub fn next_input(&self, timeout: Duration) -> io::Result<Option<Input>> {
        if !poll(timeout)? {
            return Ok(None);
        }
        let input = match read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => Some(Input::Key(key.code, key.modifiers)),
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => Some(Input::Click(mouse.column, mouse.row)),
                _ => None,
            },
            Event::Resize(w, h) => Some(Input::Resize(w, h)),
            _ => None,
        };
        Ok(input)
    }

    /// Print the buffer to stdout (print mode). Colors are only emitted when
    /// stdout is a terminal.
    pub fn print_to_stdout(&self) {
        let styled = stdout().is_terminal();
        for (y, row) in self.buffer.iter().enumerate() {
            let line = if styled { styled_line(row) } else { self.row_text(y as u16) };
            println!("{}", line);
        }
    }
}

/// One row as ANSI text, one escape per run of equally styled cells.
fn styled_line(row: &[Cell]) -> String {
    let end = row.iter().rposition(|c| c.ch != ' ').map_or(0, |i| i + 1);
    let mut line = String::new();
    let mut open: Option<(bool, Option<Color>)> = None;
    for cell in &row[..end] {
        let style = (cell.bold || cell.fg.is_some()).then_some((cell.bold, cell.fg));
        if cell.ch != ' ' && style != open {
            if open.is_some() {
                line.push_str("\x1b[0m");
            }
            if let Some((bold, fg)) = style {
                if bold {
                    line.push_str("\x1b[1m");
                }
                if let Some(code) = fg.and_then(ansi_fg) {
                    line.push_str(&code);
                }
            }
            open = style;
        }
        line.push(cell.ch);
    }
    if open.is_some() {
        line.push_str("\x1b[0m");
    }
    line
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.live {
            let _ = execute!(stdout(), Show, DisableMouseCapture, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}

fn blank(width: u16, height: u16) -> Vec<Vec<Cell>> {
    vec![vec![Cell::default(); width as usize]; height as usize]
}

fn ansi_fg(color: Color) -> Option<String> {
    let code = match color {
        Color::Rgb { r, g, b } => return Some(format!("\x1b[38;2;{};{};{}m", r, g, b)),
        Color::AnsiValue(v) => return Some(format!("\x1b[38;5;{}m", v)),
        Color::Black => 30,
        Color::DarkRed => 31,
        Color::DarkGreen => 32,
        Color::DarkYellow => 33,
        Color::DarkBlue => 34,
        Color::DarkMagenta => 35,
        Color::DarkCyan => 36,
        Color::Grey => 37,
        Color::DarkGrey => 90,
        Color::Red => 91,
        Color::Green => 92,
        Color::Yellow => 93,
        Color::Blue => 94,
        Color::Magenta => 95,
        Color::Cyan => 96,
        Color::White => 97,
        _ => return None,
    };
    Some(format!("\x1b[{}m", code))
}

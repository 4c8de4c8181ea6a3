//! Terminal host for the map controller: run loop, HUD and print mode.

use crate::backend::http::HttpTransport;
use crate::backend::loader::{MapLoader, ScriptTransport};
use crate::colors::{ACCENT, PANEL_BORDER, TEXT, TEXT_DIM, WARNING};
use crate::config::MapConfig;
use crate::controller::{BackendMode, GeoViewController};
use crate::error::AppError;
use crate::geo::LocatableEntity;
use crate::help::{render_help_overlay, MAP_HELP};
use crate::share;
use crate::sync::SelectionCallback;
use crate::terminal::{Input, Terminal};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyModifiers};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const FRAME: Duration = Duration::from_millis(50);
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub enum Flow {
    Continue,
    Quit,
}

/// Next or previous entity id after `current`, wrapping around.
pub fn cycle(entities: &[LocatableEntity], current: Option<&str>, forward: bool) -> Option<String> {
    if entities.is_empty() {
        return None;
    }
    let len = entities.len();
    let next = match current.and_then(|id| entities.iter().position(|e| e.id == id)) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        None if forward => 0,
        None => len - 1,
    };
    Some(entities[next].id.clone())
}

pub struct MapView {
    controller: GeoViewController,
    picked: Rc<RefCell<Option<String>>>,
    share_origin: String,
    status: Option<String>,
    show_help: bool,
    frame: u64,
}

impl MapView {
    pub fn new(config: &MapConfig, viewport: (u16, u16)) -> Self {
        let transport: Arc<dyn ScriptTransport> = Arc::new(HttpTransport::new(config.timeout));
        let loader = MapLoader::new(&config.provider_url, transport);
        Self::with_loader(config, loader, viewport)
    }

    pub fn with_loader(config: &MapConfig, loader: MapLoader, viewport: (u16, u16)) -> Self {
        let picked = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&picked);
        let on_select: SelectionCallback = Rc::new(move |id: &str| *sink.borrow_mut() = Some(id.to_string()));
        Self {
            controller: GeoViewController::new(config.controller_config(viewport), loader, on_select),
            picked,
            share_origin: config.share_origin.clone(),
            status: None,
            show_help: false,
            frame: 0,
        }
    }

    #[cfg(test)]
    pub fn controller(&self) -> &GeoViewController {
        &self.controller
    }

    pub fn start(&mut self, entities: Vec<LocatableEntity>, selected: Option<String>) {
        self.controller.update(entities, selected);
        self.controller.start(Instant::now());
    }

    pub fn tick(&mut self) {
        self.controller.tick(Instant::now());
        self.frame = self.frame.wrapping_add(1);
    }

    pub fn handle(&mut self, input: Input, term: &mut Terminal) -> Flow {
        match input {
            Input::Key(KeyCode::Char('c'), mods) if mods.contains(KeyModifiers::CONTROL) => return Flow::Quit,
            Input::Key(KeyCode::Char('q'), _) => return Flow::Quit,
            Input::Key(KeyCode::Char('?'), _) => self.show_help = !self.show_help,
            Input::Key(KeyCode::Esc, _) if self.show_help => self.show_help = false,
            Input::Key(KeyCode::Esc, _) => {
                self.controller.select(None);
                self.status = None;
            }
            Input::Key(KeyCode::Tab, _) => self.cycle_selection(true),
            Input::Key(KeyCode::BackTab, _) => self.cycle_selection(false),
            Input::Key(KeyCode::Char('s'), _) => self.status = Some(self.share_link()),
            Input::Key(KeyCode::Char('e'), _) => self.status = Some(self.report_link()),
            Input::Click(col, row) => {
                self.controller.click(col, row);
                let picked = self.picked.borrow_mut().take();
                if let Some(id) = picked {
                    self.controller.select(Some(id));
                }
            }
            Input::Resize(cols, rows) => {
                term.resize(cols, rows);
                self.controller.resize(cols, rows);
            }
            Input::Key(..) => {}
        }
        Flow::Continue
    }

    fn cycle_selection(&mut self, forward: bool) {
        let next = cycle(self.controller.entities(), self.controller.selected(), forward);
        self.controller.select(next);
    }

    fn share_link(&self) -> String {
        let ctl = &self.controller;
        let location = share::current_location(ctl.entities(), ctl.selected());
        share::share_link(&self.share_origin, location, ctl.selected())
    }

    fn report_link(&self) -> String {
        let ctl = &self.controller;
        let location = share::current_location(ctl.entities(), ctl.selected());
        share::report(&self.share_origin, location, ctl.selected(), Utc::now()).mailto()
    }

    pub fn render(&self, term: &mut Terminal) {
        term.clear();
        self.controller.draw(term, self.frame);
        let (cols, rows) = term.size();

        term.set_str(1, 0, "TACMAP", Some(ACCENT), true);
        match self.controller.mode() {
            BackendMode::Pending => {
                let spinner = SPINNER[(self.frame / 2) as usize % SPINNER.len()];
                let text = format!("{} CONNECTING SATELLITE...", spinner);
                let x = (cols as i32 - text.chars().count() as i32) / 2;
                term.set_str(x, rows as i32 / 2, &text, Some(ACCENT), true);
            }
            BackendMode::Fallback => {
                let badge = "OFFLINE MODE";
                term.set_str(cols as i32 - badge.len() as i32 - 2, 0, badge, Some(WARNING), true);
                if let Some(reason) = self.controller.fallback_reason() {
                    let reason = reason.to_string();
                    let x = cols as i32 - reason.chars().count() as i32 - 2;
                    term.set_str(x, 1, &reason, Some(TEXT_DIM), false);
                }
            }
            BackendMode::Interactive => {
                if let Some(attribution) = self.controller.attribution() {
                    let x = cols as i32 - attribution.chars().count() as i32 - 1;
                    term.set_str(x, rows as i32 - 1, attribution, Some(TEXT_DIM), false);
                }
            }
        }

        self.render_readout(term, rows);

        if let Some(status) = &self.status {
            term.set_str(1, rows as i32 - 2, status, Some(PANEL_BORDER), false);
        }
        if self.show_help {
            render_help_overlay(term, MAP_HELP);
        }
    }

    fn render_readout(&self, term: &mut Terminal, rows: u16) {
        let ctl = &self.controller;
        let (title, precision) = match ctl.mode() {
            BackendMode::Fallback => ("TARGET (VECTOR)", 4),
            _ => ("COORDINATES", 6),
        };
        let location = ctl
            .selected_location()
            .or_else(|| ctl.camera().map(|c| c.center))
            .map(|p| format!("{:.*}", precision, p))
            .unwrap_or_else(|| "--".to_string());
        let label = ctl
            .selected()
            .and_then(|id| ctl.entities().iter().find(|e| e.id == id))
            .map(|e| format!("  {} [{}]", e.label, e.id))
            .unwrap_or_default();
        let y = rows as i32 - 1;
        term.set_str(1, y, &format!("{}: ", title), Some(TEXT_DIM), false);
        term.set_str(title.len() as i32 + 3, y, &format!("{}{}", location, label), Some(TEXT), true);
    }
}

/// Interactive session on the alternate screen.
pub fn run(config: &MapConfig, entities: Vec<LocatableEntity>, selected: Option<String>) -> Result<(), AppError> {
    let mut term = Terminal::new()?;
    term.clear_screen()?;
    let mut view = MapView::new(config, term.size());
    view.start(entities, selected);

    loop {
        view.tick();
        view.render(&mut term);
        term.present()?;
        if let Some(input) = term.next_input(FRAME)? {
            if let Flow::Quit = view.handle(input, &mut term) {
                break;
            }
        }
    }

    view.controller.dispose();
    info!("map session closed");
    Ok(())
}

/// Wait for the backend to settle and print a single frame.
pub fn print_frame(
    config: &MapConfig,
    entities: Vec<LocatableEntity>,
    selected: Option<String>,
    size: (u16, u16),
) -> Result<(), AppError> {
    let mut view = MapView::new(config, size);
    view.start(entities, selected);
    while view.controller.mode() == BackendMode::Pending {
        thread::sleep(Duration::from_millis(20));
        view.tick();
    }
    let mut term = Terminal::headless(size.0, size.1);
    view.render(&mut term);
    term.print_to_stdout();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::loader::ScriptRegistry;
    use crate::backend::testing::{wait_for, FakeNamespace, FakeTransport};
    use crate::config::Overrides;
    use crate::settings::Settings;
    use crate::targets;

    fn config(key: Option<&str>) -> MapConfig {
        MapConfig::resolve(
            Settings::default(),
            None,
            Overrides {
                api_key: key.map(str::to_string),
                origin: Some("https://ops.example".into()),
                ..Overrides::default()
            },
        )
    }

    fn view(key: Option<&str>, transport: &Arc<FakeTransport>) -> MapView {
        let loader = MapLoader::with_registry(
            "https://maps.test/tiles.json",
            Arc::clone(transport) as Arc<dyn ScriptTransport>,
            Arc::new(ScriptRegistry::default()),
        );
        MapView::with_loader(&config(key), loader, (80, 24))
    }

    fn key(code: KeyCode) -> Input {
        Input::Key(code, KeyModifiers::NONE)
    }

    #[test]
    fn cycle_wraps_both_ways() {
        let roster = targets::demo();
        assert_eq!(cycle(&roster, None, true).as_deref(), Some("T-001"));
        assert_eq!(cycle(&roster, None, false).as_deref(), Some("T-004"));
        assert_eq!(cycle(&roster, Some("T-004"), true).as_deref(), Some("T-001"));
        assert_eq!(cycle(&roster, Some("T-001"), false).as_deref(), Some("T-004"));
        assert_eq!(cycle(&[], None, true), None);
    }

    #[test]
    fn offline_hud_shows_badge_and_vector_readout() {
        let transport = FakeTransport::serving(FakeNamespace::modern());
        let mut view = view(None, &transport);
        view.start(targets::demo(), Some("T-001".into()));

        let mut term = Terminal::headless(80, 24);
        view.render(&mut term);
        assert!(term.row_text(0).contains("OFFLINE MODE"));
        assert!(term.row_text(1).contains("no map API key configured"));
        assert!(term.row_text(23).contains("TARGET (VECTOR): 48.8566, 2.3522  PHANTOM [T-001]"));
    }

    #[test]
    fn interactive_hud_uses_six_decimals() {
        let transport = FakeTransport::serving(FakeNamespace::modern());
        let mut view = view(Some("key"), &transport);
        view.start(targets::demo(), Some("T-002".into()));
        wait_for(|| {
            view.tick();
            (view.controller().mode() == BackendMode::Interactive).then_some(())
        });

        let mut term = Terminal::headless(80, 24);
        view.render(&mut term);
        assert!(term.row_text(23).contains("COORDINATES: 35.676200, 139.650300"));
    }

    #[test]
    fn keys_drive_selection_and_share() {
        let transport = FakeTransport::serving(FakeNamespace::modern());
        let mut view = view(None, &transport);
        view.start(targets::demo(), None);
        let mut term = Terminal::headless(80, 24);

        view.handle(key(KeyCode::Tab), &mut term);
        assert_eq!(view.controller().selected(), Some("T-001"));
        view.handle(key(KeyCode::Char('s')), &mut term);
        assert_eq!(
            view.status.as_deref(),
            Some("https://ops.example/ops?lat=48.856600&lng=2.352200&target=T-001")
        );
        view.handle(key(KeyCode::Esc), &mut term);
        assert_eq!(view.controller().selected(), None);
        assert!(matches!(view.handle(key(KeyCode::Char('q')), &mut term), Flow::Quit));
    }

    #[test]
    fn click_on_pin_selects_it() {
        let transport = FakeTransport::serving(FakeNamespace::modern());
        let mut view = view(None, &transport);
        view.start(targets::demo(), None);
        let mut term = Terminal::headless(80, 24);

        let pin = view.controller().pins()[1].clone();
        let (col, row) = crate::fallback::pin_cell(&pin, 80, 24);
        view.handle(Input::Click(col, row), &mut term);
        assert_eq!(view.controller().selected(), Some("T-002"));
    }
}

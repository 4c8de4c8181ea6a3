//! The geospatial view controller.
//!
//! Owns the view's backend mode and drives it from `Pending` to either the
//! interactive map or the offline vector map. The host feeds it entities and
//! the selection through [`GeoViewController::update`] and polls it with
//! [`GeoViewController::tick`]; nothing here blocks.

use crate::backend::auth::AuthChannel;
use crate::backend::loader::{Acquired, Acquisition, MapLoader, DEFAULT_TIMEOUT};
use crate::backend::{BackendHandle, Camera, SurfaceOptions};
use crate::error::AcquisitionError;
use crate::fallback::{self, FallbackPin};
use crate::geo::{location_of, GeoPoint, LocatableEntity, DEFAULT_CENTER};
use crate::sync::{MarkerSynchronizer, SelectionCallback};
use crate::terminal::Terminal;
use std::task::Poll;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const INITIAL_ZOOM: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Pending,
    Interactive,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub mode: BackendMode,
    pub selected: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub surface: SurfaceOptions,
}

impl ControllerConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            timeout: DEFAULT_TIMEOUT,
            surface: SurfaceOptions {
                center: DEFAULT_CENTER,
                zoom: INITIAL_ZOOM,
                viewport: (80, 24),
            },
        }
    }
}

enum Backend {
    Idle,
    Pending(Acquisition),
    Interactive {
        handle: BackendHandle,
        auth: AuthChannel,
        markers: MarkerSynchronizer,
    },
    Fallback {
        pins: Vec<FallbackPin>,
    },
    Disposed,
}

enum Event {
    Ready(Acquired),
    Failed(AcquisitionError),
}

pub struct GeoViewController {
    config: ControllerConfig,
    loader: MapLoader,
    on_select: SelectionCallback,
    state: ViewState,
    entities: Vec<LocatableEntity>,
    backend: Backend,
    fallback_reason: Option<AcquisitionError>,
}

impl GeoViewController {
    pub fn new(config: ControllerConfig, loader: MapLoader, on_select: SelectionCallback) -> Self {
        Self {
            config,
            loader,
            on_select,
            state: ViewState {
                mode: BackendMode::Pending,
                selected: None,
            },
            entities: Vec::new(),
            backend: Backend::Idle,
            fallback_reason: None,
        }
    }

    /// Request the backend. Only the first call starts an acquisition; later
    /// calls attach to it (or to its outcome).
    pub fn start(&mut self, now: Instant) {
        if !matches!(self.backend, Backend::Idle) {
            return;
        }
        let acquisition = self
            .loader
            .acquire(self.config.api_key.as_deref(), self.config.timeout, now);
        self.backend = Backend::Pending(acquisition);
        self.tick(now);
    }

    /// Advance the state machine. Returns true when the mode changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let event = match &mut self.backend {
            Backend::Pending(acquisition) => match acquisition.poll(now) {
                Poll::Ready(Ok(acquired)) => Some(Event::Ready(acquired)),
                Poll::Ready(Err(error)) => Some(Event::Failed(error)),
                Poll::Pending => None,
            },
            Backend::Interactive { auth, .. } => auth.try_take().map(|failure| {
                warn!(reason = %failure.reason, "map provider revoked credentials");
                Event::Failed(AcquisitionError::AuthRejected)
            }),
            _ => None,
        };
        match event {
            Some(Event::Ready(acquired)) => self.enter_interactive(acquired),
            Some(Event::Failed(error)) => self.enter_fallback(error),
            None => false,
        }
    }

    fn enter_interactive(&mut self, acquired: Acquired) -> bool {
        if self.state.mode != BackendMode::Pending {
            return false;
        }
        let Acquired { constructors, auth } = acquired;
        let mut handle = BackendHandle {
            surface: constructors.surface.create(&self.config.surface),
            markers: constructors.marker,
        };
        let mut markers = MarkerSynchronizer::new();
        markers.sync(&self.entities, self.state.selected.as_deref(), &mut handle, &self.on_select);

        self.backend = Backend::Interactive {
            handle,
            auth,
            markers,
        };
        self.state.mode = BackendMode::Interactive;
        info!(markers = self.marker_count(), "interactive map ready");
        true
    }

    fn enter_fallback(&mut self, reason: AcquisitionError) -> bool {
        if self.state.mode == BackendMode::Fallback {
            return false;
        }
        warn!(error = %reason, from = ?self.state.mode, "switching to offline vector map");
        self.backend = Backend::Fallback {
            pins: fallback::pins(&self.entities),
        };
        self.state.mode = BackendMode::Fallback;
        self.fallback_reason = Some(reason);
        true
    }

    /// Replace the entities and the selection and re-render.
    pub fn update(&mut self, entities: Vec<LocatableEntity>, selected: Option<String>) {
        if matches!(self.backend, Backend::Disposed) {
            return;
        }
        self.entities = entities;
        self.state.selected = selected;
        self.refresh();
    }

    /// Change only the selection.
    pub fn select(&mut self, selected: Option<String>) {
        if matches!(self.backend, Backend::Disposed) || self.state.selected == selected {
            return;
        }
        self.state.selected = selected;
        self.refresh();
    }

    fn refresh(&mut self) {
        match &mut self.backend {
            Backend::Interactive { handle, markers, .. } => {
                markers.sync(&self.entities, self.state.selected.as_deref(), handle, &self.on_select);
            }
            Backend::Fallback { pins } => *pins = fallback::pins(&self.entities),
            _ => {}
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.config.surface.viewport = (cols, rows);
        if let Backend::Interactive { handle, .. } = &mut self.backend {
            handle.surface.resize(cols, rows);
        }
    }

    /// Hit-test a click against markers or pins. The selection callback
    /// receives the id; it is also returned.
    pub fn click(&self, col: u16, row: u16) -> Option<String> {
        match &self.backend {
            Backend::Interactive { handle, markers, .. } => markers
                .click_at(col, row, handle.surface.as_ref())
                .map(str::to_string),
            Backend::Fallback { pins } => {
                let (cols, rows) = self.config.surface.viewport;
                let id = fallback::pin_at(pins, col, row, cols, rows)?.id.clone();
                (self.on_select)(&id);
                Some(id)
            }
            _ => None,
        }
    }

    /// Draw the active map layer; nothing while pending.
    pub fn draw(&self, term: &mut Terminal, frame: u64) {
        match &self.backend {
            Backend::Interactive { handle, markers, .. } => {
                handle.surface.draw(term, &markers.specs(), frame);
            }
            Backend::Fallback { pins } => {
                fallback::draw(term, pins, self.state.selected.as_deref(), frame);
            }
            _ => {}
        }
    }

    /// Release markers, stop any acquisition and stop listening for auth
    /// failures. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if matches!(self.backend, Backend::Disposed) {
            return;
        }
        self.backend = Backend::Disposed;
        info!(mode = ?self.state.mode, "map view disposed");
    }

    #[cfg(test)]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn mode(&self) -> BackendMode {
        self.state.mode
    }

    pub fn selected(&self) -> Option<&str> {
        self.state.selected.as_deref()
    }

    pub fn selected_location(&self) -> Option<GeoPoint> {
        location_of(&self.entities, self.state.selected.as_deref()?)
    }

    pub fn entities(&self) -> &[LocatableEntity] {
        &self.entities
    }

    #[cfg(test)]
    pub fn pins(&self) -> &[FallbackPin] {
        match &self.backend {
            Backend::Fallback { pins } => pins,
            _ => &[],
        }
    }

    pub fn marker_count(&self) -> usize {
        match &self.backend {
            Backend::Interactive { markers, .. } => markers.len(),
            _ => 0,
        }
    }

    pub fn camera(&self) -> Option<Camera> {
        match &self.backend {
            Backend::Interactive { handle, .. } => Some(handle.surface.camera()),
            _ => None,
        }
    }

    pub fn attribution(&self) -> Option<&str> {
        match &self.backend {
            Backend::Interactive { handle, .. } => handle.surface.attribution(),
            _ => None,
        }
    }

    pub fn fallback_reason(&self) -> Option<&AcquisitionError> {
        self.fallback_reason.as_ref()
    }

    #[cfg(test)]
    pub fn is_disposed(&self) -> bool {
        matches!(self.backend, Backend::Disposed)
    }
}

impl Drop for GeoViewController {
    fn drop(&mut self) {
        self.dispose();
    }
}

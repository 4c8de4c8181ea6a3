//! In-memory map backend used by unit tests.

use super::auth::{AuthListeners, AuthNotifier};
use super::loader::ScriptTransport;
use super::{
    Camera, ClickListener, LibraryImporter, Library, MapNamespace, MapSurface, Marker, MarkerFactory,
    MarkerSpec, SurfaceFactory, SurfaceOptions,
};
use crate::geo::{GeoBounds, GeoPoint};
use crate::terminal::Terminal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Poll `f` until it yields, for at most two seconds.
pub fn wait_for<T>(mut f: impl FnMut() -> Option<T>) -> T {
    let started = Instant::now();
    loop {
        if let Some(value) = f() {
            return value;
        }
        assert!(started.elapsed() < Duration::from_secs(2), "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    PanTo(GeoPoint),
    SetZoom(f64),
    FitBounds(GeoBounds),
}

#[derive(Default)]
pub struct FakeSurfaceFactory {
    created: AtomicUsize,
    ops: Arc<Mutex<Vec<SurfaceOp>>>,
}

impl FakeSurfaceFactory {
    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl SurfaceFactory for FakeSurfaceFactory {
    fn create(&self, options: &SurfaceOptions) -> Box<dyn MapSurface> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeSurface {
            camera: Camera {
                center: options.center,
                zoom: options.zoom,
            },
            viewport: options.viewport,
            ops: Arc::clone(&self.ops),
        })
    }
}

pub struct FakeSurface {
    camera: Camera,
    viewport: (u16, u16),
    ops: Arc<Mutex<Vec<SurfaceOp>>>,
}

impl MapSurface for FakeSurface {
    fn camera(&self) -> Camera {
        self.camera
    }

    fn pan_to(&mut self, center: GeoPoint) {
        self.camera.center = center;
        self.ops.lock().unwrap().push(SurfaceOp::PanTo(center));
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.camera.zoom = zoom;
        self.ops.lock().unwrap().push(SurfaceOp::SetZoom(zoom));
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds) {
        self.camera = Camera {
            center: bounds.center(),
            zoom: 10.0,
        };
        self.ops.lock().unwrap().push(SurfaceOp::FitBounds(*bounds));
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.viewport = (cols, rows);
    }

    fn locate(&self, point: GeoPoint) -> Option<(u16, u16)> {
        let (cols, rows) = self.viewport;
        let col = ((point.lng() + 180.0) / 360.0 * (cols.saturating_sub(1)) as f64).round() as u16;
        let row = ((90.0 - point.lat()) / 180.0 * (rows.saturating_sub(1)) as f64).round() as u16;
        Some((col, row))
    }

    fn draw(&self, _term: &mut Terminal, _markers: &[&MarkerSpec], _frame: u64) {}
}

#[derive(Default)]
pub struct MarkerStats {
    created: AtomicUsize,
    live: AtomicUsize,
}

#[derive(Default)]
pub struct FakeMarkerFactory {
    stats: Arc<MarkerStats>,
}

impl FakeMarkerFactory {
    pub fn live(&self) -> usize {
        self.stats.live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.stats.created.load(Ordering::SeqCst)
    }
}

impl MarkerFactory for FakeMarkerFactory {
    fn create(&self, spec: MarkerSpec) -> Box<dyn Marker> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        self.stats.live.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeMarker {
            spec,
            listeners: Vec::new(),
            attached: true,
            stats: Arc::clone(&self.stats),
        })
    }
}

pub struct FakeMarker {
    spec: MarkerSpec,
    listeners: Vec<ClickListener>,
    attached: bool,
    stats: Arc<MarkerStats>,
}

impl Marker for FakeMarker {
    fn spec(&self) -> &MarkerSpec {
        &self.spec
    }

    fn add_click_listener(&mut self, listener: ClickListener) {
        self.listeners.push(listener);
    }

    fn click(&self) {
        for listener in &self.listeners {
            listener();
        }
    }

    fn release(&mut self) {
        if self.attached {
            self.attached = false;
            self.stats.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_attached(&self) -> bool {
        self.attached
    }
}

impl Drop for FakeMarker {
    fn drop(&mut self) {
        self.release();
    }
}

struct FakeImporter {
    fail: bool,
    surfaces: Arc<FakeSurfaceFactory>,
    markers: Arc<FakeMarkerFactory>,
}

impl LibraryImporter for FakeImporter {
    fn import(&self, name: &str) -> Result<Library, String> {
        if self.fail {
            return Err(format!("library {name:?} unavailable for this key"));
        }
        match name {
            "maps" => Ok(Library::Maps(Arc::clone(&self.surfaces) as Arc<dyn SurfaceFactory>)),
            "marker" => Ok(Library::Marker(Arc::clone(&self.markers) as Arc<dyn MarkerFactory>)),
            other => Err(format!("unknown library {other:?}")),
        }
    }
}

pub struct FakeNamespace {
    importer: Option<FakeImporter>,
    legacy: bool,
    pub surfaces: Arc<FakeSurfaceFactory>,
    pub markers: Arc<FakeMarkerFactory>,
    auth: AuthListeners,
}

impl FakeNamespace {
    fn build(importer: Option<bool>, legacy: bool) -> Self {
        let surfaces = Arc::new(FakeSurfaceFactory::default());
        let markers = Arc::new(FakeMarkerFactory::default());
        Self {
            importer: importer.map(|fail| FakeImporter {
                fail,
                surfaces: Arc::clone(&surfaces),
                markers: Arc::clone(&markers),
            }),
            legacy,
            surfaces,
            markers,
            auth: AuthListeners::default(),
        }
    }

    pub fn modern() -> Self {
        Self::build(Some(false), false)
    }

    pub fn legacy() -> Self {
        Self::build(None, true)
    }

    pub fn modern_failing() -> Self {
        Self::build(Some(true), false)
    }

    pub fn modern_failing_with_legacy() -> Self {
        Self::build(Some(true), true)
    }

    pub fn empty() -> Self {
        Self::build(None, false)
    }

    pub fn rejecting(mut self, reason: &str) -> Self {
        self.auth = AuthListeners::rejected(reason);
        self
    }

    /// Simulate the provider revoking the key after load.
    pub fn revoke(&self, reason: &str) {
        self.auth.fire(reason);
    }
}

impl MapNamespace for FakeNamespace {
    fn importer(&self) -> Option<&dyn LibraryImporter> {
        self.importer.as_ref().map(|i| i as &dyn LibraryImporter)
    }

    fn legacy_surface(&self) -> Option<Arc<dyn SurfaceFactory>> {
        self.legacy
            .then(|| Arc::clone(&self.surfaces) as Arc<dyn SurfaceFactory>)
    }

    fn legacy_marker(&self) -> Option<Arc<dyn MarkerFactory>> {
        self.legacy
            .then(|| Arc::clone(&self.markers) as Arc<dyn MarkerFactory>)
    }

    fn register_auth_listener(&self, notifier: AuthNotifier) {
        self.auth.register(notifier);
    }
}

#[derive(Clone)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    fn new() -> Self {
        Self(Arc::new((Mutex::new(false), Condvar::new())))
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.0;
        let mut open = lock.lock().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !*open && Instant::now() < deadline {
            open = cvar.wait_timeout(open, Duration::from_millis(10)).unwrap().0;
        }
    }
}

pub struct FakeTransport {
    outcome: Result<Arc<FakeNamespace>, String>,
    gate: Option<Gate>,
    fetches: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

impl FakeTransport {
    fn build(outcome: Result<Arc<FakeNamespace>, String>, gate: Option<Gate>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            gate,
            fetches: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        })
    }

    pub fn serving(namespace: FakeNamespace) -> Arc<Self> {
        Self::build(Ok(Arc::new(namespace)), None)
    }

    /// Transport whose fetch blocks until the returned gate opens.
    pub fn gated(namespace: FakeNamespace) -> (Arc<Self>, Gate) {
        let gate = Gate::new();
        (Self::build(Ok(Arc::new(namespace)), Some(gate.clone())), gate)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::build(Err(message.to_string()), None)
    }

    pub fn namespace(&self) -> Arc<FakeNamespace> {
        match &self.outcome {
            Ok(namespace) => Arc::clone(namespace),
            Err(_) => panic!("failing transport has no namespace"),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

impl ScriptTransport for FakeTransport {
    fn fetch(&self, url: &str) -> Result<Arc<dyn MapNamespace>, String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.to_string());
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.outcome
            .clone()
            .map(|namespace| namespace as Arc<dyn MapNamespace>)
    }
}

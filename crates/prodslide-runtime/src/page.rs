#![forbid(unsafe_code)]

//! Page orchestrator.
//!
//! A [`Page`] is the engine for one page load. The host owns the loop:
//!
//! ```text
//! page.start();
//! loop {
//!     page.push_event(ev);          // input, resize, content change
//!     page.advance(dt);             // fire due timers, poll backends
//!     for out in page.take_outputs() { ... }
//! }
//! page.shutdown();
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Created --start--> Disabled                       (settings.enabled = false)
//! Created --start--> Detecting --probe resolves--> Running
//! Detecting | Running --shutdown--> Shutdown
//! ```
//!
//! Carousels are only built once the backend probe has resolved, so every
//! carousel on the page sees the same detection result. Content changes
//! rebuild all carousels from a fresh discovery after a short delay, reusing
//! that result.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | No containers | Running with zero carousels; no guard timer |
//! | Container missing its wrapper | Skipped, listed in diagnostics |
//! | Backend construction fails | That carousel runs self-managed |
//! | Session storage unavailable | Premium notice shown, not recorded |
//! | Events before `start` or after `shutdown` | Ignored |

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use prodslide_core::discovery::{SkippedContainer, discover};
use prodslide_core::dom::{Dom, NodeId};
use prodslide_core::event::{PageEvent, PointerKind, TouchPhase};
use prodslide_core::session::{MemorySessionStore, SessionStore};
use prodslide_core::settings::{Layout, SlideLabels};

use crate::backend::{AnimationBackend, BackendError, BackendSource};
use crate::carousel::{Carousel, CarouselId, CarouselState, Mode, SlideChanged, StrategyKind};
use crate::config::EngineConfig;
use crate::debounce::Debounce;
use crate::guard::{self, GuardReport};
use crate::probe::{BackendProbe, ProbeState, Resolution};
use crate::scheduler::{Fired, Scheduler, TimerHandle, TimerTag};

/// Session key recording that the premium-layout notice was shown.
pub const PREMIUM_NOTICE_KEY: &str = "wcpls_premium_notice_shown";

/// Informational notices for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// A premium layout was configured; the default layout is rendered.
    PremiumLayout(Layout),
}

/// Fire-and-forget outputs, drained with [`Page::take_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutput {
    SlideChanged(SlideChanged),
    Notice(Notice),
}

/// Page lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    /// Waiting for the backend probe.
    Detecting,
    Running,
    /// Settings disabled the slider; nothing runs.
    Disabled,
    Shutdown,
}

/// Backend detection status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Pending,
    Available(String),
    Unavailable,
    Cancelled,
}

/// Per-carousel diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselReport {
    pub id: CarouselId,
    pub product_id: String,
    pub container: NodeId,
    pub mode: Mode,
    pub strategy: StrategyKind,
    pub state: CarouselState,
    pub slide_count: usize,
    pub timers: usize,
    pub fallback: Option<BackendError>,
}

/// Snapshot of the engine for logging and support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub lifecycle: Lifecycle,
    pub now: Duration,
    pub backend: BackendStatus,
    pub probe_attempts: u32,
    pub carousels: Vec<CarouselReport>,
    pub skipped: Vec<SkippedContainer>,
    pub active_timers: usize,
    pub rebuilds: u64,
    /// Document nodes released after teardowns.
    pub released_nodes: u64,
    pub guard_repairs: u64,
    pub viewport: Option<(u32, u32)>,
}

impl Diagnostics {
    /// Carousels that fell back from the backend strategy.
    pub fn fallbacks(&self) -> impl Iterator<Item = &CarouselReport> {
        self.carousels.iter().filter(|c| c.fallback.is_some())
    }
}

/// The slide engine for one page.
pub struct Page<D: Dom> {
    dom: D,
    config: EngineConfig,
    labels: SlideLabels,
    scheduler: Scheduler,
    session: Box<dyn SessionStore>,
    probe: BackendProbe,
    backend: Option<Rc<dyn AnimationBackend>>,
    lifecycle: Lifecycle,
    carousels: Vec<Carousel>,
    skipped: Vec<SkippedContainer>,
    guard: Option<TimerHandle>,
    resize: Debounce<(u32, u32)>,
    rebuild: Debounce<()>,
    outputs: Vec<PageOutput>,
    next_id: u32,
    rebuilds: u64,
    released_nodes: u64,
    guard_repairs: u64,
    last_guard: GuardReport,
    viewport: Option<(u32, u32)>,
    backends_polled_at: Duration,
}

impl<D: Dom> fmt::Debug for Page<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("lifecycle", &self.lifecycle)
            .field("now", &self.scheduler.now())
            .field("carousels", &self.carousels)
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl<D: Dom> Page<D> {
    /// Create a page over `dom`. Nothing runs until [`Page::start`].
    pub fn new(dom: D, config: EngineConfig, source: impl BackendSource + 'static) -> Self {
        let scheduler = Scheduler::new();
        Self {
            dom,
            probe: BackendProbe::new(Box::new(source), config.probe),
            resize: Debounce::new(config.resize_quiet, TimerTag::ResizeQuiet),
            rebuild: Debounce::new(config.rebuild_delay, TimerTag::Rebuild),
            config,
            labels: SlideLabels::default(),
            scheduler,
            session: Box::new(MemorySessionStore::new()),
            backend: None,
            lifecycle: Lifecycle::Created,
            carousels: Vec::new(),
            skipped: Vec::new(),
            guard: None,
            outputs: Vec::new(),
            next_id: 0,
            rebuilds: 0,
            released_nodes: 0,
            guard_repairs: 0,
            last_guard: GuardReport::default(),
            viewport: None,
            backends_polled_at: Duration::ZERO,
        }
    }

    /// Use `session` for once-per-session bookkeeping.
    #[must_use]
    pub fn with_session(mut self, session: impl SessionStore + 'static) -> Self {
        self.session = Box::new(session);
        self
    }

    /// Announce backend navigation with `labels`.
    #[must_use]
    pub fn with_labels(mut self, labels: SlideLabels) -> Self {
        self.labels = labels;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn dom(&self) -> &D {
        &self.dom
    }

    /// Mutable document access for the host (content updates between
    /// events).
    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    #[must_use]
    pub fn carousels(&self) -> &[Carousel] {
        &self.carousels
    }

    /// Carousel bound to `container`.
    #[must_use]
    pub fn carousel_for(&self, container: NodeId) -> Option<&Carousel> {
        self.carousels.iter().find(|c| c.container() == container)
    }

    /// Live timers across the whole page.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.scheduler.active_count()
    }

    /// Live timers with the given tag.
    #[must_use]
    pub fn timers_tagged(&self, tag: TimerTag) -> usize {
        self.scheduler.count_tagged(tag)
    }

    /// Outcome of the most recent guard pass.
    #[must_use]
    pub fn last_guard_report(&self) -> &GuardReport {
        &self.last_guard
    }

    /// Drain outputs produced since the last call.
    pub fn take_outputs(&mut self) -> Vec<PageOutput> {
        std::mem::take(&mut self.outputs)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the engine: honor `enabled`, surface the premium notice, and
    /// begin backend detection. Carousels are built as soon as detection
    /// resolves, which may be immediately.
    pub fn start(&mut self) {
        if self.lifecycle != Lifecycle::Created {
            return;
        }
        if !self.config.settings.enabled {
            self.lifecycle = Lifecycle::Disabled;
            tracing::info!("product slider disabled by settings");
            return;
        }
        self.premium_notice();
        self.lifecycle = Lifecycle::Detecting;
        if let Some(resolution) = self.probe.start(&self.scheduler) {
            self.resolve(resolution);
        }
    }

    /// Cancel detection, pending debounces and the guard, and tear down
    /// every carousel. Idempotent.
    pub fn shutdown(&mut self) {
        if self.lifecycle == Lifecycle::Shutdown {
            return;
        }
        self.probe.cancel();
        self.guard = None;
        self.resize.cancel();
        self.rebuild.cancel();
        let count = self.carousels.len();
        for carousel in self.carousels.drain(..) {
            carousel.teardown(&mut self.dom);
        }
        self.release_detached();
        self.lifecycle = Lifecycle::Shutdown;
        tracing::info!(carousels = count, "product slider shut down");
    }

    fn premium_notice(&mut self) {
        let layout = self.config.settings.layout;
        if !layout.is_premium() {
            return;
        }
        if self.session.contains(PREMIUM_NOTICE_KEY) {
            tracing::debug!(?layout, "premium layout notice already shown this session");
            return;
        }
        if let Err(err) = self.session.set(PREMIUM_NOTICE_KEY, "1") {
            tracing::debug!(store = self.session.name(), error = %err, "could not record premium notice");
        }
        tracing::info!(?layout, "premium layout requested, rendering default layout");
        self.outputs.push(PageOutput::Notice(Notice::PremiumLayout(layout)));
    }

    fn resolve(&mut self, resolution: Resolution) {
        self.backend = match resolution {
            Resolution::Backend(backend) => Some(backend),
            Resolution::SelfManaged => None,
        };
        self.lifecycle = Lifecycle::Running;
        self.build();
    }

    fn build(&mut self) {
        let found = discover(&self.dom);
        let now = self.scheduler.now();
        let mut changes = Vec::new();
        for container in &found.containers {
            let id = CarouselId::new(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            let mut carousel =
                Carousel::new(id, container, self.config).with_labels(self.labels.clone());
            carousel.start(&mut self.dom, &self.scheduler, self.backend.as_ref(), &mut changes);
            self.carousels.push(carousel);
        }
        self.skipped = found.skipped;
        self.backends_polled_at = now;
        self.emit(changes);
        self.ensure_guard();
        tracing::info!(
            carousels = self.carousels.len(),
            skipped = self.skipped.len(),
            backend = self.backend.as_ref().map_or("none", |b| b.name()),
            "product sliders initialized"
        );
    }

    fn rebuild_all(&mut self) {
        for carousel in self.carousels.drain(..) {
            carousel.teardown(&mut self.dom);
        }
        self.release_detached();
        self.rebuilds += 1;
        tracing::debug!(rebuild = self.rebuilds, "rebuilding product sliders");
        self.build();
    }

    fn release_detached(&mut self) {
        let released = self.dom.prune();
        if released > 0 {
            self.released_nodes += released as u64;
            tracing::debug!(released, "released detached document nodes");
        }
    }

    fn ensure_guard(&mut self) {
        let animated = self.carousels.iter().any(|c| c.mode() == Mode::Animated);
        if !animated {
            self.guard = None;
        } else if self.guard.is_none() {
            self.guard = Some(
                self.scheduler
                    .interval(self.config.guard.interval, TimerTag::Guard),
            );
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Deliver a host event. Container events reach a carousel only when
    /// the matching listener is attached to its container.
    pub fn push_event(&mut self, event: PageEvent) {
        if self.lifecycle != Lifecycle::Running {
            tracing::trace!(?event, lifecycle = ?self.lifecycle, "event ignored");
            return;
        }
        let now = self.scheduler.now();
        match event {
            PageEvent::Resize { width, height } => {
                self.resize.trigger(&self.scheduler, (width, height));
            }
            PageEvent::ContentChanged => {
                self.rebuild.trigger(&self.scheduler, ());
            }
            PageEvent::Pointer { container, .. }
            | PageEvent::Click { container, .. }
            | PageEvent::Touch { container, .. } => {
                if !self
                    .dom
                    .listeners(container)
                    .contains(event.required_listener())
                {
                    return;
                }
                let Some(carousel) = self
                    .carousels
                    .iter_mut()
                    .find(|c| c.container() == container)
                else {
                    return;
                };
                let mut changes = Vec::new();
                match event {
                    PageEvent::Pointer {
                        kind: PointerKind::Enter,
                        ..
                    } => carousel.pointer_enter(),
                    PageEvent::Pointer {
                        kind: PointerKind::Leave,
                        ..
                    } => carousel.pointer_leave(&self.scheduler),
                    PageEvent::Click { target, .. } => {
                        carousel.click(&mut self.dom, target, now, &mut changes);
                    }
                    PageEvent::Touch {
                        phase: TouchPhase::Start,
                        x,
                        ..
                    } => carousel.touch_start(x),
                    PageEvent::Touch {
                        phase: TouchPhase::End,
                        x,
                        ..
                    } => carousel.touch_end(&mut self.dom, x, now, &mut changes),
                    PageEvent::Resize { .. } | PageEvent::ContentChanged => {}
                }
                self.emit(changes);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance time by `dt`, firing every timer and backend deadline that
    /// falls within it in order.
    pub fn advance(&mut self, dt: Duration) {
        let target = self.scheduler.now().saturating_add(dt);
        if !matches!(self.lifecycle, Lifecycle::Detecting | Lifecycle::Running) {
            self.scheduler.set_now(target);
            return;
        }
        loop {
            let next_timer = self.scheduler.next_due();
            let next_backend = self
                .carousels
                .iter()
                .filter_map(Carousel::next_backend_deadline)
                .filter(|d| *d > self.backends_polled_at)
                .min();
            let next = match (next_timer, next_backend) {
                (Some(t), Some(b)) => Some(t.min(b)),
                (t, b) => t.or(b),
            };
            let Some(next) = next.filter(|n| *n <= target) else {
                break;
            };
            if next_timer == Some(next) {
                if let Some(fired) = self.scheduler.pop_due(next) {
                    self.dispatch(fired);
                }
            } else {
                self.scheduler.set_now(next);
                self.sync_backends();
            }
        }
        self.scheduler.set_now(target);
        self.sync_backends();
    }

    fn dispatch(&mut self, fired: Fired) {
        match fired.tag {
            TimerTag::Probe => {
                if self.probe.owns(fired.id) {
                    if let Some(resolution) = self.probe.on_tick() {
                        self.resolve(resolution);
                    }
                }
            }
            TimerTag::Guard => {
                if self.guard.as_ref().is_some_and(|g| g.id() == fired.id) {
                    self.run_guard();
                }
            }
            TimerTag::ResizeQuiet => {
                if let Some(size) = self.resize.fire(fired.id) {
                    self.apply_resize(size);
                }
            }
            TimerTag::Rebuild => {
                if self.rebuild.fire(fired.id).is_some() {
                    self.rebuild_all();
                }
            }
            TimerTag::Autoplay(id) | TimerTag::Settle(id) => {
                let mut changes = Vec::new();
                if let Some(carousel) = self.carousels.iter_mut().find(|c| c.id() == id) {
                    carousel.on_timer(fired, &mut self.dom, &self.scheduler, &mut changes);
                }
                self.emit(changes);
            }
        }
    }

    fn sync_backends(&mut self) {
        let now = self.scheduler.now();
        let mut changes = Vec::new();
        for carousel in &mut self.carousels {
            carousel.sync_backend(&mut self.dom, now, &mut changes);
        }
        self.backends_polled_at = now;
        self.emit(changes);
    }

    fn apply_resize(&mut self, size: (u32, u32)) {
        self.viewport = Some(size);
        for carousel in &mut self.carousels {
            carousel.refresh_layout(&mut self.dom);
        }
        tracing::debug!(width = size.0, height = size.1, "layout refreshed after resize");
    }

    fn run_guard(&mut self) {
        let now = self.scheduler.now();
        let mut changes = Vec::new();
        let report = guard::run(
            &mut self.carousels,
            &mut self.dom,
            now,
            self.config.guard.max_sane_px,
            &mut changes,
        );
        self.guard_repairs += report.repairs.len() as u64;
        self.last_guard = report;
        self.emit(changes);
    }

    fn emit(&mut self, changes: Vec<SlideChanged>) {
        self.outputs
            .extend(changes.into_iter().map(PageOutput::SlideChanged));
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Structured snapshot of the engine.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let now = self.scheduler.now();
        let backend = match self.probe.state() {
            ProbeState::Idle | ProbeState::Polling => BackendStatus::Pending,
            ProbeState::Found { backend, .. } => BackendStatus::Available(backend.name().to_owned()),
            ProbeState::Exhausted => BackendStatus::Unavailable,
            ProbeState::Cancelled => BackendStatus::Cancelled,
        };
        Diagnostics {
            lifecycle: self.lifecycle,
            now,
            backend,
            probe_attempts: self.probe.attempts(),
            carousels: self
                .carousels
                .iter()
                .map(|c| CarouselReport {
                    id: c.id(),
                    product_id: c.product_id().to_owned(),
                    container: c.container(),
                    mode: c.mode(),
                    strategy: c.strategy(),
                    state: c.state(now),
                    slide_count: c.slide_count(),
                    timers: c.timer_count(),
                    fallback: c.fallback_reason().cloned(),
                })
                .collect(),
            skipped: self.skipped.clone(),
            active_timers: self.scheduler.active_count(),
            rebuilds: self.rebuilds,
            released_nodes: self.released_nodes,
            guard_repairs: self.guard_repairs,
            viewport: self.viewport,
        }
    }
}

impl<D: Dom> Drop for Page<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

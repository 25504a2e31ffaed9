#![forbid(unsafe_code)]

//! The per-container slide state machine.
//!
//! A [`Carousel`] owns one container's fixed slide sequence, its active
//! index, and every timer and listener it needs. It runs under one of two
//! strategies, picked once at [`Carousel::start`]:
//!
//! - **Self-managed**: all slides share one box; the active slide is opaque
//!   and on top, the rest are transparent underneath. Autoplay is an owned
//!   interval timer. The rendering surface interpolates opacity.
//! - **Backend**: an [`BackendInstance`] animates, swipes and autoplays. The
//!   carousel mirrors its index from backend notices and layers hover pause
//!   and click-advance on top.
//!
//! # State machine
//!
//! ```text
//! Idle --start--> Showing(0)
//! Showing(i) --autoplay/click/swipe--> Transitioning(i -> i±1) --> Showing(i±1)
//! Showing(i) --pointer enter--> Paused(i)
//! Paused(i) --leave + settle--> Showing(i)        (HoverExit::Resume)
//! Paused(i) --leave + settle--> Transitioning(i -> 0) --> Showing(0)
//!                                                  (HoverExit::ResetToFirst)
//! any --teardown--> (consumed)
//! ```
//!
//! # Invariants
//!
//! 1. `active_index < slide_count()` at all times.
//! 2. Navigation moves by exactly ±1 modulo the slide count. The only other
//!    move is the configured hover-exit reset to slide 0.
//! 3. Requests arriving while a transition is in flight are dropped.
//! 4. A single-slide carousel owns no timers and no listeners, and never
//!    writes to the document.
//! 5. At most one autoplay timer and one settle timer exist per carousel;
//!    both are released when the carousel is torn down.
//! 6. No autoplay tick fires while the pointer is over the container.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use prodslide_core::discovery::{DiscoveredContainer, LOADING_CLASS, SlideNode, SliderFrame};
use prodslide_core::dom::{Dom, Listeners, NodeId};
use prodslide_core::settings::{HoverExit, SlideLabels};
use prodslide_core::style::{SlideVisual, prop};

use crate::backend::{AnimationBackend, BackendError, BackendInstance, BackendNotice, BackendOptions};
use crate::config::EngineConfig;
use crate::guard::{self, Corruption};
use crate::scheduler::{Fired, Scheduler, TimerHandle, TimerId, TimerTag};

/// Name of the DOM event dispatched on a container when its slide changes.
pub const SLIDE_CHANGE_EVENT: &str = "wcpls:slideChange";

/// Page-unique carousel identifier. Never reused across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarouselId(u32);

impl CarouselId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CarouselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "carousel-{}", self.0)
    }
}

/// Whether any transition machinery is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One slide, rendered static.
    Single,
    /// Two or more slides.
    Animated,
}

/// Transition strategy, fixed at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Backend,
    SelfManaged,
}

impl StrategyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::SelfManaged => "self-managed",
        }
    }
}

/// Externally observable carousel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselState {
    /// Constructed, not yet started.
    Idle,
    /// Slide fully visible; autoplay armed.
    Showing(usize),
    /// Slide fully visible; autoplay disarmed by hover.
    Paused(usize),
    /// Visual change in flight.
    Transitioning { from: usize, to: usize },
}

/// Notification that a carousel's active slide changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideChanged {
    pub carousel: CarouselId,
    pub product_id: String,
    pub index: usize,
}

/// Result of one guard audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Single-slide or not started; nothing to audit.
    NotAnimated,
    /// A transition is in flight; try again next period.
    Deferred,
    /// All dimensions sane.
    Clean,
    /// Extreme values were reset.
    Repaired(Corruption),
}

enum Strategy {
    SelfManaged,
    Backend(Box<dyn BackendInstance>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Steady,
    Transitioning {
        from: usize,
        to: usize,
        until: Duration,
    },
}

/// Navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Next,
    Prev,
    First,
}

/// One slider container under engine control.
pub struct Carousel {
    id: CarouselId,
    product_id: String,
    container: NodeId,
    frame: Option<SliderFrame>,
    slides: Vec<SlideNode>,
    mode: Mode,
    strategy: Strategy,
    active_index: usize,
    is_paused: bool,
    phase: Phase,
    config: EngineConfig,
    labels: SlideLabels,
    autoplay: Option<TimerHandle>,
    settle: Option<TimerHandle>,
    touch_start_x: Option<f32>,
    listeners: Listeners,
    fallback: Option<BackendError>,
}

impl fmt::Debug for Carousel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Carousel")
            .field("id", &self.id)
            .field("product_id", &self.product_id)
            .field("mode", &self.mode)
            .field("strategy", &self.strategy())
            .field("active_index", &self.active_index)
            .field("is_paused", &self.is_paused)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Carousel {
    /// Construct an idle carousel for a discovered container.
    #[must_use]
    pub fn new(id: CarouselId, found: &DiscoveredContainer, config: EngineConfig) -> Self {
        let mode = if found.is_single() {
            Mode::Single
        } else {
            Mode::Animated
        };
        Self {
            id,
            product_id: found.product_id.clone(),
            container: found.node,
            frame: found.frame,
            slides: found.slides.clone(),
            mode,
            strategy: Strategy::SelfManaged,
            active_index: 0,
            is_paused: false,
            phase: Phase::Idle,
            config,
            labels: SlideLabels::default(),
            autoplay: None,
            settle: None,
            touch_start_x: None,
            listeners: Listeners::empty(),
            fallback: None,
        }
    }

    /// Navigation labels handed to the animation backend.
    #[must_use]
    pub fn with_labels(mut self, labels: SlideLabels) -> Self {
        self.labels = labels;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn id(&self) -> CarouselId {
        self.id
    }

    #[must_use]
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    #[must_use]
    pub fn container(&self) -> NodeId {
        self.container
    }

    #[must_use]
    pub fn slides(&self) -> &[SlideNode] {
        &self.slides
    }

    #[must_use]
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        match self.strategy {
            Strategy::SelfManaged => StrategyKind::SelfManaged,
            Strategy::Backend(_) => StrategyKind::Backend,
        }
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active_index
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Listeners this carousel attached to its container.
    #[must_use]
    pub fn listeners(&self) -> Listeners {
        self.listeners
    }

    /// Why the backend strategy was abandoned, if it was.
    #[must_use]
    pub fn fallback_reason(&self) -> Option<&BackendError> {
        self.fallback.as_ref()
    }

    /// Live timers owned by this carousel.
    #[must_use]
    pub fn timer_count(&self) -> usize {
        [self.autoplay.as_ref(), self.settle.as_ref()]
            .into_iter()
            .flatten()
            .filter(|t| t.is_live())
            .count()
    }

    /// Whether `id` is one of this carousel's timers.
    #[must_use]
    pub fn owns_timer(&self, id: TimerId) -> bool {
        [self.autoplay.as_ref(), self.settle.as_ref()]
            .into_iter()
            .flatten()
            .any(|t| t.id() == id)
    }

    /// Whether the backend instance's autoplay is running.
    #[must_use]
    pub fn backend_autoplay_running(&self) -> Option<bool> {
        match &self.strategy {
            Strategy::Backend(instance) => Some(instance.autoplay_running()),
            Strategy::SelfManaged => None,
        }
    }

    /// Observable state at `now`.
    #[must_use]
    pub fn state(&self, now: Duration) -> CarouselState {
        match self.phase {
            Phase::Idle => CarouselState::Idle,
            Phase::Transitioning { from, to, until } if now < until => {
                CarouselState::Transitioning { from, to }
            }
            _ if self.is_paused => CarouselState::Paused(self.active_index),
            _ => CarouselState::Showing(self.active_index),
        }
    }

    /// Next time the backend instance wants to be polled.
    #[must_use]
    pub fn next_backend_deadline(&self) -> Option<Duration> {
        match &self.strategy {
            Strategy::Backend(instance) => instance.next_deadline(),
            Strategy::SelfManaged => None,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// `Idle -> Showing(0)`: pick the strategy, style the container, attach
    /// listeners and arm autoplay. Single-slide carousels only change state.
    pub fn start(
        &mut self,
        dom: &mut dyn Dom,
        scheduler: &Scheduler,
        backend: Option<&Rc<dyn AnimationBackend>>,
        out: &mut Vec<SlideChanged>,
    ) {
        if self.phase != Phase::Idle {
            return;
        }
        self.phase = Phase::Steady;
        self.active_index = 0;
        if self.mode == Mode::Single {
            tracing::debug!(carousel = %self.id, product_id = %self.product_id, "single image, static");
            return;
        }

        if let Some(backend) = backend {
            // Backend construction runs its init synchronously, so the
            // loading state spans exactly the constructor call.
            dom.add_class(self.container, LOADING_CLASS);
            let created = self.create_backend(dom, &**backend);
            dom.remove_class(self.container, LOADING_CLASS);
            match created {
                Ok(instance) => {
                    self.strategy = Strategy::Backend(instance);
                    self.attach(dom, Listeners::HOVER | Listeners::CLICK);
                    tracing::debug!(
                        carousel = %self.id,
                        product_id = %self.product_id,
                        backend = backend.name(),
                        slides = self.slides.len(),
                        "carousel started with animation backend"
                    );
                    self.sync_backend(dom, scheduler.now(), out);
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        carousel = %self.id,
                        product_id = %self.product_id,
                        error = %err,
                        "backend construction failed, falling back to self-managed"
                    );
                    self.fallback = Some(err);
                }
            }
        }

        self.apply_layout(dom);
        self.apply_visuals(dom);
        self.attach(dom, Listeners::HOVER | Listeners::CLICK | Listeners::TOUCH);
        self.arm_autoplay(scheduler);
        tracing::debug!(
            carousel = %self.id,
            product_id = %self.product_id,
            slides = self.slides.len(),
            "carousel started self-managed"
        );
    }

    fn create_backend(
        &self,
        dom: &mut dyn Dom,
        backend: &dyn AnimationBackend,
    ) -> Result<Box<dyn BackendInstance>, BackendError> {
        let frame = self.frame.ok_or(BackendError::MissingElement(".swiper"))?;
        // Start from sane dimensions; stale inline values confuse the backend.
        guard::reset_slide_widths(dom, &self.slides);
        dom.set_style(frame.wrapper, prop::TRANSFORM, "");
        let options = BackendOptions::new(&self.config, frame.pagination).with_labels(&self.labels);
        backend.create(dom, frame.frame, &options)
    }

    /// Release timers, listeners and the backend instance.
    pub fn teardown(mut self, dom: &mut dyn Dom) {
        self.autoplay = None;
        self.settle = None;
        if !self.listeners.is_empty() {
            dom.remove_listeners(self.container, self.listeners);
        }
        if let Strategy::Backend(instance) = std::mem::replace(&mut self.strategy, Strategy::SelfManaged) {
            instance.destroy(dom);
        }
        tracing::debug!(carousel = %self.id, product_id = %self.product_id, "carousel torn down");
    }

    fn attach(&mut self, dom: &mut dyn Dom, listeners: Listeners) {
        dom.add_listeners(self.container, listeners);
        self.listeners |= listeners;
    }

    fn arm_autoplay(&mut self, scheduler: &Scheduler) {
        // Cancel before replacing.
        self.autoplay = None;
        self.autoplay = Some(scheduler.interval(
            self.config.settings.speed,
            TimerTag::Autoplay(self.id),
        ));
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    /// Pointer entered the container: pause immediately.
    pub fn pointer_enter(&mut self) {
        if self.mode == Mode::Single || self.phase == Phase::Idle {
            return;
        }
        self.is_paused = true;
        self.settle = None;
        self.autoplay = None;
        if let Strategy::Backend(instance) = &mut self.strategy {
            instance.autoplay_stop();
        }
        tracing::trace!(carousel = %self.id, index = self.active_index, "paused");
    }

    /// Pointer left the container: resume after the settle delay.
    pub fn pointer_leave(&mut self, scheduler: &Scheduler) {
        if !self.is_paused {
            return;
        }
        self.settle = None;
        self.settle = Some(scheduler.timeout(self.config.settle_delay, TimerTag::Settle(self.id)));
    }

    /// Click inside the container. Clicks on links pass through.
    pub fn click(
        &mut self,
        dom: &mut dyn Dom,
        target: NodeId,
        now: Duration,
        out: &mut Vec<SlideChanged>,
    ) {
        if self.mode == Mode::Single || self.phase == Phase::Idle {
            return;
        }
        if dom.has_ancestor_tag(target, "a", self.container) {
            tracing::trace!(carousel = %self.id, "click on link, not advancing");
            return;
        }
        self.request(dom, Step::Next, now, out);
    }

    pub fn touch_start(&mut self, x: f32) {
        if self.mode == Mode::Animated && x.is_finite() {
            self.touch_start_x = Some(x);
        }
    }

    /// Touch ended at `x`. Leftward displacement at or beyond the threshold
    /// advances, rightward goes back; anything shorter is ignored.
    pub fn touch_end(&mut self, dom: &mut dyn Dom, x: f32, now: Duration, out: &mut Vec<SlideChanged>) {
        let Some(start) = self.touch_start_x.take() else {
            return;
        };
        if !x.is_finite() {
            return;
        }
        let diff = start - x;
        if diff.abs() < self.config.swipe_threshold {
            return;
        }
        let step = if diff > 0.0 { Step::Next } else { Step::Prev };
        self.request(dom, step, now, out);
    }

    /// Handle one of this carousel's timers.
    pub fn on_timer(
        &mut self,
        fired: Fired,
        dom: &mut dyn Dom,
        scheduler: &Scheduler,
        out: &mut Vec<SlideChanged>,
    ) {
        if !self.owns_timer(fired.id) {
            return;
        }
        match fired.tag {
            TimerTag::Autoplay(_) => {
                if !self.is_paused {
                    self.request(dom, Step::Next, fired.at, out);
                }
            }
            TimerTag::Settle(_) => {
                self.settle = None;
                self.is_paused = false;
                if self.config.settings.hover_exit == HoverExit::ResetToFirst && self.active_index != 0 {
                    self.request(dom, Step::First, fired.at, out);
                }
                match &mut self.strategy {
                    Strategy::SelfManaged => self.arm_autoplay(scheduler),
                    Strategy::Backend(instance) => instance.autoplay_start(),
                }
                self.sync_backend(dom, fired.at, out);
                tracing::trace!(carousel = %self.id, index = self.active_index, "resumed");
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn request(&mut self, dom: &mut dyn Dom, step: Step, now: Duration, out: &mut Vec<SlideChanged>) {
        if let Phase::Transitioning { to, until, .. } = self.phase {
            if now < until {
                tracing::trace!(carousel = %self.id, to, ?step, "transition in flight, request dropped");
                return;
            }
        }
        let n = self.slides.len();
        let target = match step {
            Step::Next => (self.active_index + 1) % n,
            Step::Prev => (self.active_index + n - 1) % n,
            Step::First => 0,
        };
        match &mut self.strategy {
            Strategy::SelfManaged => {
                self.move_to(target, now);
                self.apply_visuals(dom);
                self.emit(dom, out);
            }
            Strategy::Backend(instance) => {
                match step {
                    Step::Next => instance.slide_next(dom),
                    Step::Prev => instance.slide_prev(dom),
                    Step::First => instance.slide_to(dom, 0, self.config.transition),
                }
                self.sync_backend(dom, now, out);
            }
        }
    }

    fn move_to(&mut self, target: usize, now: Duration) {
        let from = self.active_index;
        self.active_index = target;
        self.phase = Phase::Transitioning {
            from,
            to: target,
            until: now.saturating_add(self.config.transition),
        };
    }

    fn emit(&self, dom: &mut dyn Dom, out: &mut Vec<SlideChanged>) {
        dom.dispatch_custom(self.container, SLIDE_CHANGE_EVENT, self.active_index);
        out.push(SlideChanged {
            carousel: self.id,
            product_id: self.product_id.clone(),
            index: self.active_index,
        });
    }

    /// Mirror the backend's index changes up to `now`.
    pub fn sync_backend(&mut self, dom: &mut dyn Dom, now: Duration, out: &mut Vec<SlideChanged>) {
        let Strategy::Backend(instance) = &mut self.strategy else {
            return;
        };
        let n = self.slides.len();
        for notice in instance.poll(dom, now) {
            let BackendNotice::SlideChanged(index) = notice;
            if index >= n || index == self.active_index {
                continue;
            }
            self.move_to(index, now);
            self.emit(dom, out);
        }
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    /// Stack every slide in one box. Slide 0 stays in normal flow and sizes
    /// the box through its image; the others are laid over it.
    fn apply_layout(&self, dom: &mut dyn Dom) {
        dom.set_style(self.container, prop::POSITION, "relative");
        dom.set_style(self.container, prop::OVERFLOW, "hidden");
        if let Some(frame) = self.frame {
            for node in [frame.frame, frame.wrapper] {
                dom.set_style(node, prop::POSITION, "relative");
                dom.set_style(node, prop::WIDTH, "100%");
                dom.set_style(node, prop::HEIGHT, "auto");
            }
        }
        let transition = format!("opacity {}ms ease", self.config.transition.as_millis());
        for slide in &self.slides {
            if slide.index == 0 {
                dom.set_style(slide.node, prop::POSITION, "relative");
                dom.set_style(slide.node, prop::DISPLAY, "block");
                dom.set_style(slide.node, prop::HEIGHT, "auto");
            } else {
                dom.set_style(slide.node, prop::POSITION, "absolute");
                dom.set_style(slide.node, prop::TOP, "0");
                dom.set_style(slide.node, prop::LEFT, "0");
                dom.set_style(slide.node, prop::HEIGHT, "100%");
            }
            dom.set_style(slide.node, prop::WIDTH, "100%");
            dom.set_style(slide.node, prop::TRANSITION, &transition);
            if let Some(image) = slide.image {
                dom.set_style(image, prop::DISPLAY, "block");
                dom.set_style(image, prop::WIDTH, "100%");
                dom.set_style(image, prop::HEIGHT, "auto");
            }
        }
        if let Some(pagination) = self.frame.and_then(|f| f.pagination) {
            dom.set_style(pagination, prop::DISPLAY, "none");
        }
    }

    fn apply_visuals(&self, dom: &mut dyn Dom) {
        for slide in &self.slides {
            let visual = SlideVisual::for_slide(slide.index, self.active_index);
            dom.set_style(slide.node, prop::OPACITY, &visual.opacity_value());
            dom.set_style(slide.node, prop::Z_INDEX, &visual.layer_value());
        }
    }

    /// Re-apply layout after a resize. Never changes the index or touches
    /// autoplay.
    pub fn refresh_layout(&mut self, dom: &mut dyn Dom) {
        if self.mode == Mode::Single || self.phase == Phase::Idle {
            return;
        }
        match &mut self.strategy {
            Strategy::SelfManaged => {
                self.apply_layout(dom);
                self.apply_visuals(dom);
            }
            Strategy::Backend(instance) => instance.update(dom),
        }
    }

    /// Dimension-guard audit: reset extreme values and snap to the current
    /// slide without animating. Backend changes not yet mirrored are taken
    /// first, so the snap never undoes them.
    pub fn audit(
        &mut self,
        dom: &mut dyn Dom,
        now: Duration,
        max_px: f64,
        out: &mut Vec<SlideChanged>,
    ) -> AuditOutcome {
        if self.mode == Mode::Single || self.phase == Phase::Idle {
            return AuditOutcome::NotAnimated;
        }
        self.sync_backend(dom, now, out);
        if matches!(self.phase, Phase::Transitioning { until, .. } if now < until) {
            return AuditOutcome::Deferred;
        }
        let wrapper = self.frame.map(|f| f.wrapper);
        let corruption = guard::inspect(dom, &self.slides, wrapper, max_px);
        if corruption.is_clean() {
            return AuditOutcome::Clean;
        }
        guard::reset_slide_widths(dom, &self.slides);
        if let Some(wrapper) = wrapper {
            guard::reset_transform(dom, wrapper);
        }
        let index = self.active_index;
        match &mut self.strategy {
            Strategy::SelfManaged => self.apply_visuals(dom),
            Strategy::Backend(instance) => {
                // A notice for the snap carries the mirrored index, which
                // the next sync skips.
                instance.slide_to(dom, index, Duration::ZERO);
                instance.update(dom);
            }
        }
        AuditOutcome::Repaired(corruption)
    }
}

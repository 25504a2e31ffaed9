#![forbid(unsafe_code)]

//! Scriptable animation backend for deterministic tests.
//!
//! [`SimBackend`] behaves like a minimal looping slider library: it
//! translates the wrapper by whole slide widths, runs its own autoplay on
//! the engine clock, and reports index changes through
//! [`BackendInstance::poll`]. Construction can be made to fail for chosen
//! products, and [`LateSource`] makes the backend appear only after a
//! number of probe attempts.
//!
//! Counters in [`SimStats`] are shared between the backend and every
//! instance it created, so tests can check that rebuilds destroy what they
//! create.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use prodslide_core::discovery::{LOADING_CLASS, PRODUCT_ID_ATTR, SLIDE_CLASS, WRAPPER_CLASS};
use prodslide_core::dom::{Dom, NodeId, Selector};
use prodslide_core::style::{Translate, prop};

use crate::backend::{
    AnimationBackend, BackendError, BackendInstance, BackendNotice, BackendOptions, BackendSource,
};

/// Width the simulated backend assumes for every slide.
pub const SIM_SLIDE_WIDTH_PX: f64 = 300.0;

/// Shared instance counters.
#[derive(Debug, Default)]
pub struct SimStats {
    created: Cell<usize>,
    destroyed: Cell<usize>,
    failed: Cell<usize>,
    constructed_loading: Cell<usize>,
    last_options: RefCell<Option<BackendOptions>>,
}

impl SimStats {
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.get()
    }

    #[must_use]
    pub fn destroyed(&self) -> usize {
        self.destroyed.get()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.get()
    }

    /// Construction attempts that found the container in its loading state.
    #[must_use]
    pub fn constructed_loading(&self) -> usize {
        self.constructed_loading.get()
    }

    /// Options of the most recent construction attempt.
    #[must_use]
    pub fn last_options(&self) -> Option<BackendOptions> {
        self.last_options.borrow().clone()
    }

    /// Instances created and not yet destroyed.
    #[must_use]
    pub fn live(&self) -> usize {
        self.created().saturating_sub(self.destroyed())
    }
}

/// Simulated animation backend.
#[derive(Debug, Default)]
pub struct SimBackend {
    failing: HashSet<String>,
    stats: Rc<SimStats>,
}

impl SimBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make construction throw for the container with this product id.
    #[must_use]
    pub fn failing_for(mut self, product_id: &str) -> Self {
        self.failing.insert(product_id.to_owned());
        self
    }

    #[must_use]
    pub fn stats(&self) -> Rc<SimStats> {
        Rc::clone(&self.stats)
    }

    /// Wrap into the shared handle the engine expects.
    #[must_use]
    pub fn into_shared(self) -> Rc<dyn AnimationBackend> {
        Rc::new(self)
    }
}

impl AnimationBackend for SimBackend {
    fn name(&self) -> &str {
        "sim"
    }

    fn create(
        &self,
        dom: &mut dyn Dom,
        frame: NodeId,
        options: &BackendOptions,
    ) -> Result<Box<dyn BackendInstance>, BackendError> {
        let container = dom.parent(frame);
        if container.is_some_and(|c| dom.has_class(c, LOADING_CLASS)) {
            self.stats
                .constructed_loading
                .set(self.stats.constructed_loading.get() + 1);
        }
        *self.stats.last_options.borrow_mut() = Some(options.clone());
        let product = container
            .and_then(|c| dom.attribute(c, PRODUCT_ID_ATTR))
            .unwrap_or_default();
        if self.failing.contains(&product) {
            self.stats.failed.set(self.stats.failed.get() + 1);
            return Err(BackendError::Construction(format!(
                "simulated failure for product {product}"
            )));
        }
        let wrapper = dom
            .query(Some(frame), Selector::Class(WRAPPER_CLASS))
            .ok_or(BackendError::MissingElement(".swiper-wrapper"))?;
        let slides = dom.query_all(Some(wrapper), Selector::Class(SLIDE_CLASS));
        if slides.is_empty() {
            return Err(BackendError::MissingElement(".swiper-slide"));
        }
        self.stats.created.set(self.stats.created.get() + 1);
        let instance = SimInstance {
            wrapper,
            slide_count: slides.len(),
            index: 0,
            delay: options.autoplay.delay,
            running: true,
            next_at: None,
            rearm: true,
            pending: Vec::new(),
            stats: Rc::clone(&self.stats),
        };
        instance.render(dom);
        Ok(Box::new(instance))
    }
}

#[derive(Debug)]
struct SimInstance {
    wrapper: NodeId,
    slide_count: usize,
    index: usize,
    delay: Duration,
    running: bool,
    next_at: Option<Duration>,
    /// Autoplay should restart its delay at the next poll.
    rearm: bool,
    pending: Vec<BackendNotice>,
    stats: Rc<SimStats>,
}

impl SimInstance {
    fn go(&mut self, dom: &mut dyn Dom, index: usize) {
        if index != self.index {
            self.index = index;
            self.pending.push(BackendNotice::SlideChanged(index));
        }
        self.render(dom);
        // Interaction restarts the autoplay delay, as real sliders do.
        self.rearm = true;
    }

    fn render(&self, dom: &mut dyn Dom) {
        let offset = Translate {
            x: -(self.index as f64) * SIM_SLIDE_WIDTH_PX,
            ..Translate::ZERO
        };
        dom.set_style(self.wrapper, prop::TRANSFORM, &offset.to_string());
    }
}

impl BackendInstance for SimInstance {
    fn active_index(&self) -> usize {
        self.index
    }

    fn slide_next(&mut self, dom: &mut dyn Dom) {
        self.go(dom, (self.index + 1) % self.slide_count);
    }

    fn slide_prev(&mut self, dom: &mut dyn Dom) {
        self.go(dom, (self.index + self.slide_count - 1) % self.slide_count);
    }

    fn slide_to(&mut self, dom: &mut dyn Dom, index: usize, _speed: Duration) {
        self.go(dom, index.min(self.slide_count - 1));
    }

    fn autoplay_start(&mut self) {
        if !self.running {
            self.running = true;
            self.rearm = true;
        }
    }

    fn autoplay_stop(&mut self) {
        self.running = false;
        self.next_at = None;
    }

    fn autoplay_running(&self) -> bool {
        self.running
    }

    fn update(&mut self, dom: &mut dyn Dom) {
        self.render(dom);
    }

    fn poll(&mut self, dom: &mut dyn Dom, now: Duration) -> Vec<BackendNotice> {
        if self.running {
            if self.rearm || self.next_at.is_none() {
                self.next_at = Some(now.saturating_add(self.delay));
                self.rearm = false;
            }
            while let Some(at) = self.next_at.filter(|at| *at <= now) {
                self.go(dom, (self.index + 1) % self.slide_count);
                self.rearm = false;
                self.next_at = Some(at.saturating_add(self.delay));
            }
        }
        std::mem::take(&mut self.pending)
    }

    fn next_deadline(&self) -> Option<Duration> {
        if self.running { self.next_at } else { None }
    }

    fn destroy(self: Box<Self>, _dom: &mut dyn Dom) {
        self.stats.destroyed.set(self.stats.destroyed.get() + 1);
    }
}

/// A source whose backend loads after `ready_after` probe attempts.
#[derive(Debug)]
pub struct LateSource<B> {
    backend: Rc<B>,
    ready_after: u32,
    calls: Cell<u32>,
}

impl<B> LateSource<B> {
    #[must_use]
    pub fn new(backend: Rc<B>, ready_after: u32) -> Self {
        Self {
            backend,
            ready_after,
            calls: Cell::new(0),
        }
    }
}

impl<B: AnimationBackend + 'static> BackendSource for LateSource<B> {
    fn resolve(&self) -> Option<Rc<dyn AnimationBackend>> {
        self.calls.set(self.calls.get() + 1);
        (self.calls.get() >= self.ready_after).then(|| Rc::clone(&self.backend) as Rc<dyn AnimationBackend>)
    }
}

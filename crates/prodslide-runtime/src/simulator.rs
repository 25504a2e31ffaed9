#![forbid(unsafe_code)]

//! Deterministic page simulator for testing.
//!
//! [`PageSimulator`] runs a [`Page`] over an in-memory document with no
//! browser: markup is built with [`Markup`], input is injected through
//! helper methods, time moves only when told to, and every output is
//! recorded for inspection.
//!
//! # Example
//!
//! ```
//! use prodslide_runtime::backend::Unavailable;
//! use prodslide_runtime::config::EngineConfig;
//! use prodslide_runtime::simulator::{Markup, PageSimulator};
//!
//! let mut markup = Markup::new();
//! let product = markup.product("42", 3);
//! let mut sim = PageSimulator::new(markup.finish(), EngineConfig::default(), Unavailable);
//! sim.start();
//! sim.advance_ms(10_000);
//! assert_eq!(sim.visible_slides(product).len(), 1);
//! ```

use std::time::Duration;

use prodslide_core::discovery::{
    CONTAINER_CLASS, FRAME_CLASS, PAGINATION_CLASS, PRODUCT_ID_ATTR, SLIDE_CLASS, WRAPPER_CLASS,
};
use prodslide_core::dom::{Dom, ElementSpec, MemoryDom, NodeId, Selector};
use prodslide_core::event::{PageEvent, PointerKind, TouchPhase};
use prodslide_core::session::SessionStore;
use prodslide_core::style::{SlideVisual, prop};

use crate::backend::BackendSource;
use crate::carousel::SlideChanged;
use crate::config::EngineConfig;
use crate::page::{Diagnostics, Page, PageOutput};

/// Builder for storefront listing markup.
#[derive(Debug)]
pub struct Markup {
    dom: MemoryDom,
    body: NodeId,
}

impl Default for Markup {
    fn default() -> Self {
        Self::new()
    }
}

impl Markup {
    #[must_use]
    pub fn new() -> Self {
        let mut dom = MemoryDom::new();
        let body = dom.append(None, ElementSpec::new("body"));
        Self { dom, body }
    }

    fn container(&mut self, product_id: &str) -> NodeId {
        self.dom.append(
            Some(self.body),
            ElementSpec::new("div")
                .class(CONTAINER_CLASS)
                .attr(PRODUCT_ID_ATTR, product_id),
        )
    }

    /// Multi-image product: frame, wrapper, `images` slides, pagination.
    pub fn product(&mut self, product_id: &str, images: usize) -> NodeId {
        let container = self.container(product_id);
        let frame = self
            .dom
            .append(Some(container), ElementSpec::new("div").class(FRAME_CLASS));
        let wrapper = self
            .dom
            .append(Some(frame), ElementSpec::new("div").class(WRAPPER_CLASS));
        for i in 0..images {
            let slide = self
                .dom
                .append(Some(wrapper), ElementSpec::new("div").class(SLIDE_CLASS));
            self.dom.append(
                Some(slide),
                ElementSpec::new("img").attr("alt", &format!("{product_id} image {}", i + 1)),
            );
        }
        self.dom
            .append(Some(frame), ElementSpec::new("div").class(PAGINATION_CLASS));
        container
    }

    /// Single-image product: one bare image, no slider frame.
    pub fn single(&mut self, product_id: &str) -> NodeId {
        let container = self.container(product_id);
        self.dom.append(
            Some(container),
            ElementSpec::new("img").class("single-product-image"),
        );
        container
    }

    /// Container with a slider frame but no slide wrapper.
    pub fn broken(&mut self, product_id: &str) -> NodeId {
        let container = self.container(product_id);
        self.dom
            .append(Some(container), ElementSpec::new("div").class(FRAME_CLASS));
        container
    }

    /// Add a product link with text inside the first slide of `container`.
    /// Returns the text node inside the link.
    pub fn link(&mut self, container: NodeId, href: &str) -> NodeId {
        let slide = self
            .dom
            .query(Some(container), Selector::Class(SLIDE_CLASS))
            .unwrap_or(container);
        let anchor = self
            .dom
            .append(Some(slide), ElementSpec::new("a").attr("href", href));
        self.dom.append(Some(anchor), ElementSpec::new("span"))
    }

    #[must_use]
    pub fn finish(self) -> MemoryDom {
        self.dom
    }
}

/// Deterministic host for a [`Page`].
#[derive(Debug)]
pub struct PageSimulator {
    page: Page<MemoryDom>,
    outputs: Vec<PageOutput>,
}

impl PageSimulator {
    pub fn new(dom: MemoryDom, config: EngineConfig, source: impl BackendSource + 'static) -> Self {
        Self {
            page: Page::new(dom, config, source),
            outputs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_session(self, session: impl SessionStore + 'static) -> Self {
        Self {
            page: self.page.with_session(session),
            outputs: self.outputs,
        }
    }

    pub fn start(&mut self) {
        self.page.start();
        self.collect();
    }

    /// Advance simulated time.
    pub fn advance(&mut self, dt: Duration) {
        self.page.advance(dt);
        self.collect();
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Advance to an absolute time; no-op if already past it.
    pub fn advance_to_ms(&mut self, ms: u64) {
        let target = Duration::from_millis(ms);
        let now = self.page.now();
        if target > now {
            self.advance(target - now);
        }
    }

    #[must_use]
    pub fn now_ms(&self) -> u128 {
        self.page.now().as_millis()
    }

    pub fn event(&mut self, event: PageEvent) {
        self.page.push_event(event);
        self.collect();
    }

    pub fn hover(&mut self, container: NodeId) {
        self.event(PageEvent::Pointer {
            container,
            kind: PointerKind::Enter,
        });
    }

    pub fn unhover(&mut self, container: NodeId) {
        self.event(PageEvent::Pointer {
            container,
            kind: PointerKind::Leave,
        });
    }

    pub fn click(&mut self, container: NodeId, target: NodeId) {
        self.event(PageEvent::Click { container, target });
    }

    /// Touch down at `from_x` and lift at `to_x`.
    pub fn swipe(&mut self, container: NodeId, from_x: f32, to_x: f32) {
        self.event(PageEvent::Touch {
            container,
            phase: TouchPhase::Start,
            x: from_x,
        });
        self.event(PageEvent::Touch {
            container,
            phase: TouchPhase::End,
            x: to_x,
        });
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.event(PageEvent::Resize { width, height });
    }

    pub fn content_changed(&mut self) {
        self.event(PageEvent::ContentChanged);
    }

    pub fn shutdown(&mut self) {
        self.page.shutdown();
        self.collect();
    }

    fn collect(&mut self) {
        self.outputs.extend(self.page.take_outputs());
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn page(&self) -> &Page<MemoryDom> {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page<MemoryDom> {
        &mut self.page
    }

    #[must_use]
    pub fn dom(&self) -> &MemoryDom {
        self.page.dom()
    }

    pub fn dom_mut(&mut self) -> &mut MemoryDom {
        self.page.dom_mut()
    }

    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        self.page.diagnostics()
    }

    /// Active index of the carousel bound to `container`.
    #[must_use]
    pub fn active_index(&self, container: NodeId) -> Option<usize> {
        self.page.carousel_for(container).map(|c| c.active_index())
    }

    /// Slides whose inline styles mark them as the shown slide.
    #[must_use]
    pub fn visible_slides(&self, container: NodeId) -> Vec<usize> {
        let Some(carousel) = self.page.carousel_for(container) else {
            return Vec::new();
        };
        let dom = self.page.dom();
        carousel
            .slides()
            .iter()
            .filter(|slide| {
                SlideVisual::from_inline(
                    dom.style(slide.node, prop::OPACITY).as_deref(),
                    dom.style(slide.node, prop::Z_INDEX).as_deref(),
                )
                .is_some_and(|v| v.is_shown())
            })
            .map(|slide| slide.index)
            .collect()
    }

    /// Every output recorded so far.
    #[must_use]
    pub fn outputs(&self) -> &[PageOutput] {
        &self.outputs
    }

    /// Slide changes recorded so far.
    pub fn slide_changes(&self) -> impl Iterator<Item = &SlideChanged> {
        self.outputs.iter().filter_map(|o| match o {
            PageOutput::SlideChanged(change) => Some(change),
            PageOutput::Notice(_) => None,
        })
    }

    /// Indices reported for one product, in order.
    #[must_use]
    pub fn indices_for(&self, product_id: &str) -> Vec<usize> {
        self.slide_changes()
            .filter(|c| c.product_id == product_id)
            .map(|c| c.index)
            .collect()
    }

    pub fn clear_outputs(&mut self) {
        self.outputs.clear();
    }
}

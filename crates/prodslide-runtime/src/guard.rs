#![forbid(unsafe_code)]

//! Dimension-corruption guard.
//!
//! Animation backends have been seen computing slide widths and wrapper
//! translations in the millions of pixels. The guard audits every animated
//! carousel on a fixed period and, when it finds an extreme value, puts the
//! slide widths back to `100%`, the wrapper transform back to zero
//! translation, and snaps the carousel to its current slide without
//! animating.
//!
//! # Invariants
//!
//! 1. **Idempotent**: a sane carousel is only read, never written.
//! 2. **Index-preserving**: a repair never changes `active_index`.
//! 3. **Transition-safe**: carousels mid-transition are skipped until the
//!    next audit.

use std::time::Duration;

use prodslide_core::discovery::SlideNode;
use prodslide_core::dom::{Dom, NodeId};
use prodslide_core::style::{Length, Translate, is_extreme_length, is_extreme_transform, prop};

use crate::carousel::{AuditOutcome, Carousel, CarouselId, SlideChanged};

const WIDTH_PROPS: [&str; 3] = [prop::WIDTH, prop::MIN_WIDTH, prop::MAX_WIDTH];

/// Extreme values found on one carousel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Corruption {
    /// Slides with at least one extreme width property.
    pub slide_widths: usize,
    /// Whether the wrapper transform is extreme.
    pub transform: bool,
}

impl Corruption {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.slide_widths == 0 && !self.transform
    }
}

/// Read-only audit of slide widths and the wrapper transform.
#[must_use]
pub fn inspect(
    dom: &dyn Dom,
    slides: &[SlideNode],
    wrapper: Option<NodeId>,
    max_px: f64,
) -> Corruption {
    let slide_widths = slides
        .iter()
        .filter(|slide| {
            WIDTH_PROPS.iter().any(|p| {
                dom.style(slide.node, p)
                    .is_some_and(|v| is_extreme_length(&v, max_px))
            })
        })
        .count();
    let transform = wrapper.is_some_and(|w| {
        dom.style(w, prop::TRANSFORM)
            .is_some_and(|v| is_extreme_transform(&v, max_px))
    });
    Corruption {
        slide_widths,
        transform,
    }
}

/// Force every slide to full width.
pub fn reset_slide_widths(dom: &mut dyn Dom, slides: &[SlideNode]) {
    let full = Length::FULL.to_string();
    for slide in slides {
        for p in WIDTH_PROPS {
            dom.set_style(slide.node, p, &full);
        }
    }
}

/// Force the wrapper back to zero translation.
pub fn reset_transform(dom: &mut dyn Dom, wrapper: NodeId) {
    dom.set_style(wrapper, prop::TRANSFORM, &Translate::ZERO.to_string());
}

/// One repaired carousel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRepair {
    pub carousel: CarouselId,
    pub product_id: String,
    pub corruption: Corruption,
    /// Index the carousel was snapped to (unchanged by the repair).
    pub active_index: usize,
}

/// Result of one guard pass over a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardReport {
    /// Animated carousels audited.
    pub inspected: usize,
    /// Carousels skipped because a transition was in flight.
    pub deferred: usize,
    pub repairs: Vec<GuardRepair>,
}

impl GuardReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.repairs.is_empty()
    }
}

/// Audit every carousel once. Slide changes mirrored from backends on the
/// way are pushed to `out`.
pub fn run(
    carousels: &mut [Carousel],
    dom: &mut dyn Dom,
    now: Duration,
    max_px: f64,
    out: &mut Vec<SlideChanged>,
) -> GuardReport {
    let mut report = GuardReport::default();
    for carousel in carousels.iter_mut() {
        match carousel.audit(dom, now, max_px, out) {
            AuditOutcome::NotAnimated => {}
            AuditOutcome::Deferred => report.deferred += 1,
            AuditOutcome::Clean => report.inspected += 1,
            AuditOutcome::Repaired(corruption) => {
                report.inspected += 1;
                tracing::debug!(
                    carousel = %carousel.id(),
                    product_id = carousel.product_id(),
                    slide_widths = corruption.slide_widths,
                    transform = corruption.transform,
                    active_index = carousel.active_index(),
                    "guard repaired corrupted dimensions"
                );
                report.repairs.push(GuardRepair {
                    carousel: carousel.id(),
                    product_id: carousel.product_id().to_owned(),
                    corruption,
                    active_index: carousel.active_index(),
                });
            }
        }
    }
    report
}

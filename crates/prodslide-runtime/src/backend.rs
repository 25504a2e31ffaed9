#![forbid(unsafe_code)]

//! Animation backend capability.
//!
//! An animation backend (Swiper on the web) can drive slide order,
//! transitions, swipe gestures and autoplay natively. The engine never
//! looks for one in global state: the host hands it a [`BackendSource`],
//! which the availability probe asks repeatedly until it yields an
//! [`AnimationBackend`] or the attempt budget runs out.
//!
//! Each carousel that runs under the backend strategy owns one
//! [`BackendInstance`]. The backend itself is shared, read-only, by every
//! carousel on the page.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use prodslide_core::dom::{Dom, NodeId};
use prodslide_core::settings::{DEFAULT_NEXT_SLIDE_TEXT, DEFAULT_PREV_SLIDE_TEXT, Effect, SlideLabels};

use crate::config::EngineConfig;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Autoplay options passed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoplayOptions {
    /// Time each slide stays on screen.
    pub delay: Duration,
    pub disable_on_interaction: bool,
    pub pause_on_mouse_enter: bool,
}

/// Pagination options passed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationOptions {
    /// Pagination element.
    pub el: NodeId,
    pub clickable: bool,
    pub dynamic_bullets: bool,
}

/// Image lazy-loading options passed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LazyOptions {
    pub load_prev_next: bool,
    /// Neighbouring slides preloaded on each side.
    pub load_prev_next_amount: u32,
}

/// Accessibility options passed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A11yOptions {
    pub enabled: bool,
    pub prev_slide_message: String,
    pub next_slide_message: String,
}

/// Construction options for one backend instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    pub effect: Effect,
    /// Transition duration.
    pub speed: Duration,
    pub slides_per_view: u32,
    pub space_between: u32,
    pub looping: bool,
    pub autoplay: AutoplayOptions,
    pub pagination: Option<PaginationOptions>,
    pub lazy: LazyOptions,
    pub a11y: A11yOptions,
}

impl BackendOptions {
    /// Options for a carousel with the given pagination element.
    #[must_use]
    pub fn new(config: &EngineConfig, pagination: Option<NodeId>) -> Self {
        Self {
            effect: config.settings.effect,
            speed: config.transition,
            slides_per_view: 1,
            space_between: 0,
            looping: true,
            autoplay: AutoplayOptions {
                delay: config.settings.speed,
                disable_on_interaction: false,
                pause_on_mouse_enter: true,
            },
            pagination: pagination.map(|el| PaginationOptions {
                el,
                clickable: true,
                dynamic_bullets: true,
            }),
            lazy: LazyOptions {
                load_prev_next: true,
                load_prev_next_amount: 2,
            },
            a11y: A11yOptions {
                enabled: true,
                prev_slide_message: DEFAULT_PREV_SLIDE_TEXT.to_owned(),
                next_slide_message: DEFAULT_NEXT_SLIDE_TEXT.to_owned(),
            },
        }
    }

    /// Announce navigation with `labels`.
    #[must_use]
    pub fn with_labels(mut self, labels: &SlideLabels) -> Self {
        self.a11y.prev_slide_message.clone_from(&labels.prev);
        self.a11y.next_slide_message.clone_from(&labels.next);
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Backend failures. All of them are recovered per container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend threw while constructing an instance.
    Construction(String),
    /// A required element was not found.
    MissingElement(&'static str),
    /// The instance was already destroyed.
    Destroyed,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction(msg) => write!(f, "backend construction failed: {msg}"),
            Self::MissingElement(what) => write!(f, "backend requires missing element: {what}"),
            Self::Destroyed => f.write_str("backend instance already destroyed"),
        }
    }
}

impl std::error::Error for BackendError {}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Lifecycle notification from a backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendNotice {
    /// The instance's real (loop-independent) index changed.
    SlideChanged(usize),
}

/// A loaded animation backend.
pub trait AnimationBackend {
    /// Name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Construct an instance on the slider frame element.
    ///
    /// # Errors
    ///
    /// Any error makes the engine run this one container self-managed.
    fn create(
        &self,
        dom: &mut dyn Dom,
        frame: NodeId,
        options: &BackendOptions,
    ) -> Result<Box<dyn BackendInstance>, BackendError>;
}

/// One backend-driven carousel.
pub trait BackendInstance {
    /// Current real index.
    fn active_index(&self) -> usize;

    fn slide_next(&mut self, dom: &mut dyn Dom);

    fn slide_prev(&mut self, dom: &mut dyn Dom);

    /// Jump to `index`; a zero `speed` snaps without animating.
    fn slide_to(&mut self, dom: &mut dyn Dom, index: usize, speed: Duration);

    fn autoplay_start(&mut self);

    fn autoplay_stop(&mut self);

    fn autoplay_running(&self) -> bool;

    /// Recompute layout after a size change.
    fn update(&mut self, dom: &mut dyn Dom);

    /// Let the instance catch up to `now` and collect its notifications.
    fn poll(&mut self, dom: &mut dyn Dom, now: Duration) -> Vec<BackendNotice>;

    /// Next time the instance wants to be polled. Hosts whose backend runs
    /// on its own clock return `None` and poll on every frame instead.
    fn next_deadline(&self) -> Option<Duration> {
        None
    }

    /// Release the instance. It must not touch the document afterwards.
    fn destroy(self: Box<Self>, dom: &mut dyn Dom);
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Something the availability probe can ask for the backend.
pub trait BackendSource {
    /// The backend, if it has loaded.
    fn resolve(&self) -> Option<Rc<dyn AnimationBackend>>;
}

impl<F> BackendSource for F
where
    F: Fn() -> Option<Rc<dyn AnimationBackend>>,
{
    fn resolve(&self) -> Option<Rc<dyn AnimationBackend>> {
        self()
    }
}

/// A page with no animation backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl BackendSource for Unavailable {
    fn resolve(&self) -> Option<Rc<dyn AnimationBackend>> {
        None
    }
}

/// A backend that is already loaded.
#[derive(Clone)]
pub struct Available(pub Rc<dyn AnimationBackend>);

impl fmt::Debug for Available {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Available").field(&self.0.name()).finish()
    }
}

impl BackendSource for Available {
    fn resolve(&self) -> Option<Rc<dyn AnimationBackend>> {
        Some(Rc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodslide_core::settings::Settings;

    #[test]
    fn options_follow_settings() {
        let config = EngineConfig::from_settings(
            Settings::default()
                .with_speed_ms(3_000)
                .with_effect(Effect::Fade),
        );
        let opts = BackendOptions::new(&config, Some(NodeId::new(9)));
        assert_eq!(opts.effect, Effect::Fade);
        assert_eq!(opts.autoplay.delay, Duration::from_millis(3_000));
        assert_eq!(opts.speed, config.transition);
        assert!(opts.looping);
        assert!(opts.autoplay.pause_on_mouse_enter);
        assert!(!opts.autoplay.disable_on_interaction);
        assert_eq!(opts.pagination.map(|p| p.el), Some(NodeId::new(9)));
    }

    #[test]
    fn preloads_neighbours_and_labels_navigation() {
        let opts = BackendOptions::new(&EngineConfig::default(), None);
        assert!(opts.lazy.load_prev_next);
        assert_eq!(opts.lazy.load_prev_next_amount, 2);
        assert!(opts.a11y.enabled);
        assert_eq!(opts.a11y.prev_slide_message, "Previous slide");
        assert_eq!(opts.a11y.next_slide_message, "Next slide");

        let labels = SlideLabels {
            prev: "Zurück".to_owned(),
            next: "Weiter".to_owned(),
        };
        let opts = opts.with_labels(&labels);
        assert_eq!(opts.a11y.prev_slide_message, "Zurück");
        assert_eq!(opts.a11y.next_slide_message, "Weiter");
    }

    #[test]
    fn no_pagination_element() {
        let opts = BackendOptions::new(&EngineConfig::default(), None);
        assert!(opts.pagination.is_none());
    }

    #[test]
    fn unavailable_never_resolves() {
        assert!(Unavailable.resolve().is_none());
        let f = || -> Option<Rc<dyn AnimationBackend>> { None };
        assert!(f.resolve().is_none());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            BackendError::MissingElement(".swiper").to_string(),
            "backend requires missing element: .swiper"
        );
    }
}

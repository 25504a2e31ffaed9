#![forbid(unsafe_code)]

//! Product Slider Runtime
//!
//! The slide engine: it turns discovered slider containers into running
//! carousels and keeps them consistent under autoplay, hover, touch,
//! clicks, resizes and content changes.
//!
//! # Key Components
//!
//! - [`Page`] - One page load: lifecycle, event routing, time, outputs
//! - [`Carousel`] - Per-container state machine with two strategies
//! - [`Scheduler`] - Deterministic timers with owned, cancel-on-drop handles
//! - [`BackendProbe`] - Bounded, cancellable animation-backend detection
//! - [`guard`] - Periodic dimension-corruption repair
//! - [`PageSimulator`] - Deterministic host for tests
//!
//! # Role in the workspace
//! `prodslide-runtime` consumes vocabulary from `prodslide-core` (settings,
//! events, the `Dom` capability, discovery) and is driven by a host: the
//! browser bridge in `prodslide-web`, or the simulator in tests. It never
//! reads a clock or a global; time and capabilities are handed in.

pub mod backend;
pub mod carousel;
pub mod config;
pub mod debounce;
pub mod guard;
pub mod page;
pub mod probe;
pub mod scheduler;
pub mod sim_backend;
pub mod simulator;

pub use backend::{
    AnimationBackend, Available, BackendError, BackendInstance, BackendNotice, BackendOptions,
    BackendSource, Unavailable,
};
pub use carousel::{Carousel, CarouselId, CarouselState, Mode, SlideChanged, StrategyKind};
pub use config::EngineConfig;
pub use guard::GuardReport;
pub use page::{Diagnostics, Lifecycle, Notice, Page, PageOutput};
pub use probe::BackendProbe;
pub use scheduler::{Scheduler, TimerHandle, TimerTag};
pub use simulator::PageSimulator;

#![forbid(unsafe_code)]

//! Core: settings, page events, style values, document access and
//! container discovery for the product-image slider.

pub mod discovery;
pub mod dom;
pub mod event;
pub mod logging;
pub mod session;
pub mod settings;
pub mod style;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, info, trace, warn};

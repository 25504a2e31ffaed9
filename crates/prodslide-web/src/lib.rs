#![forbid(unsafe_code)]

//! Browser bridge for the product-image slider.
//!
//! This crate is host-specific. It provides:
//! - a JSON protocol for host events, outputs and diagnostics
//!   ([`protocol`]),
//! - a host-agnostic [`Bridge`] that drives a page through that protocol,
//! - on `wasm32`, a `wasm-bindgen` surface ([`ProductSliderWeb`]) that binds
//!   the document capability to the live DOM, the animation backend to a
//!   page-global `Swiper` constructor, and session bookkeeping to
//!   `sessionStorage`.
//!
//! Native builds compile everything except the `wasm-bindgen` surface, so
//! the protocol and bridge are testable with the in-memory document.

pub mod bridge;
pub mod logging;
pub mod protocol;
pub mod swiper;

#[cfg(target_arch = "wasm32")]
mod wasm;

pub use bridge::{Bridge, BridgeError};
pub use logging::init_logging;
pub use protocol::{DiagnosticsReport, HostEvent, HostOutput};

#[cfg(target_arch = "wasm32")]
pub use wasm::{ProductSliderWeb, SessionStorage, SwiperSource, WebDom};

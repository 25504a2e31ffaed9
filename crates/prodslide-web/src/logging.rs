#![forbid(unsafe_code)]

//! Subscriber setup for native hosts (replay tools, tests).
//!
//! The browser build installs nothing: events go to whatever subscriber the
//! embedding page provides, or nowhere.

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,prodslide_runtime=info";

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already installed.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(target_arch = "wasm32")]
pub fn init_logging() -> bool {
    false
}

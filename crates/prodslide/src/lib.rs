#![forbid(unsafe_code)]

//! Product-image slider public facade crate.
//!
//! Re-exports the types a host needs to run the engine, a top-level
//! [`Error`], and a prelude.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use prodslide_core::discovery::{Discovery, DiscoveryError, discover};
pub use prodslide_core::dom::{Dom, Listeners, MemoryDom, NodeId, Selector};
pub use prodslide_core::event::{PageEvent, PointerKind, TouchPhase};
pub use prodslide_core::session::{
    DisabledSessionStore, MemorySessionStore, SessionError, SessionStore,
};
pub use prodslide_core::settings::{
    Effect, HoverExit, Layout, RawSettings, Settings, SettingsError,
};

// --- Runtime re-exports ----------------------------------------------------

pub use prodslide_runtime::{
    AnimationBackend, Available, BackendError, BackendInstance, BackendSource, Carousel,
    CarouselId, Diagnostics, EngineConfig, Lifecycle, Notice, Page, PageOutput, PageSimulator,
    SlideChanged, Unavailable,
};

// --- Web re-exports --------------------------------------------------------

#[cfg(feature = "web")]
pub use prodslide_web::{Bridge, BridgeError, DiagnosticsReport, HostEvent, HostOutput};

// --- Errors ---------------------------------------------------------------

/// Top-level error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A container could not be used.
    Discovery(DiscoveryError),
    /// The animation backend failed.
    Backend(BackendError),
    /// The settings bundle was unreadable.
    Settings(SettingsError),
    /// Session storage refused an operation.
    Session(SessionError),
    /// The host protocol rejected input.
    #[cfg(feature = "web")]
    Bridge(BridgeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery(err) => write!(f, "{err}"),
            Self::Backend(err) => write!(f, "{err}"),
            Self::Settings(err) => write!(f, "{err}"),
            Self::Session(err) => write!(f, "{err}"),
            #[cfg(feature = "web")]
            Self::Bridge(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Discovery(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::Settings(err) => Some(err),
            Self::Session(err) => Some(err),
            #[cfg(feature = "web")]
            Self::Bridge(err) => Some(err),
        }
    }
}

impl From<DiscoveryError> for Error {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err)
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

impl From<SettingsError> for Error {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

#[cfg(feature = "web")]
impl From<BridgeError> for Error {
    fn from(err: BridgeError) -> Self {
        Self::Bridge(err)
    }
}

/// Standard result type for slider APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine configuration from the settings JSON a page localizes.
///
/// # Errors
///
/// Returns [`Error::Settings`] when `json` is not a settings object.
pub fn config_from_json(json: &str) -> Result<EngineConfig> {
    let raw = RawSettings::from_json(json)?;
    Ok(EngineConfig::from_settings(raw.sanitize()))
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        BackendSource, Dom, EngineConfig, Error, HoverExit, MemoryDom, Page, PageEvent,
        PageOutput, Result, Settings, Unavailable,
    };

    pub use crate::{core, runtime};

    #[cfg(feature = "web")]
    pub use crate::web;
}

pub use prodslide_core as core;
pub use prodslide_runtime as runtime;
#[cfg(feature = "web")]
pub use prodslide_web as web;

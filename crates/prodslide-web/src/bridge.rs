#![forbid(unsafe_code)]

//! Host-agnostic bridge between a page script and the engine.
//!
//! [`Bridge`] owns a [`Page`] and speaks the [`protocol`](crate::protocol)
//! shapes. The browser surface wraps a `Bridge<WebDom>`; tests and replay
//! tools drive a `Bridge<MemoryDom>` with the same JSON.

use std::fmt;
use std::time::Duration;

use prodslide_core::dom::Dom;
use prodslide_core::session::SessionStore;
use prodslide_core::settings::{RawSettings, SettingsError};
use prodslide_runtime::backend::BackendSource;
use prodslide_runtime::config::EngineConfig;
use prodslide_runtime::page::Page;

use crate::protocol::{DiagnosticsReport, HostEvent, HostOutput};

/// Errors at the host boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The settings bundle was not a JSON object.
    Settings(SettingsError),
    /// A host event could not be decoded.
    Event(String),
    /// An output could not be encoded.
    Encode(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings(err) => write!(f, "invalid settings: {err}"),
            Self::Event(msg) => write!(f, "invalid host event: {msg}"),
            Self::Encode(msg) => write!(f, "could not encode output: {msg}"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Settings(err) => Some(err),
            Self::Event(_) | Self::Encode(_) => None,
        }
    }
}

impl From<SettingsError> for BridgeError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

/// A page driven through the host protocol.
#[derive(Debug)]
pub struct Bridge<D: Dom> {
    page: Page<D>,
}

impl<D: Dom> Bridge<D> {
    /// Build from a raw settings bundle. Field-level problems are sanitized
    /// to defaults.
    pub fn new(dom: D, settings: &RawSettings, source: impl BackendSource + 'static) -> Self {
        let config = EngineConfig::from_settings(settings.sanitize());
        let bridge = Self::with_config(dom, config, source);
        Self {
            page: bridge.page.with_labels(settings.labels()),
        }
    }

    /// Build from the settings JSON the page localizes.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Settings`] when `json` is not an object of the
    /// expected shape.
    pub fn from_json(
        dom: D,
        json: &str,
        source: impl BackendSource + 'static,
    ) -> Result<Self, BridgeError> {
        let raw = RawSettings::from_json(json)?;
        Ok(Self::new(dom, &raw, source))
    }

    /// Build with fully specified engine tunables.
    pub fn with_config(dom: D, config: EngineConfig, source: impl BackendSource + 'static) -> Self {
        tracing::debug!(?config, "bridge created");
        Self {
            page: Page::new(dom, config, source),
        }
    }

    #[must_use]
    pub fn with_session(self, session: impl SessionStore + 'static) -> Self {
        Self {
            page: self.page.with_session(session),
        }
    }

    #[must_use]
    pub fn page(&self) -> &Page<D> {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page<D> {
        &mut self.page
    }

    pub fn start(&mut self) {
        self.page.start();
    }

    pub fn shutdown(&mut self) {
        self.page.shutdown();
    }

    /// Apply one host step.
    pub fn apply(&mut self, event: HostEvent) {
        match event {
            HostEvent::Advance { ms } => self.page.advance(Duration::from_millis(ms)),
            other => {
                if let Some(event) = other.to_page_event() {
                    self.page.push_event(event);
                }
            }
        }
    }

    /// Apply one JSON-encoded host step.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Event`] when `json` is not a known event.
    pub fn apply_json(&mut self, json: &str) -> Result<(), BridgeError> {
        let event: HostEvent =
            serde_json::from_str(json).map_err(|e| BridgeError::Event(e.to_string()))?;
        self.apply(event);
        Ok(())
    }

    /// Apply a JSON array of host steps in order. Nothing is applied when
    /// the array does not decode.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Event`] when `json` is not an array of known
    /// events.
    pub fn replay_json(&mut self, json: &str) -> Result<usize, BridgeError> {
        let events: Vec<HostEvent> =
            serde_json::from_str(json).map_err(|e| BridgeError::Event(e.to_string()))?;
        let count = events.len();
        for event in events {
            self.apply(event);
        }
        Ok(count)
    }

    /// Drain outputs produced since the last call.
    pub fn take_outputs(&mut self) -> Vec<HostOutput> {
        self.page
            .take_outputs()
            .iter()
            .map(HostOutput::from)
            .collect()
    }

    /// Drain outputs as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Encode`] if serialization fails.
    pub fn take_outputs_json(&mut self) -> Result<String, BridgeError> {
        serde_json::to_string(&self.take_outputs()).map_err(|e| BridgeError::Encode(e.to_string()))
    }

    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsReport {
        DiagnosticsReport::from(&self.page.diagnostics())
    }

    /// Diagnostics as pretty JSON, for support output.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Encode`] if serialization fails.
    pub fn diagnostics_json(&self) -> Result<String, BridgeError> {
        serde_json::to_string_pretty(&self.diagnostics())
            .map_err(|e| BridgeError::Encode(e.to_string()))
    }
}

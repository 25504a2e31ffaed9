#![forbid(unsafe_code)]

//! Bounded backend availability probe.
//!
//! The backend script may finish loading after the engine starts. The probe
//! asks the [`BackendSource`] once immediately and then on a fixed interval
//! until it answers or `max_attempts` have been made. The outcome is final
//! for the page: a backend that appears after exhaustion is never adopted.
//!
//! # State machine
//!
//! ```text
//! Idle --start--> Polling --found--> Found
//!                    |---budget spent--> Exhausted
//!                    '---cancel--------> Cancelled
//! ```
//!
//! The probe owns its interval timer; leaving `Polling` drops it.

use std::fmt;
use std::rc::Rc;

use crate::backend::{AnimationBackend, BackendSource};
use crate::config::ProbeConfig;
use crate::scheduler::{Scheduler, TimerHandle, TimerId, TimerTag};

/// Where the probe stands.
#[derive(Clone)]
pub enum ProbeState {
    /// Not started.
    Idle,
    /// Waiting for the next attempt.
    Polling,
    /// Backend found on the given attempt (1-based).
    Found {
        backend: Rc<dyn AnimationBackend>,
        attempt: u32,
    },
    /// Budget spent without finding a backend.
    Exhausted,
    /// Cancelled before resolving.
    Cancelled,
}

impl fmt::Debug for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Polling => f.write_str("Polling"),
            Self::Found { backend, attempt } => f
                .debug_struct("Found")
                .field("backend", &backend.name())
                .field("attempt", attempt)
                .finish(),
            Self::Exhausted => f.write_str("Exhausted"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

impl ProbeState {
    /// Whether the probe reached a final answer (found or exhausted).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Found { .. } | Self::Exhausted)
    }
}

/// Probe outcome handed to the page once.
#[derive(Clone)]
pub enum Resolution {
    Backend(Rc<dyn AnimationBackend>),
    SelfManaged,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(b) => f.debug_tuple("Backend").field(&b.name()).finish(),
            Self::SelfManaged => f.write_str("SelfManaged"),
        }
    }
}

/// The probe.
pub struct BackendProbe {
    source: Box<dyn BackendSource>,
    config: ProbeConfig,
    attempts: u32,
    state: ProbeState,
    timer: Option<TimerHandle>,
}

impl fmt::Debug for BackendProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendProbe")
            .field("config", &self.config)
            .field("attempts", &self.attempts)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl BackendProbe {
    #[must_use]
    pub fn new(source: Box<dyn BackendSource>, config: ProbeConfig) -> Self {
        Self {
            source,
            config,
            attempts: 0,
            state: ProbeState::Idle,
            timer: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ProbeState {
        &self.state
    }

    /// Attempts made so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether `id` is the probe's live timer.
    #[must_use]
    pub fn owns(&self, id: TimerId) -> bool {
        self.timer.as_ref().is_some_and(|t| t.id() == id)
    }

    /// Make the first attempt and, if it misses, arm the retry interval.
    /// Returns the resolution when the probe settles immediately.
    pub fn start(&mut self, scheduler: &Scheduler) -> Option<Resolution> {
        if !matches!(self.state, ProbeState::Idle) {
            return None;
        }
        self.state = ProbeState::Polling;
        if let Some(resolution) = self.attempt() {
            return Some(resolution);
        }
        self.timer = Some(scheduler.interval(self.config.interval, TimerTag::Probe));
        None
    }

    /// Retry on a timer tick.
    pub fn on_tick(&mut self) -> Option<Resolution> {
        if !matches!(self.state, ProbeState::Polling) {
            return None;
        }
        self.attempt()
    }

    /// Stop polling. Has no effect once resolved.
    pub fn cancel(&mut self) {
        if matches!(self.state, ProbeState::Idle | ProbeState::Polling) {
            self.timer = None;
            self.state = ProbeState::Cancelled;
            tracing::debug!(attempts = self.attempts, "backend probe cancelled");
        }
    }

    fn attempt(&mut self) -> Option<Resolution> {
        self.attempts += 1;
        if let Some(backend) = self.source.resolve() {
            tracing::info!(
                backend = backend.name(),
                attempt = self.attempts,
                "animation backend detected"
            );
            self.timer = None;
            self.state = ProbeState::Found {
                backend: Rc::clone(&backend),
                attempt: self.attempts,
            };
            return Some(Resolution::Backend(backend));
        }
        tracing::debug!(attempt = self.attempts, "animation backend not loaded yet");
        if self.attempts >= self.config.max_attempts.max(1) {
            tracing::info!(
                attempts = self.attempts,
                "animation backend unavailable, using self-managed transitions"
            );
            self.timer = None;
            self.state = ProbeState::Exhausted;
            return Some(Resolution::SelfManaged);
        }
        None
    }
}

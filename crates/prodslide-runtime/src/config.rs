#![forbid(unsafe_code)]

//! Engine tunables.
//!
//! [`Settings`] is what the page configures; [`EngineConfig`] adds the
//! timing constants the engine itself owns. Defaults match the storefront
//! plugin's observed behavior.

use std::time::Duration;

use prodslide_core::settings::{HoverExit, Settings};

/// Delay after pointer-leave before autoplay resumes (or resets).
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
/// Cross-fade duration (also the backend transition speed).
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(400);
/// Minimum horizontal touch displacement recognized as a swipe.
pub const DEFAULT_SWIPE_THRESHOLD_PX: f32 = 50.0;
/// Quiet window closing a resize burst.
pub const DEFAULT_RESIZE_QUIET: Duration = Duration::from_millis(250);
/// Delay between a content-change notification and the rebuild.
pub const DEFAULT_REBUILD_DELAY: Duration = Duration::from_millis(100);

/// Backend availability probe budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Delay between attempts.
    pub interval: Duration,
    /// Total attempts, the immediate first one included. Zero behaves as one.
    pub max_attempts: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_attempts: 50,
        }
    }
}

impl ProbeConfig {
    /// Time from the first attempt until the budget runs out.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.max(1).saturating_sub(1))
    }
}

/// Dimension-corruption guard settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardConfig {
    /// Audit period.
    pub interval: Duration,
    /// Pixel magnitude above which a width or translation is corrupted.
    pub max_sane_px: f64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1_000),
            max_sane_px: 10_000.0,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub settings: Settings,
    pub settle_delay: Duration,
    pub transition: Duration,
    pub swipe_threshold: f32,
    pub resize_quiet: Duration,
    pub rebuild_delay: Duration,
    pub probe: ProbeConfig,
    pub guard: GuardConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

impl EngineConfig {
    /// Defaults for everything the settings bundle does not cover.
    #[must_use]
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            settings,
            settle_delay: DEFAULT_SETTLE_DELAY,
            transition: DEFAULT_TRANSITION,
            swipe_threshold: DEFAULT_SWIPE_THRESHOLD_PX,
            resize_quiet: DEFAULT_RESIZE_QUIET,
            rebuild_delay: DEFAULT_REBUILD_DELAY,
            probe: ProbeConfig::default(),
            guard: GuardConfig::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_hover_exit(mut self, hover_exit: HoverExit) -> Self {
        self.settings.hover_exit = hover_exit;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = transition;
        self
    }

    /// Negative or non-finite thresholds are ignored.
    #[must_use]
    pub fn with_swipe_threshold(mut self, px: f32) -> Self {
        if px.is_finite() && px >= 0.0 {
            self.swipe_threshold = px;
        }
        self
    }

    #[must_use]
    pub fn with_resize_quiet(mut self, quiet: Duration) -> Self {
        self.resize_quiet = quiet;
        self
    }

    #[must_use]
    pub fn with_rebuild_delay(mut self, delay: Duration) -> Self {
        self.rebuild_delay = delay;
        self
    }

    #[must_use]
    pub fn with_probe(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.probe = ProbeConfig {
            interval,
            max_attempts,
        };
        self
    }

    #[must_use]
    pub fn with_guard_interval(mut self, interval: Duration) -> Self {
        self.guard.interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_sane_px(mut self, px: f64) -> Self {
        self.guard.max_sane_px = px;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.settle_delay, Duration::from_millis(500));
        assert_eq!(c.probe.max_attempts, 50);
        assert_eq!(c.probe.budget(), Duration::from_millis(4_900));
        assert_eq!(c.settings.hover_exit, HoverExit::Resume);
    }

    #[test]
    fn bad_swipe_threshold_is_ignored() {
        let c = EngineConfig::default().with_swipe_threshold(f32::NAN);
        assert_eq!(c.swipe_threshold, DEFAULT_SWIPE_THRESHOLD_PX);
        let c = c.with_swipe_threshold(-3.0);
        assert_eq!(c.swipe_threshold, DEFAULT_SWIPE_THRESHOLD_PX);
    }

    #[test]
    fn zero_attempt_budget() {
        let c = EngineConfig::default().with_probe(Duration::from_millis(100), 0);
        assert_eq!(c.probe.budget(), Duration::ZERO);
    }
}

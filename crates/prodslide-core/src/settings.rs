#![forbid(unsafe_code)]

//! Settings bundle handed to the slider by the page.
//!
//! The storefront localizes a small settings object next to the slider
//! script. It arrives as loosely typed JSON: numbers may be strings, fields
//! may be missing, and stale option rows can carry values that are no
//! longer offered. [`RawSettings`] accepts all of that and
//! [`RawSettings::sanitize`] folds it into a [`Settings`] value where every
//! field is in range.
//!
//! # Sanitization rules
//!
//! | Field | Accepted | Fallback |
//! |-------|----------|----------|
//! | `enabled` | boolean, `"1"`/`"0"` | `true` |
//! | `speed` | integer ms in `[500, 10000]` | `2500` |
//! | `effect` | `slide`, `fade`, `cube`, `coverflow`, `flip` | `slide` |
//! | `layout` | `default`, `carousel`, `masonry`, `grid` | `default` |
//!
//! Field problems never produce errors. Only malformed JSON does.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lowest autoplay delay accepted from the settings bundle.
pub const MIN_SPEED_MS: u64 = 500;
/// Highest autoplay delay accepted from the settings bundle.
pub const MAX_SPEED_MS: u64 = 10_000;
/// Autoplay delay used when the configured one is absent or out of range.
pub const DEFAULT_SPEED_MS: u64 = 2_500;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Transition effect requested for the animation backend.
///
/// The self-managed strategy always cross-fades; the effect only reaches a
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Slide,
    Fade,
    Cube,
    Coverflow,
    Flip,
}

impl Effect {
    /// Parse a settings value, falling back to [`Effect::Slide`].
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "fade" => Self::Fade,
            "cube" => Self::Cube,
            "coverflow" => Self::Coverflow,
            "flip" => Self::Flip,
            _ => Self::Slide,
        }
    }

    /// Name understood by the animation backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Slide => "slide",
            Self::Fade => "fade",
            Self::Cube => "cube",
            Self::Coverflow => "coverflow",
            Self::Flip => "flip",
        }
    }
}

/// Listing layout. Everything except [`Layout::Default`] is a premium-tier
/// marker: it is accepted, reported once per session, and rendered as the
/// default layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Default,
    Carousel,
    Masonry,
    Grid,
}

impl Layout {
    /// Parse a settings value, falling back to [`Layout::Default`].
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "carousel" => Self::Carousel,
            "masonry" => Self::Masonry,
            "grid" => Self::Grid,
            _ => Self::Default,
        }
    }

    /// Whether this layout belongs to the premium tier.
    #[must_use]
    pub const fn is_premium(self) -> bool {
        !matches!(self, Self::Default)
    }
}

/// What happens once the pointer has left a carousel and the settle delay
/// has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoverExit {
    /// Autoplay resumes from the slide that was showing.
    #[default]
    Resume,
    /// The carousel returns to the first slide, then autoplay resumes.
    ResetToFirst,
}

// ---------------------------------------------------------------------------
// Raw bundle
// ---------------------------------------------------------------------------

/// A number that may have been serialized as a string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    fn as_ms(&self) -> Option<u64> {
        match self {
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::Float(v) if v.is_finite() && *v >= 0.0 => Some(v.trunc() as u64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse::<u64>().ok(),
        }
    }
}

/// A flag that may have been serialized as `"1"`/`"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LooseFlag {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl LooseFlag {
    fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(v) => *v != 0,
            Self::Text(s) => matches!(s.trim(), "1" | "true" | "yes" | "on"),
        }
    }
}

/// The settings bundle exactly as the page provides it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawSettings {
    pub enabled: Option<LooseFlag>,
    pub speed: Option<LooseNumber>,
    pub effect: Option<String>,
    pub layout: Option<String>,
    #[serde(rename = "hoverExit", alias = "hover_exit")]
    pub hover_exit: Option<HoverExit>,
    #[serde(rename = "prevSlideText", alias = "prev_slide_text")]
    pub prev_slide_text: Option<String>,
    #[serde(rename = "nextSlideText", alias = "next_slide_text")]
    pub next_slide_text: Option<String>,
}

impl RawSettings {
    /// Parse a JSON settings object.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Json`] when the input is not a JSON object of
    /// the expected shape. Out-of-range values are not errors.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(json).map_err(|e| SettingsError::Json(e.to_string()))
    }

    /// Fold the raw bundle into sanitized [`Settings`].
    #[must_use]
    pub fn sanitize(&self) -> Settings {
        Settings {
            enabled: self.enabled.as_ref().is_none_or(LooseFlag::as_bool),
            speed: Duration::from_millis(sanitize_speed(
                self.speed.as_ref().and_then(LooseNumber::as_ms),
            )),
            effect: self
                .effect
                .as_deref()
                .map(Effect::parse_or_default)
                .unwrap_or_default(),
            layout: self
                .layout
                .as_deref()
                .map(Layout::parse_or_default)
                .unwrap_or_default(),
            hover_exit: self.hover_exit.unwrap_or_default(),
        }
    }

    /// Navigation labels; blank texts fall back to the defaults.
    #[must_use]
    pub fn labels(&self) -> SlideLabels {
        let pick = |text: &Option<String>, default: &str| {
            text.as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(default)
                .to_owned()
        };
        SlideLabels {
            prev: pick(&self.prev_slide_text, DEFAULT_PREV_SLIDE_TEXT),
            next: pick(&self.next_slide_text, DEFAULT_NEXT_SLIDE_TEXT),
        }
    }
}

/// Label announced for the previous-slide control.
pub const DEFAULT_PREV_SLIDE_TEXT: &str = "Previous slide";
/// Label announced for the next-slide control.
pub const DEFAULT_NEXT_SLIDE_TEXT: &str = "Next slide";

/// Accessible labels for backend navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideLabels {
    pub prev: String,
    pub next: String,
}

impl Default for SlideLabels {
    fn default() -> Self {
        Self {
            prev: DEFAULT_PREV_SLIDE_TEXT.to_owned(),
            next: DEFAULT_NEXT_SLIDE_TEXT.to_owned(),
        }
    }
}

/// Clamp-by-replacement: anything outside the accepted range becomes the
/// default rather than the nearest bound.
#[must_use]
pub fn sanitize_speed(ms: Option<u64>) -> u64 {
    match ms {
        Some(ms) if (MIN_SPEED_MS..=MAX_SPEED_MS).contains(&ms) => ms,
        _ => DEFAULT_SPEED_MS,
    }
}

// ---------------------------------------------------------------------------
// Sanitized settings
// ---------------------------------------------------------------------------

/// Sanitized settings. Every field holds an accepted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// When false the engine does not run at all.
    pub enabled: bool,
    /// Autoplay period.
    pub speed: Duration,
    /// Backend transition effect.
    pub effect: Effect,
    /// Requested listing layout (premium values render as default).
    pub layout: Layout,
    /// Behavior after the pointer leaves a carousel.
    pub hover_exit: HoverExit,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: Duration::from_millis(DEFAULT_SPEED_MS),
            effect: Effect::Slide,
            layout: Layout::Default,
            hover_exit: HoverExit::Resume,
        }
    }
}

impl Settings {
    /// Set the autoplay period, applying the same range rule as the bundle.
    #[must_use]
    pub fn with_speed_ms(mut self, ms: u64) -> Self {
        self.speed = Duration::from_millis(sanitize_speed(Some(ms)));
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_hover_exit(mut self, hover_exit: HoverExit) -> Self {
        self.hover_exit = hover_exit;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Settings bundle could not be read at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The JSON text did not parse.
    Json(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "invalid settings json: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#![forbid(unsafe_code)]

//! Inline style values the engine reads and writes.
//!
//! The engine only ever touches a handful of inline properties: slide
//! opacity and stacking order, slide width, and the wrapper transform. This
//! module gives those properties typed values and parsers, plus the
//! "is this numerically extreme" predicates used by the dimension guard.
//!
//! # Extreme values
//!
//! An animation backend can occasionally compute widths or translations in
//! the millions of pixels (often serialized in exponent form, `3.84e+06px`).
//! A value is considered extreme when any of the following hold:
//!
//! - its text contains an exponent marker (`e+`, `E+`),
//! - it does not parse to a finite number,
//! - its pixel magnitude exceeds the caller's sanity bound,
//! - its percentage magnitude exceeds [`MAX_SANE_PERCENT`].
//!
//! Empty values are never extreme: the host simply has not set them.

use std::fmt;

/// Percentages beyond this magnitude are treated as corrupted.
pub const MAX_SANE_PERCENT: f64 = 1_000.0;

/// Inline style property names.
pub mod prop {
    pub const OPACITY: &str = "opacity";
    pub const Z_INDEX: &str = "z-index";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const MIN_WIDTH: &str = "min-width";
    pub const MAX_WIDTH: &str = "max-width";
    pub const TRANSFORM: &str = "transform";
    pub const TRANSITION: &str = "transition";
    pub const POSITION: &str = "position";
    pub const OVERFLOW: &str = "overflow";
    pub const TOP: &str = "top";
    pub const LEFT: &str = "left";
    pub const DISPLAY: &str = "display";
}

// ---------------------------------------------------------------------------
// Length
// ---------------------------------------------------------------------------

/// A CSS length as the engine understands it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    /// Pixel length.
    Px(f64),
    /// Percentage of the containing block.
    Percent(f64),
    /// `auto` (or any keyword the engine does not interpret).
    Auto,
}

impl Length {
    /// The baseline every slide is reset to.
    pub const FULL: Self = Self::Percent(100.0);

    /// Parse an inline length. Unitless numbers are read as pixels.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        if s.eq_ignore_ascii_case("auto") {
            return Some(Self::Auto);
        }
        if let Some(num) = s.strip_suffix('%') {
            return num.trim().parse::<f64>().ok().map(Self::Percent);
        }
        let num = s.strip_suffix("px").unwrap_or(s);
        num.trim().parse::<f64>().ok().map(Self::Px)
    }

    /// Whether this length is outside sane bounds.
    #[must_use]
    pub fn is_extreme(self, max_px: f64) -> bool {
        match self {
            Self::Px(v) => !v.is_finite() || v.abs() > max_px,
            Self::Percent(v) => !v.is_finite() || v.abs() > MAX_SANE_PERCENT,
            Self::Auto => false,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Px(v) => write!(f, "{v}px"),
            Self::Percent(v) => write!(f, "{v}%"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Whether a raw inline length is corrupted.
#[must_use]
pub fn is_extreme_length(raw: &str, max_px: f64) -> bool {
    let s = raw.trim();
    if s.is_empty() {
        return false;
    }
    if has_exponent(s) {
        return true;
    }
    match Length::parse(s) {
        Some(len) => len.is_extreme(max_px),
        // Non-numeric garbage in a width the engine manages.
        None => true,
    }
}

fn has_exponent(s: &str) -> bool {
    s.contains("e+") || s.contains("E+")
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// A translation as written by `translate3d(x, y, z)` / `translateX(x)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Translate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Translate {
    /// Zero translation.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Parse an inline transform. Empty and `none` parse as [`Translate::ZERO`].
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Some(Self::ZERO);
        }
        let open = s.find('(')?;
        let close = s.rfind(')')?;
        if close <= open {
            return None;
        }
        let func = s[..open].trim().to_ascii_lowercase();
        let mut parts = s[open + 1..close].split(',').map(parse_px_component);
        match func.as_str() {
            "translate3d" => {
                let x = parts.next()??;
                let y = parts.next()??;
                let z = parts.next()??;
                Some(Self { x, y, z })
            }
            "translate" => {
                let x = parts.next()??;
                let y = parts.next().unwrap_or(Some(0.0))?;
                Some(Self { x, y, z: 0.0 })
            }
            "translatex" => Some(Self {
                x: parts.next()??,
                ..Self::ZERO
            }),
            "translatey" => Some(Self {
                y: parts.next()??,
                ..Self::ZERO
            }),
            _ => None,
        }
    }

    /// Whether any component is non-finite or beyond `max_px`.
    #[must_use]
    pub fn is_extreme(self, max_px: f64) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .any(|v| !v.is_finite() || v.abs() > max_px)
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl fmt::Display for Translate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "translate3d({}px, {}px, {}px)", self.x, self.y, self.z)
    }
}

fn parse_px_component(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let num = s.strip_suffix("px").unwrap_or(s);
    num.trim().parse::<f64>().ok()
}

/// Whether a raw inline transform is corrupted.
#[must_use]
pub fn is_extreme_transform(raw: &str, max_px: f64) -> bool {
    let s = raw.trim();
    if s.is_empty() {
        return false;
    }
    if has_exponent(s) {
        return true;
    }
    match Translate::parse(s) {
        Some(t) => t.is_extreme(max_px),
        // Transforms the engine does not model (rotate for cube/flip
        // effects) are left alone.
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Slide visual
// ---------------------------------------------------------------------------

/// Layering for the visible slide.
pub const ACTIVE_LAYER: i32 = 10;
/// Layering for every hidden slide.
pub const HIDDEN_LAYER: i32 = 1;

/// Opacity and stacking of one slide under the self-managed strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideVisual {
    pub opacity: f32,
    pub layer: i32,
}

impl SlideVisual {
    /// Fully opaque, topmost.
    pub const SHOWN: Self = Self {
        opacity: 1.0,
        layer: ACTIVE_LAYER,
    };

    /// Fully transparent, underneath.
    pub const HIDDEN: Self = Self {
        opacity: 0.0,
        layer: HIDDEN_LAYER,
    };

    /// Visual for slide `index` when `active` is showing.
    #[must_use]
    pub const fn for_slide(index: usize, active: usize) -> Self {
        if index == active {
            Self::SHOWN
        } else {
            Self::HIDDEN
        }
    }

    /// Read a visual back from inline `opacity` / `z-index` values.
    #[must_use]
    pub fn from_inline(opacity: Option<&str>, z_index: Option<&str>) -> Option<Self> {
        let opacity = opacity?.trim().parse::<f32>().ok()?;
        let layer = z_index?.trim().parse::<i32>().ok()?;
        Some(Self { opacity, layer })
    }

    /// Whether this is the shown visual.
    #[must_use]
    pub fn is_shown(&self) -> bool {
        self.opacity >= 1.0 && self.layer == ACTIVE_LAYER
    }

    /// Inline `opacity` value.
    #[must_use]
    pub fn opacity_value(&self) -> String {
        if self.opacity >= 1.0 {
            "1".to_owned()
        } else if self.opacity <= 0.0 {
            "0".to_owned()
        } else {
            format!("{}", self.opacity)
        }
    }

    /// Inline `z-index` value.
    #[must_use]
    pub fn layer_value(&self) -> String {
        self.layer.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_parsing() {
        assert_eq!(Length::parse("100%"), Some(Length::Percent(100.0)));
        assert_eq!(Length::parse("300px"), Some(Length::Px(300.0)));
        assert_eq!(Length::parse(" 12 "), Some(Length::Px(12.0)));
        assert_eq!(Length::parse("auto"), Some(Length::Auto));
        assert_eq!(Length::parse(""), None);
        assert_eq!(Length::parse("wide"), None);
    }

    #[test]
    fn exponent_widths_are_extreme() {
        assert!(is_extreme_length("3.84e+06px", 10_000.0));
        assert!(is_extreme_length("768000px", 10_000.0));
        assert!(!is_extreme_length("100%", 10_000.0));
        assert!(!is_extreme_length("320px", 10_000.0));
        assert!(!is_extreme_length("", 10_000.0));
        assert!(is_extreme_length("5000%", 10_000.0));
    }

    #[test]
    fn transform_parsing() {
        assert_eq!(
            Translate::parse("translate3d(-300px, 0px, 0px)"),
            Some(Translate {
                x: -300.0,
                y: 0.0,
                z: 0.0
            })
        );
        assert_eq!(Translate::parse(""), Some(Translate::ZERO));
        assert_eq!(Translate::parse("none"), Some(Translate::ZERO));
        assert_eq!(
            Translate::parse("translateX(25px)").map(|t| t.x),
            Some(25.0)
        );
        assert_eq!(Translate::parse("rotateY(30deg)"), None);
    }

    #[test]
    fn extreme_transforms() {
        assert!(is_extreme_transform(
            "translate3d(-3.84e+06px, 0px, 0px)",
            10_000.0
        ));
        assert!(is_extreme_transform(
            "translate3d(-900000px, 0px, 0px)",
            10_000.0
        ));
        assert!(!is_extreme_transform(
            "translate3d(-900px, 0px, 0px)",
            10_000.0
        ));
        assert!(!is_extreme_transform("rotateY(30deg)", 10_000.0));
    }

    #[test]
    fn zero_translate_roundtrips_through_display() {
        let text = Translate::ZERO.to_string();
        assert_eq!(text, "translate3d(0px, 0px, 0px)");
        assert!(Translate::parse(&text).unwrap().is_zero());
    }

    #[test]
    fn slide_visual_selection() {
        assert!(SlideVisual::for_slide(2, 2).is_shown());
        assert!(!SlideVisual::for_slide(1, 2).is_shown());
        assert_eq!(SlideVisual::SHOWN.opacity_value(), "1");
        assert_eq!(SlideVisual::HIDDEN.layer_value(), "1");
        assert_eq!(
            SlideVisual::from_inline(Some("1"), Some("10")),
            Some(SlideVisual::SHOWN)
        );
        assert_eq!(SlideVisual::from_inline(None, Some("10")), None);
    }
}

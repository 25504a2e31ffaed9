//! Property-based invariants for style values and settings sanitization.
//!
//! 1. Sanitized speed always lies in the accepted range.
//! 2. In-range speeds survive sanitization unchanged.
//! 3. Lengths printed by `Length` parse back to the same value.
//! 4. Translations inside the sanity bound are never extreme; scaled far
//!    beyond it they always are.
//! 5. Exactly one slide visual is shown for any active index.

use prodslide_core::settings::{MAX_SPEED_MS, MIN_SPEED_MS, sanitize_speed};
use prodslide_core::style::{
    Length, SlideVisual, Translate, is_extreme_length, is_extreme_transform,
};
use proptest::prelude::*;

const MAX_PX: f64 = 10_000.0;

proptest! {
    #[test]
    fn sanitized_speed_in_range(ms in proptest::option::of(any::<u64>())) {
        let s = sanitize_speed(ms);
        prop_assert!((MIN_SPEED_MS..=MAX_SPEED_MS).contains(&s));
    }

    #[test]
    fn in_range_speed_kept(ms in MIN_SPEED_MS..=MAX_SPEED_MS) {
        prop_assert_eq!(sanitize_speed(Some(ms)), ms);
    }

    #[test]
    fn px_length_display_parses_back(v in -5_000i32..5_000) {
        let len = Length::Px(f64::from(v));
        prop_assert_eq!(Length::parse(&len.to_string()), Some(len));
        prop_assert!(!is_extreme_length(&len.to_string(), MAX_PX));
    }

    #[test]
    fn sane_translations_pass(x in -9_999i32..9_999, y in -500i32..500) {
        let t = Translate { x: f64::from(x), y: f64::from(y), z: 0.0 };
        prop_assert!(!is_extreme_transform(&t.to_string(), MAX_PX));
    }

    #[test]
    fn huge_translations_fail(x in 20_000i64..100_000_000) {
        let t = Translate { x: -(x as f64), y: 0.0, z: 0.0 };
        prop_assert!(is_extreme_transform(&t.to_string(), MAX_PX));
    }

    #[test]
    fn exactly_one_shown(n in 1usize..12, active_seed in any::<usize>()) {
        let active = active_seed % n;
        let shown = (0..n)
            .filter(|i| SlideVisual::for_slide(*i, active).is_shown())
            .count();
        prop_assert_eq!(shown, 1);
    }
}

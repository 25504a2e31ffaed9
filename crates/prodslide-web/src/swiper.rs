#![forbid(unsafe_code)]

//! Swiper construction options.
//!
//! [`SwiperOptions`] is the JSON object handed to `new Swiper(el, opts)`.
//! Pagination is emitted without its element; the browser surface attaches
//! the live element after parsing, since elements do not survive JSON.

use serde::Serialize;

use prodslide_runtime::backend::BackendOptions;

/// Swiper's `autoplay` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwiperAutoplay {
    pub delay: u64,
    pub disable_on_interaction: bool,
    pub pause_on_mouse_enter: bool,
}

/// Swiper's `pagination` option, minus `el`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwiperPagination {
    pub clickable: bool,
    pub dynamic_bullets: bool,
}

/// Swiper's `lazy` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwiperLazy {
    pub load_prev_next: bool,
    pub load_prev_next_amount: u32,
}

/// Swiper's `a11y` option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwiperA11y {
    pub enabled: bool,
    pub prev_slide_message: String,
    pub next_slide_message: String,
}

/// Swiper constructor options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwiperOptions {
    pub effect: &'static str,
    pub speed: u64,
    pub slides_per_view: u32,
    pub space_between: u32,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub autoplay: SwiperAutoplay,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<SwiperPagination>,
    pub lazy: SwiperLazy,
    pub a11y: SwiperA11y,
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl From<&BackendOptions> for SwiperOptions {
    fn from(options: &BackendOptions) -> Self {
        Self {
            effect: options.effect.as_str(),
            speed: millis(options.speed),
            slides_per_view: options.slides_per_view,
            space_between: options.space_between,
            looping: options.looping,
            autoplay: SwiperAutoplay {
                delay: millis(options.autoplay.delay),
                disable_on_interaction: options.autoplay.disable_on_interaction,
                pause_on_mouse_enter: options.autoplay.pause_on_mouse_enter,
            },
            pagination: options.pagination.map(|p| SwiperPagination {
                clickable: p.clickable,
                dynamic_bullets: p.dynamic_bullets,
            }),
            lazy: SwiperLazy {
                load_prev_next: options.lazy.load_prev_next,
                load_prev_next_amount: options.lazy.load_prev_next_amount,
            },
            a11y: SwiperA11y {
                enabled: options.a11y.enabled,
                prev_slide_message: options.a11y.prev_slide_message.clone(),
                next_slide_message: options.a11y.next_slide_message.clone(),
            },
        }
    }
}

impl SwiperOptions {
    /// JSON text for `JSON.parse`.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodslide_core::dom::NodeId;
    use prodslide_core::settings::{Effect, Settings, SlideLabels};
    use prodslide_runtime::config::EngineConfig;
    use serde_json::json;

    #[test]
    fn options_use_swiper_names() {
        let config = EngineConfig::from_settings(
            Settings::default()
                .with_speed_ms(3_000)
                .with_effect(Effect::Fade),
        );
        let opts = SwiperOptions::from(&BackendOptions::new(&config, Some(NodeId::new(4))));
        let value: serde_json::Value = serde_json::from_str(&opts.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "effect": "fade",
                "speed": 400,
                "slidesPerView": 1,
                "spaceBetween": 0,
                "loop": true,
                "autoplay": {
                    "delay": 3000,
                    "disableOnInteraction": false,
                    "pauseOnMouseEnter": true
                },
                "pagination": { "clickable": true, "dynamicBullets": true },
                "lazy": { "loadPrevNext": true, "loadPrevNextAmount": 2 },
                "a11y": {
                    "enabled": true,
                    "prevSlideMessage": "Previous slide",
                    "nextSlideMessage": "Next slide"
                }
            })
        );
    }

    #[test]
    fn custom_labels_are_carried() {
        let labels = SlideLabels {
            prev: "Précédent".to_owned(),
            next: "Suivant".to_owned(),
        };
        let opts = SwiperOptions::from(
            &BackendOptions::new(&EngineConfig::default(), None).with_labels(&labels),
        );
        let value: serde_json::Value = serde_json::from_str(&opts.to_json().unwrap()).unwrap();
        assert_eq!(
            value["a11y"],
            json!({
                "enabled": true,
                "prevSlideMessage": "Précédent",
                "nextSlideMessage": "Suivant"
            })
        );
    }

    #[test]
    fn pagination_omitted_without_element() {
        let opts = SwiperOptions::from(&BackendOptions::new(&EngineConfig::default(), None));
        assert!(!opts.to_json().unwrap().contains("pagination"));
    }
}

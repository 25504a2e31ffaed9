#![forbid(unsafe_code)]

//! Host protocol tests: settings JSON in, host events in, outputs and
//! diagnostics out, all over the in-memory document.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use prodslide_core::dom::MemoryDom;
use prodslide_core::session::MemorySessionStore;
use prodslide_core::settings::Layout;
use prodslide_runtime::backend::{Available, Unavailable};
use prodslide_runtime::page::PREMIUM_NOTICE_KEY;
use prodslide_runtime::sim_backend::SimBackend;
use prodslide_runtime::simulator::Markup;
use prodslide_web::{Bridge, BridgeError, HostEvent, HostOutput};

fn listing() -> (MemoryDom, u32, u32) {
    let mut markup = Markup::new();
    let first = markup.product("501", 3);
    markup.single("502");
    markup.broken("503");
    let second = markup.product("504", 2);
    (markup.finish(), first.raw(), second.raw())
}

#[test]
fn settings_json_is_sanitized() {
    let (dom, _, _) = listing();
    let bridge = Bridge::from_json(
        dom,
        r#"{"enabled":"1","speed":"99999","effect":"cube","layout":"weird"}"#,
        Unavailable,
    )
    .unwrap();
    let settings = bridge.page().config().settings;
    assert_eq!(settings.speed.as_millis(), 2_500);
    assert_eq!(settings.layout, Layout::Default);
    assert!(settings.enabled);
}

#[test]
fn malformed_settings_are_an_error() {
    let (dom, _, _) = listing();
    let err = Bridge::from_json(dom, "[1,2", Unavailable).unwrap_err();
    assert!(matches!(err, BridgeError::Settings(_)));
    assert!(err.to_string().starts_with("invalid settings"));
}

#[test]
fn replay_produces_outputs_in_order() {
    let (dom, first, second) = listing();
    let mut bridge = Bridge::from_json(dom, r#"{"speed":1000,"layout":"grid"}"#, Unavailable)
        .unwrap();
    bridge.start();

    let script = format!(
        r#"[
            {{"type":"advance","ms":4900}},
            {{"type":"click","container":{first},"target":{first}}},
            {{"type":"advance","ms":1000}},
            {{"type":"pointer_enter","container":{second}}},
            {{"type":"advance","ms":1000}}
        ]"#
    );
    assert_eq!(bridge.replay_json(&script).unwrap(), 5);

    assert_eq!(
        bridge.take_outputs(),
        vec![
            HostOutput::PremiumNotice { layout: Layout::Grid },
            HostOutput::SlideChanged {
                product_id: "501".to_owned(),
                carousel: 0,
                index: 1,
            },
            HostOutput::SlideChanged {
                product_id: "501".to_owned(),
                carousel: 0,
                index: 2,
            },
            HostOutput::SlideChanged {
                product_id: "504".to_owned(),
                carousel: 2,
                index: 1,
            },
            HostOutput::SlideChanged {
                product_id: "501".to_owned(),
                carousel: 0,
                index: 0,
            },
        ]
    );
    assert!(bridge.take_outputs().is_empty());
}

#[test]
fn bad_replay_applies_nothing() {
    let (dom, first, _) = listing();
    let mut bridge = Bridge::from_json(dom, "{}", Unavailable).unwrap();
    bridge.start();
    let script = format!(r#"[{{"type":"advance","ms":10}},{{"type":"hover","container":{first}}}]"#);
    assert!(matches!(bridge.replay_json(&script), Err(BridgeError::Event(_))));
    assert_eq!(bridge.page().now().as_millis(), 0);
}

#[test]
fn diagnostics_report_lists_everything() {
    let (dom, _, _) = listing();
    let backend = Rc::new(SimBackend::new().failing_for("504"));
    let mut bridge = Bridge::from_json(dom, "{}", Available(backend)).unwrap();
    bridge.start();
    bridge.apply(HostEvent::Resize {
        width: 1440,
        height: 900,
    });
    bridge.apply(HostEvent::Advance { ms: 250 });

    let report = bridge.diagnostics();
    assert_eq!(report.lifecycle, "running");
    assert_eq!(report.backend, "sim");
    assert_eq!(report.probe_attempts, 1);
    assert_eq!(report.viewport, Some([1440, 900]));

    let rows: Vec<_> = report
        .carousels
        .iter()
        .map(|c| (c.product_id.as_str(), c.mode.as_str(), c.strategy.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("501", "animated", "backend"),
            ("502", "single", "self-managed"),
            ("504", "animated", "self-managed"),
        ]
    );
    assert!(report.carousels[2].fallback.is_some());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].product_id, "503");

    let json = bridge.diagnostics_json().unwrap();
    assert!(json.contains("\"lifecycle\": \"running\""));
}

#[test]
fn navigation_labels_reach_the_backend() {
    let (dom, _, _) = listing();
    let backend = Rc::new(SimBackend::new());
    let stats = backend.stats();
    let mut bridge = Bridge::from_json(
        dom,
        r#"{"prevSlideText":"Vorheriges Bild","nextSlideText":""}"#,
        Available(backend),
    )
    .unwrap();
    bridge.start();
    let options = stats.last_options().unwrap();
    assert_eq!(options.a11y.prev_slide_message, "Vorheriges Bild");
    assert_eq!(options.a11y.next_slide_message, "Next slide");
    assert_eq!(stats.constructed_loading(), stats.created() + stats.failed());
}

#[test]
fn premium_notice_respects_session() {
    let (dom, _, _) = listing();
    let session = MemorySessionStore::with_entries([(PREMIUM_NOTICE_KEY, "1")]);
    let mut bridge = Bridge::from_json(dom, r#"{"layout":"masonry"}"#, Unavailable)
        .unwrap()
        .with_session(session);
    bridge.start();
    assert_eq!(bridge.take_outputs_json().unwrap(), "[]");
}

#[test]
fn disabled_settings_keep_page_inert() {
    let (dom, first, _) = listing();
    let mut bridge = Bridge::from_json(dom, r#"{"enabled":"0"}"#, Unavailable).unwrap();
    bridge.start();
    bridge.apply(HostEvent::Click {
        container: first,
        target: first,
    });
    bridge.apply(HostEvent::Advance { ms: 30_000 });
    assert_eq!(bridge.diagnostics().lifecycle, "disabled");
    assert!(bridge.take_outputs().is_empty());
}

proptest! {
    #[test]
    fn host_events_survive_json(container in 0u32..500, target in 0u32..500, ms in 0u64..100_000) {
        for event in [
            HostEvent::PointerEnter { container },
            HostEvent::Click { container, target },
            HostEvent::Advance { ms },
            HostEvent::ContentChanged,
        ] {
            let json = serde_json::to_string(&event).unwrap();
            let back: HostEvent = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, event);
        }
    }
}

#![forbid(unsafe_code)]

//! Structured logging integration tests.
//!
//! A capturing `tracing_subscriber::Layer` records every event the engine
//! emits so tests can assert on levels and fields.
//!
//!   cargo test -p prodslide-runtime --test tracing_tests

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

use prodslide_core::settings::{Layout, Settings};
use prodslide_runtime::backend::{Available, Unavailable};
use prodslide_runtime::config::EngineConfig;
use prodslide_runtime::sim_backend::SimBackend;
use prodslide_runtime::simulator::{Markup, PageSimulator};

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: Level,
    fields: HashMap<String, String>,
}

impl CapturedEvent {
    fn message(&self) -> &str {
        self.fields.get("message").map_or("", String::as_str)
    }
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor(HashMap<String, String>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(HashMap::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            fields: visitor.0,
        });
    }
}

/// Run `f` with a capturing subscriber installed and return what it logged.
fn capture(f: impl FnOnce()) -> Vec<CapturedEvent> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = EventCapture {
        events: Arc::clone(&events),
    };
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().unwrap().clone();
    captured
}

fn quick(settings: Settings) -> EngineConfig {
    EngineConfig::from_settings(settings).with_probe(std::time::Duration::from_millis(100), 2)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn backend_fallback_is_a_warning_with_product_id() {
    let events = capture(|| {
        let mut markup = Markup::new();
        markup.product("A", 2);
        markup.product("B", 2);
        let backend = Rc::new(SimBackend::new().failing_for("A"));
        let mut sim = PageSimulator::new(markup.finish(), quick(Settings::default()), Available(backend));
        sim.start();
        sim.shutdown();
    });

    let warnings: Vec<_> = events.iter().filter(|e| e.level == Level::WARN).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].fields.get("product_id").map(String::as_str), Some("A"));
    assert!(warnings[0].message().contains("falling back"));
    assert!(warnings[0].fields["error"].contains("simulated failure"));
}

#[test]
fn probe_exhaustion_and_init_are_info() {
    let events = capture(|| {
        let mut markup = Markup::new();
        markup.product("1", 3);
        let mut sim = PageSimulator::new(markup.finish(), quick(Settings::default()), Unavailable);
        sim.start();
        sim.advance_ms(100);
    });

    let info: Vec<_> = events
        .iter()
        .filter(|e| e.level == Level::INFO)
        .map(CapturedEvent::message)
        .collect();
    assert!(info.iter().any(|m| m.contains("backend unavailable")));
    assert!(info.iter().any(|m| m.contains("initialized")));

    let misses = events
        .iter()
        .filter(|e| e.level == Level::DEBUG && e.message().contains("not loaded yet"))
        .count();
    assert_eq!(misses, 2);

    let init = events
        .iter()
        .find(|e| e.message().contains("initialized"))
        .expect("init event");
    assert_eq!(init.fields.get("carousels").map(String::as_str), Some("1"));
    assert_eq!(init.fields.get("backend").map(String::as_str), Some("none"));
}

#[test]
fn premium_layout_notice_is_logged() {
    let events = capture(|| {
        let mut markup = Markup::new();
        markup.product("1", 2);
        let settings = Settings::default().with_layout(Layout::Carousel);
        let mut sim = PageSimulator::new(markup.finish(), quick(settings), Unavailable);
        sim.start();
    });

    assert!(
        events
            .iter()
            .any(|e| e.level == Level::INFO && e.message().contains("premium layout"))
    );
}

#[test]
fn disabled_page_logs_and_builds_nothing() {
    let events = capture(|| {
        let mut markup = Markup::new();
        markup.product("1", 2);
        let settings = Settings::default().with_enabled(false);
        let mut sim = PageSimulator::new(markup.finish(), quick(settings), Unavailable);
        sim.start();
        sim.advance_ms(10_000);
    });

    let info: Vec<_> = events
        .iter()
        .filter(|e| e.level == Level::INFO)
        .map(CapturedEvent::message)
        .collect();
    assert!(info[0].contains("disabled"));
    assert!(!info.iter().any(|m| m.contains("initialized")));
    assert!(!events.iter().any(|e| e.fields.contains_key("carousel")));
}

#![forbid(unsafe_code)]

//! End-to-end page scenarios driven through the deterministic simulator.
//!
//! Every test builds storefront markup, starts a page, and moves simulated
//! time by hand. No wall clock is involved.

use std::rc::Rc;
use std::time::Duration;

use prodslide_core::dom::{Dom, Listeners};
use prodslide_core::settings::{HoverExit, Settings};
use prodslide_core::style::{Translate, prop};
use prodslide_runtime::backend::{Available, Unavailable};
use prodslide_runtime::carousel::{Mode, SLIDE_CHANGE_EVENT, StrategyKind};
use prodslide_runtime::config::EngineConfig;
use prodslide_runtime::page::{BackendStatus, Lifecycle};
use prodslide_runtime::scheduler::TimerTag;
use prodslide_runtime::sim_backend::{LateSource, SimBackend};
use prodslide_runtime::simulator::{Markup, PageSimulator};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn speed(ms: u64) -> EngineConfig {
    EngineConfig::from_settings(Settings::default().with_speed_ms(ms))
}

/// Advance in probe-sized steps until the page leaves `Detecting`.
fn run_until_resolved(sim: &mut PageSimulator) -> u64 {
    for _ in 0..1_000 {
        if sim.page().lifecycle() != Lifecycle::Detecting {
            break;
        }
        sim.advance_ms(100);
    }
    assert_eq!(sim.page().lifecycle(), Lifecycle::Running);
    sim.now_ms() as u64
}

// ============================================================================
// Strategy selection and autoplay timing
// ============================================================================

#[test]
fn exhausted_probe_runs_self_managed_cycle() {
    let mut markup = Markup::new();
    let product = markup.product("101", 3);
    let config = speed(2_000);
    let mut sim = PageSimulator::new(markup.finish(), config, Unavailable);
    sim.start();

    let t0 = run_until_resolved(&mut sim);
    assert_eq!(t0, config.probe.budget().as_millis() as u64);
    let diag = sim.diagnostics();
    assert_eq!(diag.backend, BackendStatus::Unavailable);
    assert_eq!(diag.probe_attempts, config.probe.max_attempts);
    assert_eq!(diag.carousels[0].strategy, StrategyKind::SelfManaged);
    assert_eq!(sim.visible_slides(product), vec![0]);

    sim.advance_to_ms(t0 + 1_999);
    assert_eq!(sim.visible_slides(product), vec![0]);
    sim.advance_to_ms(t0 + 2_000);
    assert_eq!(sim.visible_slides(product), vec![1]);
    sim.advance_to_ms(t0 + 4_000);
    assert_eq!(sim.visible_slides(product), vec![2]);
    sim.advance_to_ms(t0 + 6_000);
    assert_eq!(sim.visible_slides(product), vec![0]);

    assert_eq!(sim.indices_for("101"), vec![1, 2, 0]);
    let dom_events: Vec<_> = sim
        .dom()
        .custom_events()
        .iter()
        .filter(|e| e.node == product && e.name == SLIDE_CHANGE_EVENT)
        .map(|e| e.detail)
        .collect();
    assert_eq!(dom_events, vec![1, 2, 0]);
}

#[test]
fn single_image_gets_no_machinery() {
    let mut markup = Markup::new();
    let single = markup.single("7");
    let config = speed(1_000).with_probe(ms(100), 2);
    let mut sim = PageSimulator::new(markup.finish(), config, Unavailable);
    sim.start();
    sim.advance_ms(10_000);

    let carousel = sim.page().carousel_for(single).expect("single carousel");
    assert_eq!(carousel.mode(), Mode::Single);
    assert_eq!(carousel.timer_count(), 0);
    assert!(carousel.listeners().is_empty());
    assert_eq!(sim.dom().listener_count(), 0);
    assert_eq!(sim.page().active_timers(), 0);
    assert_eq!(sim.dom().style(single, prop::POSITION), None);
    assert_eq!(sim.slide_changes().count(), 0);
}

#[test]
fn backend_failure_is_isolated_to_one_container() {
    let mut markup = Markup::new();
    let a = markup.product("A", 3);
    let b = markup.product("B", 3);
    let c = markup.product("C", 2);
    let backend = Rc::new(SimBackend::new().failing_for("A"));
    let stats = backend.stats();
    let mut sim = PageSimulator::new(markup.finish(), speed(2_000), Available(backend));
    sim.start();

    assert_eq!(sim.page().lifecycle(), Lifecycle::Running);
    let page = sim.page();
    let strategy = |node| page.carousel_for(node).map(|c| c.strategy());
    assert_eq!(strategy(a), Some(StrategyKind::SelfManaged));
    assert_eq!(strategy(b), Some(StrategyKind::Backend));
    assert_eq!(strategy(c), Some(StrategyKind::Backend));
    assert_eq!(stats.failed(), 1);
    assert_eq!(stats.live(), 2);

    let diag = sim.diagnostics();
    let fallbacks: Vec<_> = diag.fallbacks().map(|r| r.product_id.as_str()).collect();
    assert_eq!(fallbacks, vec!["A"]);

    sim.advance_ms(2_000);
    assert_eq!(sim.indices_for("A"), vec![1]);
    assert_eq!(sim.indices_for("B"), vec![1]);
    assert_eq!(sim.indices_for("C"), vec![1]);
}

#[test]
fn late_backend_is_used_once_found() {
    let mut markup = Markup::new();
    let product = markup.product("55", 4);
    let backend = Rc::new(SimBackend::new());
    let stats = backend.stats();
    let mut sim = PageSimulator::new(markup.finish(), speed(1_000), LateSource::new(backend, 3));
    sim.start();
    assert_eq!(sim.page().lifecycle(), Lifecycle::Detecting);

    let t0 = run_until_resolved(&mut sim);
    assert_eq!(t0, 200);
    assert_eq!(sim.page().timers_tagged(TimerTag::Probe), 0);
    let diag = sim.diagnostics();
    assert_eq!(diag.backend, BackendStatus::Available("sim".to_owned()));
    assert_eq!(diag.probe_attempts, 3);
    assert_eq!(stats.live(), 1);

    sim.advance_to_ms(t0 + 1_000);
    assert_eq!(sim.active_index(product), Some(1));
    sim.advance_to_ms(t0 + 3_000);
    assert_eq!(sim.indices_for("55"), vec![1, 2, 3]);
}

// ============================================================================
// Interaction
// ============================================================================

#[test]
fn hover_pauses_and_settle_resumes_self_managed() {
    let mut markup = Markup::new();
    let product = markup.product("9", 3);
    let config = speed(1_000).with_probe(ms(100), 1);
    let mut sim = PageSimulator::new(markup.finish(), config, Unavailable);
    sim.start();
    assert_eq!(sim.page().lifecycle(), Lifecycle::Running);

    sim.hover(product);
    sim.advance_ms(5_000);
    assert_eq!(sim.slide_changes().count(), 0);
    assert!(sim.page().carousel_for(product).expect("carousel").is_paused());

    sim.unhover(product);
    sim.advance_ms(499);
    assert!(sim.page().carousel_for(product).expect("carousel").is_paused());
    sim.advance_ms(1);
    assert!(!sim.page().carousel_for(product).expect("carousel").is_paused());
    sim.advance_ms(1_000);
    assert_eq!(sim.indices_for("9"), vec![1]);
}

#[test]
fn reset_to_first_on_hover_exit() {
    let mut markup = Markup::new();
    let product = markup.product("9", 3);
    let config = speed(1_000)
        .with_probe(ms(100), 1)
        .with_hover_exit(HoverExit::ResetToFirst);
    let mut sim = PageSimulator::new(markup.finish(), config, Unavailable);
    sim.start();
    sim.advance_ms(2_000);
    assert_eq!(sim.active_index(product), Some(2));

    sim.hover(product);
    sim.unhover(product);
    sim.advance_ms(500);
    assert_eq!(sim.active_index(product), Some(0));
    assert_eq!(sim.indices_for("9"), vec![1, 2, 0]);
}

#[test]
fn backend_hover_and_click() {
    let mut markup = Markup::new();
    let product = markup.product("12", 4);
    let link_text = markup.link(product, "/product/12");
    let backend = Rc::new(SimBackend::new());
    let mut sim = PageSimulator::new(markup.finish(), speed(2_000), Available(backend));
    sim.start();

    sim.advance_ms(2_000);
    assert_eq!(sim.active_index(product), Some(1));

    sim.hover(product);
    assert_eq!(
        sim.page()
            .carousel_for(product)
            .and_then(|c| c.backend_autoplay_running()),
        Some(false)
    );
    sim.advance_ms(10_000);
    assert_eq!(sim.active_index(product), Some(1));

    // Clicks still navigate while hovered; links pass through.
    sim.click(product, product);
    assert_eq!(sim.active_index(product), Some(2));
    sim.advance_ms(500);
    sim.click(product, link_text);
    assert_eq!(sim.active_index(product), Some(2));

    sim.unhover(product);
    sim.advance_ms(500);
    assert_eq!(
        sim.page()
            .carousel_for(product)
            .and_then(|c| c.backend_autoplay_running()),
        Some(true)
    );
    sim.advance_ms(2_000);
    assert_eq!(sim.active_index(product), Some(3));
    assert_eq!(sim.indices_for("12"), vec![1, 2, 3]);
}

#[test]
fn swipe_needs_threshold_distance() {
    let mut markup = Markup::new();
    let product = markup.product("3", 3);
    let config = speed(10_000).with_probe(ms(100), 1);
    let mut sim = PageSimulator::new(markup.finish(), config, Unavailable);
    sim.start();

    sim.swipe(product, 200.0, 151.0);
    assert_eq!(sim.active_index(product), Some(0));
    sim.swipe(product, 200.0, 150.0);
    assert_eq!(sim.active_index(product), Some(1));
    sim.advance_ms(500);
    sim.swipe(product, 100.0, 180.0);
    assert_eq!(sim.active_index(product), Some(0));
    sim.advance_ms(500);
    sim.swipe(product, 100.0, 180.0);
    assert_eq!(sim.active_index(product), Some(2));
}

// ============================================================================
// Guard, resize, rebuild, shutdown
// ============================================================================

#[test]
fn guard_resets_extreme_transform_without_moving() {
    let mut markup = Markup::new();
    let product = markup.product("77", 3);
    let config = speed(2_500).with_probe(ms(100), 3);
    let mut sim = PageSimulator::new(markup.finish(), config, Unavailable);
    sim.start();
    let t0 = run_until_resolved(&mut sim);

    let wrapper = sim
        .page()
        .carousel_for(product)
        .and_then(|c| c.slides().first())
        .and_then(|s| sim.dom().parent(s.node))
        .expect("wrapper");
    sim.dom_mut()
        .set_style(wrapper, prop::TRANSFORM, "translate3d(-48000px, 0px, 0px)");

    sim.advance_to_ms(t0 + 1_000);
    let report = sim.page().last_guard_report();
    assert_eq!(report.repairs.len(), 1);
    assert_eq!(report.repairs[0].active_index, 0);
    assert!(report.repairs[0].corruption.transform);

    let transform = sim.dom().style(wrapper, prop::TRANSFORM).expect("transform");
    assert!(Translate::parse(&transform).is_some_and(Translate::is_zero));
    assert_eq!(sim.active_index(product), Some(0));
    assert_eq!(sim.slide_changes().count(), 0);
    assert_eq!(sim.diagnostics().guard_repairs, 1);
}

#[test]
fn resize_refreshes_layout_without_moving() {
    let mut markup = Markup::new();
    let product = markup.product("8", 3);
    let config = speed(10_000).with_probe(ms(100), 1);
    let mut sim = PageSimulator::new(markup.finish(), config, Unavailable);
    sim.start();
    sim.click(product, product);
    assert_eq!(sim.active_index(product), Some(1));
    sim.clear_outputs();

    sim.resize(800, 600);
    sim.resize(1024, 768);
    sim.advance_ms(100);
    sim.resize(1280, 720);
    assert_eq!(sim.page().timers_tagged(TimerTag::ResizeQuiet), 1);
    sim.advance_ms(250);

    assert_eq!(sim.diagnostics().viewport, Some((1280, 720)));
    assert_eq!(sim.page().timers_tagged(TimerTag::ResizeQuiet), 0);
    assert_eq!(sim.active_index(product), Some(1));
    assert_eq!(sim.visible_slides(product), vec![1]);
    assert_eq!(sim.slide_changes().count(), 0);
}

#[test]
fn content_change_rebuilds_with_new_products() {
    let mut markup = Markup::new();
    let first = markup.product("1", 3);
    let backend = Rc::new(SimBackend::new());
    let stats = backend.stats();
    let config = speed(2_000);
    let mut sim = PageSimulator::new(markup.finish(), config, Available(backend));
    sim.start();
    assert_eq!(sim.page().carousels().len(), 1);
    let before = sim.page().carousel_for(first).map(|c| c.id());

    sim.content_changed();
    sim.content_changed();
    sim.advance_ms(100);

    let diag = sim.diagnostics();
    assert_eq!(diag.rebuilds, 1);
    assert_eq!(diag.probe_attempts, 1);
    assert_eq!(diag.carousels.len(), 1);
    assert_ne!(sim.page().carousel_for(first).map(|c| c.id()), before);
    assert_eq!(stats.created(), 2);
    assert_eq!(stats.live(), 1);
    let listeners = sim.page().carousel_for(first).map(|c| c.listeners());
    assert_eq!(listeners, Some(Listeners::HOVER | Listeners::CLICK));
    assert_eq!(sim.dom().listeners(first), Listeners::HOVER | Listeners::CLICK);
}

#[test]
fn rebuild_releases_removed_fragments() {
    let mut markup = Markup::new();
    let removed = markup.product("1", 3);
    let kept = markup.product("2", 2);
    let config = speed(2_000).with_probe(ms(100), 1);
    let mut sim = PageSimulator::new(markup.finish(), config, Unavailable);
    sim.start();
    assert_eq!(sim.page().carousels().len(), 2);

    sim.dom_mut().detach(removed);
    sim.content_changed();
    sim.advance_ms(100);

    let diag = sim.diagnostics();
    assert_eq!(diag.rebuilds, 1);
    assert_eq!(diag.carousels.len(), 1);
    assert!(sim.page().carousel_for(removed).is_none());
    assert!(sim.page().carousel_for(kept).is_some());
    let released = sim.dom().released();
    assert!(released > 0);
    assert_eq!(diag.released_nodes, released as u64);
    assert_eq!(
        sim.dom().listeners(kept),
        Listeners::HOVER | Listeners::CLICK | Listeners::TOUCH
    );
    assert_eq!(sim.dom().listener_count(), 5);
}

#[test]
fn shutdown_during_detection_cancels_probe() {
    let mut markup = Markup::new();
    let product = markup.product("5", 3);
    let mut sim = PageSimulator::new(markup.finish(), EngineConfig::default(), Unavailable);
    sim.start();
    sim.advance_ms(300);
    assert_eq!(sim.page().timers_tagged(TimerTag::Probe), 1);

    sim.shutdown();
    let diag = sim.diagnostics();
    assert_eq!(diag.lifecycle, Lifecycle::Shutdown);
    assert_eq!(diag.backend, BackendStatus::Cancelled);
    assert_eq!(diag.active_timers, 0);

    sim.advance_ms(60_000);
    assert!(sim.page().carousel_for(product).is_none());
    assert_eq!(sim.dom().listener_count(), 0);
}

#[test]
fn shutdown_releases_everything() {
    let mut markup = Markup::new();
    markup.product("1", 3);
    markup.product("2", 2);
    markup.single("3");
    let backend = Rc::new(SimBackend::new().failing_for("2"));
    let stats = backend.stats();
    let mut sim = PageSimulator::new(markup.finish(), speed(1_000), Available(backend));
    sim.start();
    sim.resize(10, 10);
    sim.content_changed();
    assert!(sim.page().active_timers() > 0);

    sim.shutdown();
    assert_eq!(sim.page().active_timers(), 0);
    assert_eq!(sim.dom().listener_count(), 0);
    assert_eq!(stats.live(), 0);
}

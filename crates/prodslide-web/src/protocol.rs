#![forbid(unsafe_code)]

//! JSON-friendly host protocol.
//!
//! The page script (or a record/replay harness) talks to the engine in
//! these shapes:
//!
//! - [`HostEvent`]: input, environment and time steps, tagged by `type`.
//! - [`HostOutput`]: slide changes and notices.
//! - [`DiagnosticsReport`]: a flat, stable rendering of
//!   [`Diagnostics`](prodslide_runtime::page::Diagnostics).
//!
//! Node references are raw node ids as handed out by the host document.
//! Encoding is deterministic: field order is declaration order and maps are
//! never used, so the same session always serializes to the same bytes.

use serde::{Deserialize, Serialize};

use prodslide_core::dom::NodeId;
use prodslide_core::event::{PageEvent, PointerKind, TouchPhase};
use prodslide_core::settings::Layout;
use prodslide_runtime::carousel::{CarouselState, Mode};
use prodslide_runtime::page::{BackendStatus, Diagnostics, Lifecycle, Notice, PageOutput};

/// One host step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    PointerEnter { container: u32 },
    PointerLeave { container: u32 },
    Click { container: u32, target: u32 },
    TouchStart { container: u32, x: f32 },
    TouchEnd { container: u32, x: f32 },
    Resize { width: u32, height: u32 },
    /// Product fragments were loaded or refreshed.
    #[serde(alias = "fragments_refreshed", alias = "fragments_loaded")]
    ContentChanged,
    /// Let `ms` milliseconds of time pass.
    Advance { ms: u64 },
}

impl HostEvent {
    /// The engine event this step delivers. `Advance` carries none.
    #[must_use]
    pub fn to_page_event(self) -> Option<PageEvent> {
        let node = NodeId::new;
        Some(match self {
            Self::PointerEnter { container } => PageEvent::Pointer {
                container: node(container),
                kind: PointerKind::Enter,
            },
            Self::PointerLeave { container } => PageEvent::Pointer {
                container: node(container),
                kind: PointerKind::Leave,
            },
            Self::Click { container, target } => PageEvent::Click {
                container: node(container),
                target: node(target),
            },
            Self::TouchStart { container, x } => PageEvent::Touch {
                container: node(container),
                phase: TouchPhase::Start,
                x,
            },
            Self::TouchEnd { container, x } => PageEvent::Touch {
                container: node(container),
                phase: TouchPhase::End,
                x,
            },
            Self::Resize { width, height } => PageEvent::Resize { width, height },
            Self::ContentChanged => PageEvent::ContentChanged,
            Self::Advance { .. } => return None,
        })
    }
}

impl From<PageEvent> for HostEvent {
    fn from(event: PageEvent) -> Self {
        match event {
            PageEvent::Pointer {
                container,
                kind: PointerKind::Enter,
            } => Self::PointerEnter {
                container: container.raw(),
            },
            PageEvent::Pointer {
                container,
                kind: PointerKind::Leave,
            } => Self::PointerLeave {
                container: container.raw(),
            },
            PageEvent::Click { container, target } => Self::Click {
                container: container.raw(),
                target: target.raw(),
            },
            PageEvent::Touch {
                container,
                phase: TouchPhase::Start,
                x,
            } => Self::TouchStart {
                container: container.raw(),
                x,
            },
            PageEvent::Touch {
                container,
                phase: TouchPhase::End,
                x,
            } => Self::TouchEnd {
                container: container.raw(),
                x,
            },
            PageEvent::Resize { width, height } => Self::Resize { width, height },
            PageEvent::ContentChanged => Self::ContentChanged,
        }
    }
}

/// Output delivered to the page script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostOutput {
    SlideChanged {
        product_id: String,
        carousel: u32,
        index: usize,
    },
    /// Show the premium-layout notice; already recorded for this session.
    PremiumNotice { layout: Layout },
}

impl From<&PageOutput> for HostOutput {
    fn from(output: &PageOutput) -> Self {
        match output {
            PageOutput::SlideChanged(change) => Self::SlideChanged {
                product_id: change.product_id.clone(),
                carousel: change.carousel.raw(),
                index: change.index,
            },
            PageOutput::Notice(Notice::PremiumLayout(layout)) => {
                Self::PremiumNotice { layout: *layout }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Serializable engine snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub lifecycle: String,
    pub now_ms: u64,
    pub backend: String,
    pub probe_attempts: u32,
    pub carousels: Vec<CarouselEntry>,
    pub skipped: Vec<SkippedEntry>,
    pub active_timers: usize,
    pub rebuilds: u64,
    #[serde(default)]
    pub released_nodes: u64,
    pub guard_repairs: u64,
    pub viewport: Option<[u32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselEntry {
    pub id: u32,
    pub product_id: String,
    pub container: u32,
    pub mode: String,
    pub strategy: String,
    pub state: String,
    pub slides: usize,
    pub timers: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub container: u32,
    pub position: usize,
    pub product_id: String,
    pub reason: String,
}

fn lifecycle_name(lifecycle: Lifecycle) -> &'static str {
    match lifecycle {
        Lifecycle::Created => "created",
        Lifecycle::Detecting => "detecting",
        Lifecycle::Running => "running",
        Lifecycle::Disabled => "disabled",
        Lifecycle::Shutdown => "shutdown",
    }
}

fn backend_name(status: &BackendStatus) -> String {
    match status {
        BackendStatus::Pending => "pending".to_owned(),
        BackendStatus::Available(name) => name.clone(),
        BackendStatus::Unavailable => "unavailable".to_owned(),
        BackendStatus::Cancelled => "cancelled".to_owned(),
    }
}

fn state_name(state: CarouselState) -> String {
    match state {
        CarouselState::Idle => "idle".to_owned(),
        CarouselState::Showing(i) => format!("showing:{i}"),
        CarouselState::Paused(i) => format!("paused:{i}"),
        CarouselState::Transitioning { from, to } => format!("transitioning:{from}->{to}"),
    }
}

impl From<&Diagnostics> for DiagnosticsReport {
    fn from(diag: &Diagnostics) -> Self {
        Self {
            lifecycle: lifecycle_name(diag.lifecycle).to_owned(),
            now_ms: u64::try_from(diag.now.as_millis()).unwrap_or(u64::MAX),
            backend: backend_name(&diag.backend),
            probe_attempts: diag.probe_attempts,
            carousels: diag
                .carousels
                .iter()
                .map(|c| CarouselEntry {
                    id: c.id.raw(),
                    product_id: c.product_id.clone(),
                    container: c.container.raw(),
                    mode: match c.mode {
                        Mode::Single => "single",
                        Mode::Animated => "animated",
                    }
                    .to_owned(),
                    strategy: c.strategy.as_str().to_owned(),
                    state: state_name(c.state),
                    slides: c.slide_count,
                    timers: c.timers,
                    fallback: c.fallback.as_ref().map(ToString::to_string),
                })
                .collect(),
            skipped: diag
                .skipped
                .iter()
                .map(|s| SkippedEntry {
                    container: s.node.raw(),
                    position: s.position,
                    product_id: s.product_id.clone(),
                    reason: s.error.to_string(),
                })
                .collect(),
            active_timers: diag.active_timers,
            rebuilds: diag.rebuilds,
            released_nodes: diag.released_nodes,
            guard_repairs: diag.guard_repairs,
            viewport: diag.viewport.map(|(w, h)| [w, h]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_use_type_tags() {
        let ev: HostEvent =
            serde_json::from_str(r#"{"type":"touch_end","container":4,"x":12.5}"#).unwrap();
        assert_eq!(ev, HostEvent::TouchEnd { container: 4, x: 12.5 });
        let json = serde_json::to_string(&HostEvent::Advance { ms: 16 }).unwrap();
        assert_eq!(json, r#"{"type":"advance","ms":16}"#);
    }

    #[test]
    fn fragment_aliases_map_to_content_change() {
        for raw in [
            r#"{"type":"content_changed"}"#,
            r#"{"type":"fragments_refreshed"}"#,
            r#"{"type":"fragments_loaded"}"#,
        ] {
            let ev: HostEvent = serde_json::from_str(raw).unwrap();
            assert_eq!(ev.to_page_event(), Some(PageEvent::ContentChanged));
        }
    }

    #[test]
    fn advance_has_no_page_event() {
        assert_eq!(HostEvent::Advance { ms: 5 }.to_page_event(), None);
    }

    #[test]
    fn page_events_convert_back() {
        let ev = PageEvent::Click {
            container: NodeId::new(3),
            target: NodeId::new(9),
        };
        assert_eq!(HostEvent::from(ev).to_page_event(), Some(ev));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<HostEvent>(r#"{"type":"scroll"}"#).is_err());
    }

    #[test]
    fn premium_notice_encoding() {
        let out = HostOutput::from(&PageOutput::Notice(Notice::PremiumLayout(Layout::Grid)));
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"{"type":"premium_notice","layout":"grid"}"#
        );
    }
}

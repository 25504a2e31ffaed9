#![forbid(unsafe_code)]

//! Canonical page events.
//!
//! The host translates browser input into [`PageEvent`] values and pushes
//! them into the engine. Container-scoped events name the container node
//! they were observed on; the engine routes them to that container's
//! carousel and drops them when no matching listener is attached.
//!
//! # Design Notes
//!
//! - Touch positions are horizontal logical pixels (`screenX`); vertical
//!   motion never drives a swipe.
//! - A click carries the node that was actually hit so the engine can tell
//!   a click on an embedded product link from a click on the slide itself.

use crate::dom::{Listeners, NodeId};

/// Pointer hover transitions on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// `mouseenter`.
    Enter,
    /// `mouseleave`.
    Leave,
}

/// Touch phases that matter for swipe recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    /// `touchstart`.
    Start,
    /// `touchend`.
    End,
}

/// An input or environment event delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageEvent {
    /// Pointer entered or left a container.
    Pointer {
        container: NodeId,
        kind: PointerKind,
    },
    /// A click inside a container. `target` is the deepest node hit.
    Click { container: NodeId, target: NodeId },
    /// A touch phase inside a container at horizontal position `x`.
    Touch {
        container: NodeId,
        phase: TouchPhase,
        x: f32,
    },
    /// Viewport resized.
    Resize { width: u32, height: u32 },
    /// Page content changed (fragment refresh, lazy-loaded product list).
    ContentChanged,
}

impl PageEvent {
    /// The container this event is scoped to, if any.
    #[must_use]
    pub const fn container(&self) -> Option<NodeId> {
        match *self {
            Self::Pointer { container, .. }
            | Self::Click { container, .. }
            | Self::Touch { container, .. } => Some(container),
            Self::Resize { .. } | Self::ContentChanged => None,
        }
    }

    /// Listener a container must have attached to receive this event.
    #[must_use]
    pub const fn required_listener(&self) -> Listeners {
        match *self {
            Self::Pointer {
                kind: PointerKind::Enter,
                ..
            } => Listeners::POINTER_ENTER,
            Self::Pointer {
                kind: PointerKind::Leave,
                ..
            } => Listeners::POINTER_LEAVE,
            Self::Click { .. } => Listeners::CLICK,
            Self::Touch {
                phase: TouchPhase::Start,
                ..
            } => Listeners::TOUCH_START,
            Self::Touch {
                phase: TouchPhase::End,
                ..
            } => Listeners::TOUCH_END,
            Self::Resize { .. } | Self::ContentChanged => Listeners::empty(),
        }
    }
}

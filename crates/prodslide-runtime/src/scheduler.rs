#![forbid(unsafe_code)]

//! Deterministic timer scheduler.
//!
//! Every delayed or repeating callback in the engine (autoplay, hover
//! settle, backend probe, dimension guard, resize and rebuild debounce) is
//! an entry in one [`Scheduler`]. The host drives time forward explicitly;
//! nothing here reads a wall clock, so identical event sequences yield
//! identical firing orders.
//!
//! # Ownership
//!
//! Scheduling returns a [`TimerHandle`]. The handle *is* the timer: dropping
//! it cancels the entry. A component that stores its handles in fields
//! therefore releases every timer it owns on every exit path, including
//! teardown and replacement (`self.autoplay = Some(new)` cancels the old
//! one first).
//!
//! # Invariants
//!
//! 1. Timers fire in `(due, id)` order; ties resolve by creation order.
//! 2. An interval is re-armed before it is reported, so the callback may
//!    cancel it by dropping its handle.
//! 3. A cancelled timer never fires, even when it was already due.
//! 4. `now` never moves backwards.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::carousel::CarouselId;

/// Identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// What a timer is for. Used to route a fired timer to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTag {
    /// Self-managed autoplay tick of one carousel.
    Autoplay(CarouselId),
    /// Hover-exit settle delay of one carousel.
    Settle(CarouselId),
    /// Backend availability probe.
    Probe,
    /// Page-level dimension guard.
    Guard,
    /// Resize quiet window elapsed.
    ResizeQuiet,
    /// Content-change rebuild delay elapsed.
    Rebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    Once,
    Every(Duration),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    tag: TimerTag,
    due: Duration,
    repeat: Repeat,
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub id: TimerId,
    pub tag: TimerTag,
    /// Scheduled firing time.
    pub at: Duration,
}

#[derive(Debug, Default)]
struct TimerQueue {
    now: Duration,
    next_id: u64,
    entries: BTreeMap<TimerId, Entry>,
}

impl TimerQueue {
    fn insert(&mut self, tag: TimerTag, delay: Duration, repeat: Repeat) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                tag,
                due: self.now.saturating_add(delay),
                repeat,
            },
        );
        id
    }

    fn earliest(&self) -> Option<(TimerId, Entry)> {
        self.entries
            .iter()
            .min_by_key(|(id, e)| (e.due, **id))
            .map(|(id, e)| (*id, *e))
    }
}

/// Shared handle to the page's timer queue.
///
/// Cloning is cheap; all clones observe the same queue and clock.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<TimerQueue>>,
}

impl Scheduler {
    /// Create a scheduler with its clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current monotonic time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Schedule a one-shot timer `delay` from now.
    #[must_use = "dropping the handle cancels the timer"]
    pub fn timeout(&self, delay: Duration, tag: TimerTag) -> TimerHandle {
        let id = self.inner.borrow_mut().insert(tag, delay, Repeat::Once);
        self.handle(id, tag)
    }

    /// Schedule a repeating timer with the given period. A zero period is
    /// raised to one millisecond so a single `advance` always terminates.
    #[must_use = "dropping the handle cancels the timer"]
    pub fn interval(&self, period: Duration, tag: TimerTag) -> TimerHandle {
        let period = period.max(Duration::from_millis(1));
        let id = self
            .inner
            .borrow_mut()
            .insert(tag, period, Repeat::Every(period));
        self.handle(id, tag)
    }

    fn handle(&self, id: TimerId, tag: TimerTag) -> TimerHandle {
        tracing::trace!(timer = %id, ?tag, "timer scheduled");
        TimerHandle {
            id,
            tag,
            queue: Rc::downgrade(&self.inner),
        }
    }

    /// Due time of the earliest pending timer.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.inner.borrow().earliest().map(|(_, e)| e.due)
    }

    /// Remove and report the earliest timer due at or before `until`,
    /// moving the clock to its due time. Intervals are re-armed.
    pub fn pop_due(&self, until: Duration) -> Option<Fired> {
        let mut q = self.inner.borrow_mut();
        let (id, entry) = q.earliest()?;
        if entry.due > until {
            return None;
        }
        q.now = q.now.max(entry.due);
        match entry.repeat {
            Repeat::Once => {
                q.entries.remove(&id);
            }
            Repeat::Every(period) => {
                if let Some(e) = q.entries.get_mut(&id) {
                    e.due = entry.due.saturating_add(period);
                }
            }
        }
        Some(Fired {
            id,
            tag: entry.tag,
            at: entry.due,
        })
    }

    /// Move the clock forward to `to` without firing anything.
    pub fn set_now(&self, to: Duration) {
        let mut q = self.inner.borrow_mut();
        q.now = q.now.max(to);
    }

    /// Number of live timers.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Number of live timers carrying `tag`.
    #[must_use]
    pub fn count_tagged(&self, tag: TimerTag) -> usize {
        self.inner
            .borrow()
            .entries
            .values()
            .filter(|e| e.tag == tag)
            .count()
    }

    fn is_live(&self, id: TimerId) -> bool {
        self.inner.borrow().entries.contains_key(&id)
    }
}

/// Owned timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    tag: TimerTag,
    queue: Weak<RefCell<TimerQueue>>,
}

impl TimerHandle {
    #[must_use]
    pub fn id(&self) -> TimerId {
        self.id
    }

    #[must_use]
    pub fn tag(&self) -> TimerTag {
        self.tag
    }

    /// Whether the timer is still scheduled (one-shots stop being live once
    /// they fire).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.queue
            .upgrade()
            .is_some_and(|q| q.borrow().entries.contains_key(&self.id))
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.upgrade() {
            if queue.borrow_mut().entries.remove(&self.id).is_some() {
                tracing::trace!(timer = %self.id, tag = ?self.tag, "timer cancelled");
            }
        }
    }
}

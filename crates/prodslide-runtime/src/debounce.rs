#![forbid(unsafe_code)]

//! Latest-wins debouncing for bursty page signals.
//!
//! Resize and content-change notifications arrive in bursts. A
//! [`Debounce`] keeps only the most recent value and one quiet-window
//! timer; every new signal cancels the pending timer before arming a fresh
//! one, so exactly one action follows a burst, carrying the final value.
//!
//! # Invariants
//!
//! - **Latest-wins**: the value delivered is the last one triggered.
//! - **One timer**: at most one pending timer per debouncer.
//! - **Quiet window**: the action fires `quiet` after the *last* signal.

use std::time::Duration;

use crate::scheduler::{Scheduler, TimerHandle, TimerId, TimerTag};

/// A latest-wins debouncer carrying a value of type `T`.
#[derive(Debug)]
pub struct Debounce<T> {
    quiet: Duration,
    tag: TimerTag,
    pending: Option<(TimerHandle, T)>,
    coalesced: u64,
}

impl<T> Debounce<T> {
    #[must_use]
    pub fn new(quiet: Duration, tag: TimerTag) -> Self {
        Self {
            quiet,
            tag,
            pending: None,
            coalesced: 0,
        }
    }

    /// Record a signal, replacing any pending one.
    pub fn trigger(&mut self, scheduler: &Scheduler, value: T) {
        if self.pending.take().is_some() {
            self.coalesced += 1;
        }
        let timer = scheduler.timeout(self.quiet, self.tag);
        self.pending = Some((timer, value));
    }

    /// Take the pending value if `id` is this debouncer's timer.
    pub fn fire(&mut self, id: TimerId) -> Option<T> {
        match &self.pending {
            Some((timer, _)) if timer.id() == id => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }

    /// Drop the pending signal, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Signals that were superseded before their window closed.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn burst_yields_final_value_once() {
        let s = Scheduler::new();
        let mut d = Debounce::new(ms(250), TimerTag::ResizeQuiet);
        for (t, w) in [(0, 100u32), (100, 200), (200, 300)] {
            s.set_now(ms(t));
            d.trigger(&s, w);
        }
        assert_eq!(s.active_count(), 1);
        assert_eq!(s.pop_due(ms(449)), None);
        let fired = s.pop_due(ms(450)).map(|f| f.id);
        assert_eq!(fired.and_then(|id| d.fire(id)), Some(300));
        assert!(!d.is_pending());
        assert_eq!(d.coalesced(), 2);
    }

    #[test]
    fn foreign_timer_is_ignored() {
        let s = Scheduler::new();
        let mut d = Debounce::new(ms(100), TimerTag::Rebuild);
        d.trigger(&s, ());
        let other = s.timeout(ms(10), TimerTag::Guard);
        assert_eq!(d.fire(other.id()), None);
        assert!(d.is_pending());
    }

    #[test]
    fn cancel_releases_timer() {
        let s = Scheduler::new();
        let mut d = Debounce::new(ms(100), TimerTag::Rebuild);
        d.trigger(&s, ());
        d.cancel();
        assert_eq!(s.active_count(), 0);
    }
}

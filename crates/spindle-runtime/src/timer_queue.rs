//! The expiry-ordered timer queue.
//!
//! Timers are kept ascending by expiry: the head is always the next
//! enabled timer to fire, or a disabled entry about to be reaped.
//! Removal is soft — [`Timer::disable`] flips the shared flag and the
//! worker drops disabled entries as its scans reach them — so cancelling
//! a timer never reshuffles the queue.

use spindle_event::Timer;
use spindle_types::MachineId;
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Default)]
pub(crate) struct TimerQueue {
    timers: VecDeque<Timer>,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts at the first position whose expiry is not earlier than the
    /// new timer's, keeping the queue ascending.
    pub(crate) fn insert(&mut self, timer: Timer) {
        let expiry = timer.expiry();
        let at = self
            .timers
            .iter()
            .position(|t| t.expiry() >= expiry)
            .unwrap_or(self.timers.len());
        self.timers.insert(at, timer);
    }

    fn reap_disabled(&mut self) {
        while self.timers.front().is_some_and(|t| !t.is_enabled()) {
            self.timers.pop_front();
        }
    }

    /// Expiry of the next enabled timer, if any.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        self.reap_disabled();
        self.timers.front().map(Timer::expiry)
    }

    /// Pops the head if it is due at `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<Timer> {
        self.reap_disabled();
        if self.timers.front().is_some_and(|t| t.expiry() <= now) {
            self.timers.pop_front()
        } else {
            None
        }
    }

    /// Soft-deletes every timer bound to `target`.
    pub(crate) fn disable_machine(&mut self, target: MachineId) {
        for timer in &self.timers {
            if timer.target() == Some(target) {
                timer.disable();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }
}

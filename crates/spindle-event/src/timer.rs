//! Timer events.
//!
//! A [`Timer`] wraps an [`Event`] with an absolute expiry instant, a refire
//! period, and a repeat counter. Like events, timers are shared handles:
//! the clone sitting in a processor's timer queue and the clone the
//! producer kept are the same timer, which is what makes soft-delete work —
//! [`Timer::disable`] flips a shared flag and the worker reaps the entry
//! when it reaches it, leaving the queue's ordering untouched.
//!
//! # Repeats
//!
//! | `repeats` | Behavior |
//! |-----------|----------|
//! | `0` | fires once, then the event is marked done |
//! | `n > 0` | fires `n + 1` times, decrementing per fire |
//! | [`REPEAT_FOREVER`] | refires until disabled or its machine terminates |
//!
//! The counter is only decremented while `repeats > 0` and not
//! [`REPEAT_FOREVER`]; an infinite timer's event is never marked done.

use crate::Event;
use parking_lot::Mutex;
use spindle_types::MachineId;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Repeat count meaning "refire forever".
pub const REPEAT_FOREVER: u32 = u32::MAX;

struct TimerCore {
    expiry: Instant,
    repeats: u32,
    target: Option<MachineId>,
}

struct TimerInner {
    event: Event,
    period: Duration,
    enabled: AtomicBool,
    core: Mutex<TimerCore>,
}

/// A shared timer handle.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    fn with_repeats<P: Any + Send + Sync>(payload: P, period: Duration, repeats: u32) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                event: Event::new(payload),
                period,
                enabled: AtomicBool::new(true),
                core: Mutex::new(TimerCore {
                    expiry: Instant::now() + period,
                    repeats,
                    target: None,
                }),
            }),
        }
    }

    /// A timer that fires once, `delay` from now.
    #[must_use]
    pub fn one_shot<P: Any + Send + Sync>(payload: P, delay: Duration) -> Self {
        Self::with_repeats(payload, delay, 0)
    }

    /// A timer that fires `repeats + 1` times, every `period`.
    #[must_use]
    pub fn repeating<P: Any + Send + Sync>(payload: P, period: Duration, repeats: u32) -> Self {
        Self::with_repeats(payload, period, repeats)
    }

    /// A timer that refires every `period` until disabled or its target
    /// machine terminates.
    #[must_use]
    pub fn forever<P: Any + Send + Sync>(payload: P, period: Duration) -> Self {
        Self::with_repeats(payload, period, REPEAT_FOREVER)
    }

    /// The event dispatched each time this timer fires.
    #[must_use]
    pub fn event(&self) -> &Event {
        &self.inner.event
    }

    /// The refire period (also the initial delay).
    #[must_use]
    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// The absolute instant of the next fire.
    #[must_use]
    pub fn expiry(&self) -> Instant {
        self.inner.core.lock().expiry
    }

    /// Remaining repeat count. See the module table for the meaning.
    #[must_use]
    pub fn repeats(&self) -> u32 {
        self.inner.core.lock().repeats
    }

    /// Whether this timer may still fire.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Soft-deletes the timer: it never fires again, and the hosting
    /// worker drops it from its queue when it next reaches it.
    pub fn disable(&self) {
        self.inner.enabled.store(false, Ordering::Release);
    }

    /// The machine this timer was bound to at `push_timer`, if any.
    #[must_use]
    pub fn target(&self) -> Option<MachineId> {
        self.inner.core.lock().target
    }

    /// Binds the timer to the machine it will be dispatched to.
    ///
    /// Host-facing: called by the processor when the timer is enqueued.
    pub fn bind(&self, target: MachineId) {
        self.inner.core.lock().target = Some(target);
    }

    /// Decrements the repeat counter.
    ///
    /// No-op when the counter is `0` or [`REPEAT_FOREVER`].
    pub fn decrement_repeats(&self) {
        let mut core = self.inner.core.lock();
        if core.repeats > 0 && core.repeats != REPEAT_FOREVER {
            core.repeats -= 1;
        }
    }

    /// Moves the expiry to one period from now, for a refire.
    ///
    /// Host-facing: refires schedule relative to the fire instant rather
    /// than the previous expiry, so a stalled worker does not replay a
    /// backlog of missed periods in a burst.
    pub fn reschedule(&self) {
        self.inner.core.lock().expiry = Instant::now() + self.inner.period;
    }

    /// Returns whether `other` is the same timer object.
    #[must_use]
    pub fn same_timer(&self, other: &Timer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("Timer")
            .field("period", &self.inner.period)
            .field("repeats", &core.repeats)
            .field("enabled", &self.is_enabled())
            .field("target", &core.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tick;

    #[test]
    fn one_shot_has_zero_repeats() {
        let t = Timer::one_shot(Tick, Duration::from_millis(10));
        assert_eq!(t.repeats(), 0);
        assert!(t.is_enabled());
    }

    #[test]
    fn forever_never_decrements() {
        let t = Timer::forever(Tick, Duration::from_millis(10));
        t.decrement_repeats();
        assert_eq!(t.repeats(), REPEAT_FOREVER);
    }

    #[test]
    fn zero_never_decrements() {
        let t = Timer::one_shot(Tick, Duration::from_millis(10));
        t.decrement_repeats();
        assert_eq!(t.repeats(), 0);
    }

    #[test]
    fn positive_decrements_per_fire() {
        let t = Timer::repeating(Tick, Duration::from_millis(10), 3);
        t.decrement_repeats();
        t.decrement_repeats();
        assert_eq!(t.repeats(), 1);
    }

    #[test]
    fn disable_is_visible_through_clones() {
        let t = Timer::one_shot(Tick, Duration::from_millis(10));
        let queued = t.clone();
        t.disable();
        assert!(!queued.is_enabled());
        assert!(t.same_timer(&queued));
    }

    #[test]
    fn bind_records_target() {
        let t = Timer::one_shot(Tick, Duration::from_millis(10));
        assert_eq!(t.target(), None);
        t.bind(MachineId::from_raw(3));
        assert_eq!(t.target(), Some(MachineId::from_raw(3)));
    }

    #[test]
    fn reschedule_moves_expiry_forward() {
        let t = Timer::repeating(Tick, Duration::from_millis(50), 1);
        let first = t.expiry();
        t.reschedule();
        assert!(t.expiry() >= first);
    }
}

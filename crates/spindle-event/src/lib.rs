//! Event value types for the Spindle state-machine runtime.
//!
//! Everything a producer hands to a processor flows through the types in
//! this crate:
//!
//! ```text
//! producer thread                     worker thread
//! ───────────────                     ─────────────
//! Event::new(Ping)  ──push_event──►   dispatch to machine
//! event.wait()      ◄──done()─────    mark complete
//!
//! Timer::one_shot(Tick, 30ms) ──push_timer──►  timer queue (by expiry)
//! timer.disable()                              soft-delete, reaped on scan
//! ```
//!
//! # Shared handles
//!
//! [`Event`] and [`Timer`] are `Arc`-backed handles. Cloning is cheap and
//! preserves identity: the producer-side clone and the queued clone
//! observe the same completion latch and the same enabled flag. Object
//! identity (not payload equality) is what the processor's
//! consecutive-duplicate rule and `contains` checks compare.
//!
//! # Completion protocol
//!
//! The worker marks each normally dispatched event [`Event::done`] exactly
//! once; any thread may [`Event::wait`] for that. Timer events complete
//! only when their repeats are exhausted — an infinite timer's event is
//! never marked done. Terminate envelopes are internal to the runtime and
//! are not completion-tracked.

mod completion;
mod event;
mod timer;

pub use completion::Completion;
pub use event::{Admitted, Event, EventKey};
pub use timer::{Timer, REPEAT_FOREVER};

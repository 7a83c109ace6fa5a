//! The event envelope dispatched to hosted state machines.
//!
//! An [`Event`] is a cheaply clonable handle: all clones share one payload
//! and one [`Completion`]. The clone that sits in a processor queue and the
//! clone the producer kept are *the same event* — `done()` on the worker
//! side wakes `wait()` on the producer side, and the processor's
//! consecutive-duplicate rule compares object identity, not payload
//! equality.
//!
//! # Dispatch keys
//!
//! Machines key their transition tables by the payload's concrete type.
//! [`EventKey`] is that key: a wrapper over [`TypeId`]. Two events carry
//! the same key iff their payloads have the same type.
//!
//! ```
//! use spindle_event::{Event, EventKey};
//!
//! struct Ping;
//! struct Pong;
//!
//! let ev = Event::new(Ping);
//! assert_eq!(ev.key(), EventKey::of::<Ping>());
//! assert_ne!(ev.key(), EventKey::of::<Pong>());
//! assert!(ev.payload::<Ping>().is_some());
//! assert!(ev.payload::<Pong>().is_none());
//! ```

use crate::Completion;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Dispatch key of an event: the concrete type of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey(TypeId);

impl EventKey {
    /// Returns the key events with payload type `P` carry.
    #[must_use]
    pub fn of<P: Any>() -> Self {
        Self(TypeId::of::<P>())
    }
}

/// Payload of the admission event a processor synthesizes when a machine
/// is admitted; state-entry handlers fired by `EnterFirstState` receive an
/// event carrying this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted;

struct EventInner {
    payload: Box<dyn Any + Send + Sync>,
    completion: Completion,
}

/// A shared event envelope: opaque payload plus completion latch.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// Wraps `payload` in a new pending event.
    #[must_use]
    pub fn new<P: Any + Send + Sync>(payload: P) -> Self {
        Self {
            inner: Arc::new(EventInner {
                payload: Box::new(payload),
                completion: Completion::new(),
            }),
        }
    }

    /// Returns the dispatch key (payload type) of this event.
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey(self.inner.payload.as_ref().type_id())
    }

    /// Downcasts the payload to `P`.
    #[must_use]
    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.inner.payload.downcast_ref::<P>()
    }

    /// Returns whether `other` is the same event object (shares this
    /// event's payload and completion), as opposed to an equal-looking
    /// separate event.
    #[must_use]
    pub fn same_event(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Marks the event done and wakes all waiters. Idempotent.
    ///
    /// Called by the dispatching worker exactly once per normally
    /// dispatched event; producers normally have no reason to call it.
    pub fn done(&self) {
        self.inner.completion.done();
    }

    /// Returns whether dispatch has completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.completion.is_done()
    }

    /// Blocks until the event has been dispatched and marked done.
    pub fn wait(&self) {
        self.inner.completion.wait();
    }

    /// Blocks until the event is done or `timeout` elapses; returns
    /// whether it was done.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.inner.completion.wait_for(timeout)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("done", &self.is_done())
            .finish_non_exhaustive()
    }
}

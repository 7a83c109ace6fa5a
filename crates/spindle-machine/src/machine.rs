//! The machine author trait and the mailbox back-reference.
//!
//! # Authoring a machine
//!
//! A machine is a plain struct holding its state variable and a
//! [`Mailbox`], plus a [`StateMachine`] impl whose `configure` declares the
//! dispatch table:
//!
//! ```
//! use spindle_event::Event;
//! use spindle_machine::{state_set, Mailbox, StateMachine, TableBuilder};
//!
//! struct Ping;
//!
//! state_set! {
//!     pub enum Link { Down, Up }
//! }
//!
//! struct LinkMonitor {
//!     state: Link,
//!     mailbox: Mailbox,
//!     pings: u32,
//! }
//!
//! impl StateMachine for LinkMonitor {
//!     type State = Link;
//!
//!     fn name(&self) -> &str {
//!         "link-monitor"
//!     }
//!
//!     fn state(&self) -> Link {
//!         self.state
//!     }
//!
//!     fn mailbox(&self) -> &Mailbox {
//!         &self.mailbox
//!     }
//!
//!     fn configure(table: &mut TableBuilder<Self>) {
//!         table.on::<Ping>(Link::Down, |m, _| {
//!             m.pings += 1;
//!             m.state = Link::Up;
//!         });
//!         table.entry(Link::Up, |m, _event, _prev| {
//!             m.pings += 1;
//!         });
//!     }
//! }
//! ```
//!
//! Transition handlers mutate the state variable directly; the dispatch
//! layer observes the change and runs the new state's entry handler.
//! Entry and exit handlers must **not** mutate the state variable — doing
//! so is asserted fatal.
//!
//! # The mailbox
//!
//! The mailbox is the machine's back-reference to whatever host it is
//! admitted to, held weakly: the host owns the machine, never the other
//! way around. It exists so handlers can post follow-up events and timers
//! to their own machine without carrying a processor reference around.

use crate::{StateSet, TableBuilder};
use parking_lot::Mutex;
use spindle_event::{Event, Timer};
use spindle_types::MachineId;
use std::fmt;
use std::sync::Weak;

/// Host-side operations a mailbox forwards to.
///
/// Implemented by the processor; machine authors never implement this.
pub trait Host: Send + Sync {
    /// Enqueues an event for the given machine. Returns `false` if the
    /// host is no longer accepting work.
    fn post_event(&self, target: MachineId, event: Event) -> bool;

    /// Enqueues a timer for the given machine.
    fn post_timer(&self, target: MachineId, timer: Timer) -> bool;

    /// Requests termination of the given machine.
    fn post_terminate(&self, target: MachineId) -> bool;
}

struct Binding {
    id: MachineId,
    host: Weak<dyn Host>,
}

/// A machine's back-reference to its host.
///
/// Unbound until the machine is admitted to a processor; unbound again
/// when it is removed. Every post on an unbound mailbox (or one whose host
/// has shut down) returns `false` — "not admitted", never an error.
#[derive(Default)]
pub struct Mailbox {
    binding: Mutex<Option<Binding>>,
}

impl Mailbox {
    /// Creates an unbound mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The id assigned by the host, if currently admitted.
    #[must_use]
    pub fn id(&self) -> Option<MachineId> {
        self.binding.lock().as_ref().map(|b| b.id)
    }

    /// Whether the machine is currently admitted to a host.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.lock().is_some()
    }

    /// Binds this mailbox to a host. Called by the processor at spawn.
    pub fn bind(&self, id: MachineId, host: Weak<dyn Host>) {
        *self.binding.lock() = Some(Binding { id, host });
    }

    /// Severs the binding. Called by the processor at removal.
    pub fn unbind(&self) {
        *self.binding.lock() = None;
    }

    fn with_host(&self, f: impl FnOnce(MachineId, &dyn Host) -> bool) -> bool {
        let binding = self.binding.lock();
        match binding.as_ref().and_then(|b| Some((b.id, b.host.upgrade()?))) {
            Some((id, host)) => f(id, host.as_ref()),
            None => false,
        }
    }

    /// Posts an event to this machine.
    ///
    /// Returns `false` when the machine is not admitted anywhere.
    pub fn push_event(&self, event: Event) -> bool {
        self.with_host(|id, host| host.post_event(id, event))
    }

    /// Schedules a timer targeting this machine.
    pub fn push_timer(&self, timer: Timer) -> bool {
        self.with_host(|id, host| host.post_timer(id, timer))
    }

    /// Requests termination of this machine.
    pub fn terminate(&self) -> bool {
        self.with_host(|id, host| host.post_terminate(id))
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").field("id", &self.id()).finish()
    }
}

/// A table-driven state machine.
///
/// The dispatch table declared by `configure` is built once per concrete
/// type, on first spawn, and shared by every instance of that type; it
/// must therefore depend only on the type, not on instance data.
///
/// # Lifecycle hooks
///
/// | Hook | When |
/// |------|------|
/// | `on_entry` | once, when the machine is admitted to a processor |
/// | state entry handlers | after every transition into the state, and once for the initial state right after `on_entry` |
/// | `on_exit` | once, when the machine is removed |
/// | `on_event_default` | an event matched no transition, no fallback, and no any-state handler |
pub trait StateMachine: Send + 'static {
    /// The machine's state enum, or `()` for an event-only machine.
    type State: StateSet;

    /// Display name for diagnostics.
    fn name(&self) -> &str;

    /// Current value of the state variable.
    fn state(&self) -> Self::State;

    /// The machine's host back-reference.
    fn mailbox(&self) -> &Mailbox;

    /// Declares the dispatch table for this machine type.
    fn configure(table: &mut TableBuilder<Self>)
    where
        Self: Sized;

    /// Runs when the machine is admitted, before the initial state's entry
    /// handler.
    fn on_entry(&mut self) {}

    /// Runs when the machine is removed from its host.
    fn on_exit(&mut self) {}

    /// Runs for events nothing else handled. Default: log and drop.
    fn on_event_default(&mut self, event: &Event) {
        let _ = event;
        tracing::warn!(
            "{}: event not handled (state {:?}), dropping",
            self.name(),
            self.state()
        );
    }
}

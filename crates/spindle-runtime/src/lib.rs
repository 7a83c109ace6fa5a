//! Spindle runtime — the multi-machine processor.
//!
//! This crate is the hosting layer of the workspace:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SDK layer                              │
//! │  spindle-types    : MachineId, ErrorCode                    │
//! │  spindle-event    : Event, Timer, Completion                │
//! │  spindle-machine  : StateMachine trait, DispatchTable       │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Runtime layer (THIS CRATE)                  │
//! │  Processor     : worker thread, FIFO job queue,             │
//! │                  expiry-ordered timer queue, pause gate     │
//! │  MachineHandle : id + weak link for posting from anywhere   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Processor`] owns one worker thread and any number of admitted
//! machines. Producers on any thread push events and timers; the worker
//! serializes all machine code, merges the timer queue into its wait, and
//! completes each dispatched event so producers can
//! [`wait`](spindle_event::Event::wait) on it. Machines on different
//! processors run in parallel; machines on one processor never do.
//!
//! # Example
//!
//! ```
//! use spindle_event::Event;
//! use spindle_machine::{Mailbox, StateMachine, TableBuilder};
//! use spindle_runtime::Processor;
//!
//! struct Ping;
//!
//! struct Echo {
//!     mailbox: Mailbox,
//! }
//!
//! impl StateMachine for Echo {
//!     type State = ();
//!
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn state(&self) {}
//!
//!     fn mailbox(&self) -> &Mailbox {
//!         &self.mailbox
//!     }
//!
//!     fn configure(table: &mut TableBuilder<Self>) {
//!         table.when::<Ping>(|_m, _ping| {});
//!     }
//! }
//!
//! let processor = Processor::new("example").unwrap();
//! let echo = processor
//!     .spawn(Echo { mailbox: Mailbox::new() })
//!     .unwrap();
//!
//! let ping = Event::new(Ping);
//! assert!(processor.push_event(ping.clone(), &echo));
//! ping.wait();
//!
//! processor.join().unwrap();
//! ```

mod error;
mod hosted;
mod job;
mod processor;
mod timer_queue;

pub use error::ProcessorError;
pub use processor::{MachineHandle, Processor};

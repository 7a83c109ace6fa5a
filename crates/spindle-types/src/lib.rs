//! Foundation types for the Spindle state-machine runtime.
//!
//! This crate is the bottom layer of the workspace:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  spindle-types    : MachineId, ErrorCode   ◄── HERE    │
//! │  spindle-event    : Event, Timer, Completion           │
//! │  spindle-machine  : StateMachine trait, DispatchTable  │
//! │  spindle-def      : Definition model + runner          │
//! ├────────────────────────────────────────────────────────┤
//! │  spindle-runtime  : Processor (worker, queues, timers) │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! It carries only what every other crate needs: the machine identifier
//! handle and the unified [`ErrorCode`] convention.

mod error;
mod id;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::MachineId;

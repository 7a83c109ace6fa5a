//! FIFO job classification.
//!
//! Everything the worker consumes from the job queue is one of these:
//! machine admissions, events bound to a target machine, and the three
//! terminate envelopes. Timers live in their own expiry-ordered queue and
//! never pass through the FIFO.

use crate::hosted::AnyMachine;
use spindle_event::Event;
use spindle_types::MachineId;

pub(crate) enum Job {
    /// Admit a machine: register, `on_entry`, enter the first state.
    Admit(Box<dyn AnyMachine>),
    /// Dispatch an event to one machine.
    Event { target: MachineId, event: Event },
    /// Remove one machine (exit hook, disable its timers, unbind).
    TerminateMachine(MachineId),
    /// Remove every machine and stop the worker.
    TerminateAll,
    /// Remove every machine and stop the worker (engine disposal).
    TerminateEngine,
}

impl Job {
    /// Short tag for diagnostics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Admit(_) => "admit",
            Self::Event { .. } => "event",
            Self::TerminateMachine(_) => "terminate-machine",
            Self::TerminateAll => "terminate-all",
            Self::TerminateEngine => "terminate-engine",
        }
    }
}

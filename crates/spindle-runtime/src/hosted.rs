//! Type erasure for hosted machines.
//!
//! The processor's registry holds machines of many concrete types.
//! [`Hosted`] pairs one machine with its shared dispatch table and
//! [`AnyMachine`] erases the pair down to the handful of operations the
//! worker loop needs.

use spindle_event::Event;
use spindle_machine::{DispatchTable, StateMachine};
use spindle_types::MachineId;
use std::sync::Arc;

pub(crate) trait AnyMachine: Send {
    fn id(&self) -> MachineId;
    fn name(&self) -> &str;
    fn on_entry(&mut self);
    fn on_exit(&mut self);
    fn enter_first_state(&mut self, event: &Event);
    fn handle(&mut self, event: &Event);
    fn unbind(&self);
}

pub(crate) struct Hosted<M: StateMachine> {
    id: MachineId,
    machine: M,
    table: Arc<DispatchTable<M>>,
}

impl<M: StateMachine> Hosted<M> {
    pub(crate) fn new(id: MachineId, machine: M, table: Arc<DispatchTable<M>>) -> Self {
        Self { id, machine, table }
    }
}

impl<M: StateMachine> AnyMachine for Hosted<M> {
    fn id(&self) -> MachineId {
        self.id
    }

    fn name(&self) -> &str {
        self.machine.name()
    }

    fn on_entry(&mut self) {
        self.machine.on_entry();
    }

    fn on_exit(&mut self) {
        self.machine.on_exit();
    }

    fn enter_first_state(&mut self, event: &Event) {
        self.table.enter_first_state(&mut self.machine, event);
    }

    fn handle(&mut self, event: &Event) {
        self.table.dispatch(&mut self.machine, event);
    }

    fn unbind(&self) {
        self.machine.mailbox().unbind();
    }
}

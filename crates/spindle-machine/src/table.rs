//! Per-type dispatch tables.
//!
//! A [`DispatchTable`] is the compiled form of a machine type's handler
//! declarations: per state, an optional entry handler, an optional exit
//! handler, an optional fallback (default-transition) handler, and a map
//! of transition handlers keyed by event type; plus a class-level map of
//! any-state handlers. Tables are built through [`TableBuilder`] inside
//! [`StateMachine::configure`](crate::StateMachine::configure) and are
//! immutable afterwards.
//!
//! # Dispatch order
//!
//! For a stateful machine in state `s1` receiving an event keyed `E`:
//!
//! 1. `s1`'s transition handler for `E`, if declared: run `s1`'s exit
//!    handler, run the transition (which may reassign the state variable),
//!    then run the entry handler of whatever state the machine is now in,
//!    passing `s1` as the previous state — including when the transition
//!    looped back to `s1`.
//! 2. Otherwise `s1`'s fallback handler, if declared.
//! 3. Otherwise the class-level any-state handler for `E`, if declared.
//! 4. Otherwise
//!    [`on_event_default`](crate::StateMachine::on_event_default).
//!
//! Event-only machines skip straight to steps 3–4.
//!
//! Entry and exit handlers reassigning the state variable is a bug in the
//! machine, detected here and fatal.

use crate::{StateMachine, StateSet};
use spindle_event::{Event, EventKey};
use spindle_types::ErrorCode;
use std::any::{type_name, Any};
use std::collections::HashMap;
use thiserror::Error;

type EventHandler<M> = Box<dyn Fn(&mut M, &Event) + Send + Sync>;
type EntryHandler<M> = Box<dyn Fn(&mut M, &Event, <M as StateMachine>::State) + Send + Sync>;

/// Table construction error. All variants are fatal: the machine type
/// cannot be spawned until its `configure` is fixed.
#[derive(Debug, Clone, Error)]
pub enum TableError {
    /// Two transition handlers declared for the same (state, event) pair.
    #[error("duplicate transition handler for ({state}, {event})")]
    DuplicateTransition {
        /// State the duplicate was declared on.
        state: &'static str,
        /// Event type of the duplicate.
        event: &'static str,
    },

    /// Two entry handlers declared for one state.
    #[error("duplicate entry handler for state {state}")]
    DuplicateEntry {
        /// State the duplicate was declared on.
        state: &'static str,
    },

    /// Two exit handlers declared for one state.
    #[error("duplicate exit handler for state {state}")]
    DuplicateExit {
        /// State the duplicate was declared on.
        state: &'static str,
    },

    /// Two fallback handlers declared for one state.
    #[error("duplicate fallback handler for state {state}")]
    DuplicateFallback {
        /// State the duplicate was declared on.
        state: &'static str,
    },

    /// Two any-state handlers declared for one event type.
    #[error("duplicate any-state handler for event {event}")]
    DuplicateAnyState {
        /// Event type of the duplicate.
        event: &'static str,
    },

    /// A state-keyed handler declared on an event-only machine.
    #[error("machine {machine} has no states; only any-state handlers may be declared")]
    StatelessStateHandler {
        /// The offending machine type.
        machine: &'static str,
    },
}

impl ErrorCode for TableError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateTransition { .. } => "TABLE_DUPLICATE_TRANSITION",
            Self::DuplicateEntry { .. } => "TABLE_DUPLICATE_ENTRY",
            Self::DuplicateExit { .. } => "TABLE_DUPLICATE_EXIT",
            Self::DuplicateFallback { .. } => "TABLE_DUPLICATE_FALLBACK",
            Self::DuplicateAnyState { .. } => "TABLE_DUPLICATE_ANY_STATE",
            Self::StatelessStateHandler { .. } => "TABLE_STATELESS_STATE_HANDLER",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

struct StateSlot<M: StateMachine> {
    entry: Option<EntryHandler<M>>,
    exit: Option<EventHandler<M>>,
    fallback: Option<EventHandler<M>>,
    transitions: HashMap<EventKey, EventHandler<M>>,
}

impl<M: StateMachine> Default for StateSlot<M> {
    fn default() -> Self {
        Self {
            entry: None,
            exit: None,
            fallback: None,
            transitions: HashMap::new(),
        }
    }
}

/// Registration surface passed to
/// [`StateMachine::configure`](crate::StateMachine::configure).
///
/// Each (state, event) slot accepts at most one handler; a second
/// registration poisons the builder and surfaces as a [`TableError`] when
/// the machine type is first spawned.
pub struct TableBuilder<M: StateMachine> {
    states: Vec<StateSlot<M>>,
    any_state: HashMap<EventKey, EventHandler<M>>,
    error: Option<TableError>,
}

impl<M: StateMachine> TableBuilder<M> {
    pub(crate) fn new() -> Self {
        Self {
            states: (0..M::State::COUNT).map(|_| StateSlot::default()).collect(),
            any_state: HashMap::new(),
            error: None,
        }
    }

    fn record(&mut self, error: TableError) {
        self.error.get_or_insert(error);
    }

    fn stateful(&mut self) -> bool {
        if M::State::COUNT == 0 {
            self.record(TableError::StatelessStateHandler {
                machine: type_name::<M>(),
            });
            return false;
        }
        true
    }

    /// Declares a transition handler: in `state`, an event carrying a
    /// payload of type `E` runs `handler`. The handler may reassign the
    /// state variable to move the machine.
    pub fn on<E>(&mut self, state: M::State, handler: impl Fn(&mut M, &E) + Send + Sync + 'static) -> &mut Self
    where
        E: Any,
    {
        if self.stateful() {
            let key = EventKey::of::<E>();
            let slot = &mut self.states[state.index()];
            if slot.transitions.contains_key(&key) {
                self.record(TableError::DuplicateTransition {
                    state: state.name(),
                    event: type_name::<E>(),
                });
            } else {
                slot.transitions.insert(key, wrap_typed(handler));
            }
        }
        self
    }

    /// Declares `state`'s fallback handler, run for any event that has no
    /// transition handler in `state`.
    pub fn fallback<F>(&mut self, state: M::State, handler: F) -> &mut Self
    where
        F: Fn(&mut M, &Event) + Send + Sync + 'static,
    {
        if self.stateful() {
            let slot = &mut self.states[state.index()];
            if slot.fallback.is_some() {
                self.record(TableError::DuplicateFallback { state: state.name() });
            } else {
                slot.fallback = Some(Box::new(handler));
            }
        }
        self
    }

    /// Declares `state`'s entry handler. Receives the event that caused
    /// the transition and the previous state. Must not reassign the state
    /// variable.
    pub fn entry<F>(&mut self, state: M::State, handler: F) -> &mut Self
    where
        F: Fn(&mut M, &Event, M::State) + Send + Sync + 'static,
    {
        if self.stateful() {
            let slot = &mut self.states[state.index()];
            if slot.entry.is_some() {
                self.record(TableError::DuplicateEntry { state: state.name() });
            } else {
                slot.entry = Some(Box::new(handler));
            }
        }
        self
    }

    /// Declares `state`'s exit handler. Must not reassign the state
    /// variable.
    pub fn exit<F>(&mut self, state: M::State, handler: F) -> &mut Self
    where
        F: Fn(&mut M, &Event) + Send + Sync + 'static,
    {
        if self.stateful() {
            let slot = &mut self.states[state.index()];
            if slot.exit.is_some() {
                self.record(TableError::DuplicateExit { state: state.name() });
            } else {
                slot.exit = Some(Box::new(handler));
            }
        }
        self
    }

    /// Declares a class-level handler for events of type `E`, run in any
    /// state when no per-state transition matched. This is the only
    /// registration kind valid on event-only machines.
    pub fn when<E>(&mut self, handler: impl Fn(&mut M, &E) + Send + Sync + 'static) -> &mut Self
    where
        E: Any,
    {
        let key = EventKey::of::<E>();
        if self.any_state.contains_key(&key) {
            self.record(TableError::DuplicateAnyState {
                event: type_name::<E>(),
            });
        } else {
            self.any_state.insert(key, wrap_typed(handler));
        }
        self
    }

    pub(crate) fn finish(self) -> Result<DispatchTable<M>, TableError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(DispatchTable {
                states: self.states,
                any_state: self.any_state,
            }),
        }
    }
}

fn wrap_typed<M, E, F>(handler: F) -> EventHandler<M>
where
    M: StateMachine,
    E: Any,
    F: Fn(&mut M, &E) + Send + Sync + 'static,
{
    Box::new(move |machine, event| {
        // Keyed by the payload's TypeId, so the downcast always succeeds.
        if let Some(payload) = event.payload::<E>() {
            handler(machine, payload);
        }
    })
}

/// Compiled dispatch table for one machine type.
///
/// Built once per type on first spawn and shared by every instance; see
/// [`table_for`](crate::table_for).
pub struct DispatchTable<M: StateMachine> {
    states: Vec<StateSlot<M>>,
    any_state: HashMap<EventKey, EventHandler<M>>,
}

impl<M: StateMachine> DispatchTable<M> {
    /// Dispatches one event to `machine` following the module-level order.
    pub fn dispatch(&self, machine: &mut M, event: &Event) {
        if M::State::COUNT == 0 {
            match self.any_state.get(&event.key()) {
                Some(handler) => handler(machine, event),
                None => machine.on_event_default(event),
            }
            return;
        }

        let from = machine.state();
        let slot = &self.states[from.index()];
        if let Some(transition) = slot.transitions.get(&event.key()) {
            if let Some(exit) = &slot.exit {
                exit(machine, event);
                self.assert_state_frozen(machine, from, "exit");
            }
            transition(machine, event);
            let to = machine.state();
            if from != to {
                tracing::debug!(
                    "{}: {} -> {}",
                    machine.name(),
                    from.name(),
                    to.name()
                );
            }
            if let Some(entry) = &self.states[to.index()].entry {
                entry(machine, event, from);
                self.assert_state_frozen(machine, to, "entry");
            }
        } else if let Some(fallback) = &slot.fallback {
            fallback(machine, event);
        } else if let Some(handler) = self.any_state.get(&event.key()) {
            handler(machine, event);
        } else {
            machine.on_event_default(event);
        }
    }

    /// Runs the entry handler for the machine's initial state, with the
    /// previous state equal to the initial state. Called by the host right
    /// after admission; a no-op for event-only machines.
    pub fn enter_first_state(&self, machine: &mut M, event: &Event) {
        if M::State::COUNT == 0 {
            return;
        }
        let first = machine.state();
        if let Some(entry) = &self.states[first.index()].entry {
            entry(machine, event, first);
            self.assert_state_frozen(machine, first, "entry");
        }
    }

    fn assert_state_frozen(&self, machine: &M, expected: M::State, role: &str) {
        let now = machine.state();
        if now != expected {
            tracing::error!(
                "{}: {} handler for {} reassigned the state variable to {}",
                machine.name(),
                role,
                expected.name(),
                now.name()
            );
            panic!("{role} handlers must not reassign the state variable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{state_set, Mailbox};
    use spindle_types::assert_error_codes;

    struct Go;
    struct Halt;
    struct Nudge;

    state_set! {
        enum Motor { Stopped, Running }
    }

    struct MotorMachine {
        state: Motor,
        mailbox: Mailbox,
        log: Vec<String>,
    }

    impl MotorMachine {
        fn new() -> Self {
            Self {
                state: Motor::Stopped,
                mailbox: Mailbox::new(),
                log: Vec::new(),
            }
        }
    }

    impl StateMachine for MotorMachine {
        type State = Motor;

        fn name(&self) -> &str {
            "motor"
        }

        fn state(&self) -> Motor {
            self.state
        }

        fn mailbox(&self) -> &Mailbox {
            &self.mailbox
        }

        fn configure(table: &mut TableBuilder<Self>) {
            table.on::<Go>(Motor::Stopped, |m, _| {
                m.log.push("go".into());
                m.state = Motor::Running;
            });
            table.on::<Halt>(Motor::Running, |m, _| {
                m.log.push("halt".into());
                m.state = Motor::Stopped;
            });
            table.on::<Nudge>(Motor::Running, |m, _| {
                m.log.push("nudge".into());
            });
            table.entry(Motor::Running, |m, _event, prev| {
                m.log.push(format!("enter-running from {}", prev.name()));
            });
            table.exit(Motor::Running, |m, _event| {
                m.log.push("exit-running".into());
            });
            table.fallback(Motor::Stopped, |m, _event| {
                m.log.push("stopped-fallback".into());
            });
        }
    }

    fn table() -> DispatchTable<MotorMachine> {
        let mut builder = TableBuilder::new();
        MotorMachine::configure(&mut builder);
        builder.finish().unwrap()
    }

    #[test]
    fn transition_runs_exit_action_entry_in_order() {
        let table = table();
        let mut m = MotorMachine::new();

        table.dispatch(&mut m, &Event::new(Go));
        assert_eq!(m.state, Motor::Running);
        assert_eq!(m.log, vec!["go", "enter-running from Stopped"]);

        m.log.clear();
        table.dispatch(&mut m, &Event::new(Halt));
        assert_eq!(m.state, Motor::Stopped);
        assert_eq!(m.log, vec!["exit-running", "halt"]);
    }

    #[test]
    fn self_loop_reruns_entry_with_same_prev() {
        let table = table();
        let mut m = MotorMachine::new();
        m.state = Motor::Running;

        table.dispatch(&mut m, &Event::new(Nudge));
        assert_eq!(m.state, Motor::Running);
        assert_eq!(
            m.log,
            vec!["exit-running", "nudge", "enter-running from Running"]
        );
    }

    #[test]
    fn fallback_catches_unmatched_events() {
        let table = table();
        let mut m = MotorMachine::new();

        table.dispatch(&mut m, &Event::new(Halt));
        assert_eq!(m.log, vec!["stopped-fallback"]);
        assert_eq!(m.state, Motor::Stopped);
    }

    #[test]
    fn unmatched_event_without_fallback_is_dropped() {
        let table = table();
        let mut m = MotorMachine::new();
        m.state = Motor::Running;

        table.dispatch(&mut m, &Event::new(Go));
        assert!(m.log.is_empty());
        assert_eq!(m.state, Motor::Running);
    }

    #[test]
    fn enter_first_state_uses_current_state() {
        let table = table();
        let mut m = MotorMachine::new();
        m.state = Motor::Running;

        table.enter_first_state(&mut m, &Event::new(spindle_event::Admitted));
        assert_eq!(m.log, vec!["enter-running from Running"]);
    }

    struct RogueEntry {
        state: Motor,
        mailbox: Mailbox,
    }

    impl StateMachine for RogueEntry {
        type State = Motor;

        fn name(&self) -> &str {
            "rogue"
        }

        fn state(&self) -> Motor {
            self.state
        }

        fn mailbox(&self) -> &Mailbox {
            &self.mailbox
        }

        fn configure(table: &mut TableBuilder<Self>) {
            table.on::<Go>(Motor::Stopped, |m, _| m.state = Motor::Running);
            table.entry(Motor::Running, |m, _event, _prev| {
                m.state = Motor::Stopped;
            });
        }
    }

    #[test]
    #[should_panic(expected = "must not reassign the state variable")]
    fn entry_mutating_state_is_fatal() {
        let mut builder = TableBuilder::new();
        RogueEntry::configure(&mut builder);
        let table = builder.finish().unwrap();
        let mut m = RogueEntry {
            state: Motor::Stopped,
            mailbox: Mailbox::new(),
        };
        table.dispatch(&mut m, &Event::new(Go));
    }

    struct Doubled {
        state: Motor,
        mailbox: Mailbox,
    }

    impl StateMachine for Doubled {
        type State = Motor;

        fn name(&self) -> &str {
            "doubled"
        }

        fn state(&self) -> Motor {
            self.state
        }

        fn mailbox(&self) -> &Mailbox {
            &self.mailbox
        }

        fn configure(table: &mut TableBuilder<Self>) {
            table.on::<Go>(Motor::Stopped, |_, _| {});
            table.on::<Go>(Motor::Stopped, |_, _| {});
        }
    }

    #[test]
    fn duplicate_transition_is_a_construction_error() {
        let mut builder = TableBuilder::new();
        Doubled::configure(&mut builder);
        let err = builder.finish().err().unwrap();
        assert_eq!(err.code(), "TABLE_DUPLICATE_TRANSITION");
    }

    struct EventOnly {
        mailbox: Mailbox,
        seen: usize,
    }

    impl StateMachine for EventOnly {
        type State = ();

        fn name(&self) -> &str {
            "event-only"
        }

        fn state(&self) {}

        fn mailbox(&self) -> &Mailbox {
            &self.mailbox
        }

        fn configure(table: &mut TableBuilder<Self>) {
            table.when::<Go>(|m, _| m.seen += 1);
        }
    }

    #[test]
    fn stateless_machine_dispatches_any_state_handlers() {
        let mut builder = TableBuilder::new();
        EventOnly::configure(&mut builder);
        let table = builder.finish().unwrap();
        let mut m = EventOnly {
            mailbox: Mailbox::new(),
            seen: 0,
        };

        table.dispatch(&mut m, &Event::new(Go));
        table.dispatch(&mut m, &Event::new(Halt)); // unhandled: logged, dropped
        assert_eq!(m.seen, 1);
    }

    struct StatelessMisuse {
        mailbox: Mailbox,
    }

    impl StateMachine for StatelessMisuse {
        type State = ();

        fn name(&self) -> &str {
            "misuse"
        }

        fn state(&self) {}

        fn mailbox(&self) -> &Mailbox {
            &self.mailbox
        }

        fn configure(table: &mut TableBuilder<Self>) {
            table.fallback((), |_, _| {});
        }
    }

    #[test]
    fn state_handler_on_stateless_machine_is_an_error() {
        let mut builder = TableBuilder::new();
        StatelessMisuse::configure(&mut builder);
        let err = builder.finish().err().unwrap();
        assert_eq!(err.code(), "TABLE_STATELESS_STATE_HANDLER");
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                TableError::DuplicateTransition {
                    state: "A",
                    event: "E",
                },
                TableError::DuplicateEntry { state: "A" },
                TableError::DuplicateExit { state: "A" },
                TableError::DuplicateFallback { state: "A" },
                TableError::DuplicateAnyState { event: "E" },
                TableError::StatelessStateHandler { machine: "M" },
            ],
            "TABLE_",
        );
    }
}

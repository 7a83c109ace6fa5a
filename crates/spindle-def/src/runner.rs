//! The definition runner: one worker thread driving one machine built
//! from a [`Definition`].
//!
//! # Construction
//!
//! [`DefinitionRunner::spawn`] validates the definition, binds every
//! name it mentions against the [`OperationMap`] — transition actions by
//! their declared name (unknown names are fatal), state entry and exit by
//! the `"<StateName>StateEntry"` / `"<StateName>StateExit"` conventions
//! (absent means none) — compiles per-state dispatch vectors sized to
//! each state's largest event id, installs any-state events as self-loops
//! wherever the state does not already handle the id, and launches the
//! worker. The first state's entry operation is *not* run at startup.
//!
//! # Event loop
//!
//! The worker block-pops one event id at a time. A popped event is driven
//! to quiescence before the queue is looked at again:
//!
//! - a matching transition consumes the event;
//! - otherwise the state's default transition (id 0) runs and the event
//!   is retried in the new state — a default that does not change the
//!   state ends the chain instead of spinning;
//! - otherwise the event is dropped.
//!
//! After a consuming transition, default transitions keep chaining under
//! the same no-movement rule.
//!
//! Each transition runs exit(current) → action → state assignment →
//! `StateChanged` observers → entry(new), in that order.

use crate::model::{Definition, DEFAULT_EVENT, INVALID_EVENT, TERMINATE_EVENT};
use crate::ops::{Operation, OperationMap};
use crate::DefinitionError;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct CompiledTransition<T> {
    action: Option<Operation<T>>,
    to: usize,
}

struct CompiledState<T> {
    name: String,
    entry: Option<Operation<T>>,
    exit: Option<Operation<T>>,
    // Indexed by event id; slot 0 is the default transition.
    slots: Vec<Option<CompiledTransition<T>>>,
}

fn resolve<T>(
    ops: &OperationMap<T>,
    name: Option<&String>,
) -> Result<Option<Operation<T>>, DefinitionError> {
    match name {
        None => Ok(None),
        Some(n) => match ops.get(n) {
            Some(op) => Ok(Some(op)),
            None => Err(DefinitionError::UnknownOperation { name: n.clone() }),
        },
    }
}

fn set_slot<T>(slots: &mut Vec<Option<CompiledTransition<T>>>, event: i32, t: CompiledTransition<T>) {
    let at = event as usize;
    if slots.len() <= at {
        slots.resize_with(at + 1, || None);
    }
    slots[at] = Some(t);
}

fn compile<T>(
    def: &Definition,
    ops: &OperationMap<T>,
) -> Result<(Vec<CompiledState<T>>, usize), DefinitionError> {
    def.validate()?;

    let index: HashMap<&str, usize> = def
        .states
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut states = Vec::with_capacity(def.states.len());
    for (i, state) in def.states.iter().enumerate() {
        let mut slots: Vec<Option<CompiledTransition<T>>> = Vec::new();

        for t in def.transitions.iter().filter(|t| t.from == state.name) {
            set_slot(
                &mut slots,
                t.event,
                CompiledTransition {
                    action: resolve(ops, t.action.as_ref())?,
                    to: index[t.to.as_str()],
                },
            );
        }

        for g in &def.global_events {
            let taken = matches!(slots.get(g.event as usize), Some(Some(_)));
            if !taken {
                set_slot(
                    &mut slots,
                    g.event,
                    CompiledTransition {
                        action: resolve(ops, g.action.as_ref())?,
                        to: i,
                    },
                );
            }
        }

        states.push(CompiledState {
            name: state.name.clone(),
            entry: ops.get(&format!("{}StateEntry", state.name)),
            exit: ops.get(&format!("{}StateExit", state.name)),
            slots,
        });
    }

    Ok((states, index[def.first_state.as_str()]))
}

struct RunnerShared {
    name: String,
    queue: Mutex<VecDeque<i32>>,
    cond: Condvar,
    shutdown: AtomicBool,
    current: AtomicUsize,
    state_names: Vec<String>,
    observers: Mutex<Vec<Box<dyn Fn(&str) + Send>>>,
}

impl RunnerShared {
    fn enqueue(&self, event: i32) {
        self.queue.lock().push_back(event);
        self.cond.notify_one();
    }
}

/// A worker thread hosting one definition-driven machine.
///
/// The implementation object is moved into the worker; the handle is the
/// only way to reach the machine afterwards, and only through events.
///
/// # Example
///
/// ```
/// use spindle_def::{Definition, DefinitionRunner, OperationMap, State, Transition};
///
/// struct Door;
///
/// let def = Definition {
///     first_state: "Shut".into(),
///     states: vec![State::new("Shut"), State::new("Open")],
///     transitions: vec![Transition::new("Shut", "Open", 1, None)],
///     global_events: vec![],
///     shutdown_events: vec![],
/// };
///
/// let runner =
///     DefinitionRunner::spawn("door", &def, OperationMap::new(), Door).unwrap();
/// assert!(runner.push_event(1));
/// runner.join().unwrap();
/// ```
pub struct DefinitionRunner {
    shared: Arc<RunnerShared>,
    shutdown_events: Vec<i32>,
    worker: Option<JoinHandle<()>>,
}

impl DefinitionRunner {
    /// Compiles `def` against `ops` and launches the worker.
    ///
    /// # Errors
    ///
    /// Any [`DefinitionError`]: the definition fails validation, an
    /// action name is unregistered, or the worker thread cannot start.
    pub fn spawn<T: Send + 'static>(
        name: impl Into<String>,
        def: &Definition,
        ops: OperationMap<T>,
        mut imp: T,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let (states, first) = compile(def, &ops)?;

        let shared = Arc::new(RunnerShared {
            name: name.clone(),
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            current: AtomicUsize::new(first),
            state_names: states.iter().map(|s| s.name.clone()).collect(),
            observers: Mutex::new(Vec::new()),
        });

        let worker = thread::Builder::new()
            .name(format!("spindle-def-{name}"))
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_worker(&shared, &states, &mut imp)
            })
            .map_err(|e| DefinitionError::WorkerSpawn {
                reason: e.to_string(),
            })?;

        Ok(Self {
            shared,
            shutdown_events: def.shutdown_events.clone(),
            worker: Some(worker),
        })
    }

    /// The runner's friendly name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Enqueues a user event.
    ///
    /// Returns `false` — not admitted — once `stop` has been requested,
    /// and for reserved (non-positive) ids.
    pub fn push_event(&self, event: i32) -> bool {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return false;
        }
        if event <= DEFAULT_EVENT {
            tracing::warn!(
                "{}: rejecting reserved event id {}",
                self.shared.name,
                event
            );
            return false;
        }
        self.shared.enqueue(event);
        true
    }

    /// Registers a `StateChanged` observer.
    ///
    /// Observers run on the worker, synchronously between a transition's
    /// action and the new state's entry operation.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&str) + Send + 'static,
    {
        self.shared.observers.lock().push(Box::new(observer));
    }

    /// Name of the state the machine is currently in.
    ///
    /// Diagnostics only: by the time the caller looks at the value the
    /// worker may already have moved on.
    #[must_use]
    pub fn current_state(&self) -> String {
        self.shared.state_names[self.shared.current.load(Ordering::Acquire)].clone()
    }

    /// Requests shutdown: further `push_event` calls are refused, the
    /// definition's shutdown events are enqueued in declared order, then
    /// the terminate sentinel. Idempotent; returns without waiting.
    pub fn stop(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("{}: stop requested", self.shared.name);
        for &ev in &self.shutdown_events {
            self.shared.enqueue(ev);
        }
        self.shared.enqueue(TERMINATE_EVENT);
    }

    /// Stops the runner and joins the worker.
    ///
    /// A panic that escaped a handler on the worker is surfaced here.
    pub fn join(mut self) -> thread::Result<()> {
        self.stop();
        match self.worker.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl Drop for DefinitionRunner {
    fn drop(&mut self) {
        // Let the worker drain and exit on its own; join() is the
        // blocking path.
        if self.worker.is_some() {
            self.stop();
        }
    }
}

fn run_worker<T>(shared: &Arc<RunnerShared>, states: &[CompiledState<T>], imp: &mut T) {
    tracing::info!("{}: worker started", shared.name);
    loop {
        let ev = wait_event(shared);
        if ev == TERMINATE_EVENT {
            break;
        }
        drive(shared, states, imp, ev);
    }
    tracing::info!("{}: worker stopped", shared.name);
}

fn wait_event(shared: &RunnerShared) -> i32 {
    let mut queue = shared.queue.lock();
    loop {
        if let Some(ev) = queue.pop_front() {
            return ev;
        }
        shared.cond.wait(&mut queue);
    }
}

fn drive<T>(shared: &RunnerShared, states: &[CompiledState<T>], imp: &mut T, event: i32) {
    let mut ev = event;
    loop {
        let current = shared.current.load(Ordering::Relaxed);
        let state = &states[current];
        if let Some(t) = keyed(state, ev) {
            run_transition(shared, states, imp, current, t);
            ev = INVALID_EVENT;
        } else if let Some(d) = default_of(state) {
            run_transition(shared, states, imp, current, d);
            if shared.current.load(Ordering::Relaxed) == current {
                // A default that did not move the machine ends the chain;
                // anything else would spin on a self-loop default.
                break;
            }
        } else {
            if ev != INVALID_EVENT {
                tracing::debug!(
                    "{}: event {} not handled in {}, dropped",
                    shared.name,
                    ev,
                    state.name
                );
            }
            break;
        }
    }
}

fn keyed<T>(state: &CompiledState<T>, ev: i32) -> Option<&CompiledTransition<T>> {
    if ev <= DEFAULT_EVENT {
        return None;
    }
    state.slots.get(ev as usize).and_then(Option::as_ref)
}

fn default_of<T>(state: &CompiledState<T>) -> Option<&CompiledTransition<T>> {
    state.slots.get(DEFAULT_EVENT as usize).and_then(Option::as_ref)
}

fn run_transition<T>(
    shared: &RunnerShared,
    states: &[CompiledState<T>],
    imp: &mut T,
    from: usize,
    t: &CompiledTransition<T>,
) {
    if let Some(exit) = &states[from].exit {
        exit(imp);
    }
    if let Some(action) = &t.action {
        action(imp);
    }
    shared.current.store(t.to, Ordering::Release);
    let to = &states[t.to];
    for observer in shared.observers.lock().iter() {
        observer(&to.name);
    }
    if let Some(entry) = &to.entry {
        entry(imp);
    }
}

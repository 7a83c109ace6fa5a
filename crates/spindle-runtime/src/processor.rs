//! The processor: one worker thread hosting many state machines.
//!
//! ```text
//!  any thread                     │ worker thread
//!  ──────────                     │ ─────────────
//!  spawn(machine) ──► Admit ──►┐  │   ┌── pause gate
//!  push_event(ev, h) ──► FIFO ─┼──┼──►│ fire due timers
//!  push_timer(t, h) ─► timer   │  │   │ pop job (bounded by next expiry)
//!                      queue ──┘  │   │ classify & dispatch
//!  terminate(h) ── tombstone +    │   │ event.done()
//!                  envelope       │   └── loop
//! ```
//!
//! All machine code — entry, exit, transition, and timer handlers — runs
//! on the worker and is serialized against every other machine on the
//! same processor. The worker blocks in exactly two places: waiting on
//! the job queue (bounded by the next timer deadline) and on the pause
//! gate. No user code runs under a queue lock.
//!
//! # Ordering
//!
//! Events from one producer to one machine dispatch in push order; the
//! only removal is the consecutive-duplicate rule (a re-push of the same
//! event object to the same machine, back to back, while the queue is
//! nonempty, merges with the queued delivery). An expired timer is
//! processed before further FIFO items iff it expired before or during
//! the current iteration's wait; a timer that has not expired never
//! preempts a dequeued event.
//!
//! # Termination
//!
//! `terminate` and `terminate_all` are callable from any thread —
//! including from a handler running on the worker. The target is
//! tombstoned immediately, so once the call returns no handler of that
//! machine runs again and none of its timers fire; the actual removal
//! (exit hook, timer disable, unbind) happens when the worker processes
//! the terminate envelope.

use crate::hosted::{AnyMachine, Hosted};
use crate::job::Job;
use crate::timer_queue::TimerQueue;
use crate::ProcessorError;
use parking_lot::{Condvar, Mutex};
use spindle_event::{Admitted, Event, Timer, REPEAT_FOREVER};
use spindle_machine::{table_for, Host, StateMachine};
use spindle_types::MachineId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

struct JobQueue {
    jobs: VecDeque<Job>,
    // Identity of the most recently pushed event, for the
    // consecutive-duplicate rule.
    last_event: Option<(Event, MachineId)>,
}

struct TimerBoard {
    queue: TimerQueue,
    changed: bool,
}

struct PauseGate {
    requested: bool,
    paused: bool,
}

struct Shared {
    name: String,
    next_id: AtomicU64,
    running: AtomicBool,
    jobs: Mutex<JobQueue>,
    jobs_cond: Condvar,
    timers: Mutex<TimerBoard>,
    pause: Mutex<PauseGate>,
    pause_cond: Condvar,
    startup: Mutex<bool>,
    startup_cond: Condvar,
    defunct: Mutex<HashSet<MachineId>>,
}

impl Shared {
    fn push_job(&self, job: Job) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        let mut q = self.jobs.lock();
        q.last_event = None;
        q.jobs.push_back(job);
        self.jobs_cond.notify_one();
        true
    }

    fn push_event_job(&self, target: MachineId, event: Event) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        let mut q = self.jobs.lock();
        if !q.jobs.is_empty() {
            if let Some((last, last_target)) = &q.last_event {
                if *last_target == target && last.same_event(&event) {
                    tracing::debug!(
                        "{}: re-push of the queued event for {}, merged",
                        self.name,
                        target
                    );
                    return true;
                }
            }
        }
        q.last_event = Some((event.clone(), target));
        q.jobs.push_back(Job::Event { target, event });
        self.jobs_cond.notify_one();
        true
    }

    fn insert_timer(&self, target: MachineId, timer: Timer) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        timer.bind(target);
        {
            let mut board = self.timers.lock();
            board.queue.insert(timer);
            board.changed = true;
        }
        self.wake_worker();
        true
    }

    /// Wakes the worker out of its queue wait. Taking the queue lock
    /// first closes the gap between the worker's last re-check and its
    /// wait; a notify fired inside that gap would otherwise be lost.
    fn wake_worker(&self) {
        let _q = self.jobs.lock();
        self.jobs_cond.notify_one();
    }

    fn terminate_machine(&self, target: MachineId) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        self.defunct.lock().insert(target);
        self.push_job(Job::TerminateMachine(target))
    }
}

impl Host for Shared {
    fn post_event(&self, target: MachineId, event: Event) -> bool {
        self.push_event_job(target, event)
    }

    fn post_timer(&self, target: MachineId, timer: Timer) -> bool {
        self.insert_timer(target, timer)
    }

    fn post_terminate(&self, target: MachineId) -> bool {
        self.terminate_machine(target)
    }
}

/// Handle to a machine admitted to a [`Processor`].
///
/// Holds the machine's id and a weak link to the processor; it never
/// keeps the processor alive. Cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct MachineHandle {
    id: MachineId,
    host: Weak<Shared>,
}

impl MachineHandle {
    /// The id the processor assigned at spawn.
    #[must_use]
    pub fn id(&self) -> MachineId {
        self.id
    }

    /// Posts an event to this machine. Returns `false` once the
    /// processor is gone or terminated.
    pub fn push_event(&self, event: Event) -> bool {
        match self.host.upgrade() {
            Some(shared) => shared.push_event_job(self.id, event),
            None => false,
        }
    }

    /// Schedules a timer for this machine.
    pub fn push_timer(&self, timer: Timer) -> bool {
        match self.host.upgrade() {
            Some(shared) => shared.insert_timer(self.id, timer),
            None => false,
        }
    }

    /// Requests termination of this machine.
    pub fn terminate(&self) -> bool {
        match self.host.upgrade() {
            Some(shared) => shared.terminate_machine(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineHandle").field("id", &self.id).finish()
    }
}

/// A worker thread hosting many state machines.
pub struct Processor {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Processor {
    /// Starts a processor.
    ///
    /// The constructor performs a startup handshake: it returns only
    /// after the worker thread is live and draining its queue.
    ///
    /// # Errors
    ///
    /// [`ProcessorError::WorkerSpawn`] if the OS refuses the thread.
    pub fn new(name: impl Into<String>) -> Result<Self, ProcessorError> {
        let name = name.into();
        let shared = Arc::new(Shared {
            name: name.clone(),
            next_id: AtomicU64::new(1),
            running: AtomicBool::new(true),
            jobs: Mutex::new(JobQueue {
                jobs: VecDeque::new(),
                last_event: None,
            }),
            jobs_cond: Condvar::new(),
            timers: Mutex::new(TimerBoard {
                queue: TimerQueue::new(),
                changed: false,
            }),
            pause: Mutex::new(PauseGate {
                requested: false,
                paused: false,
            }),
            pause_cond: Condvar::new(),
            startup: Mutex::new(false),
            startup_cond: Condvar::new(),
            defunct: Mutex::new(HashSet::new()),
        });

        let worker = thread::Builder::new()
            .name(format!("spindle-proc-{name}"))
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker_loop(&shared)
            })
            .map_err(|e| ProcessorError::WorkerSpawn {
                reason: e.to_string(),
            })?;

        let mut started = shared.startup.lock();
        while !*started {
            shared.startup_cond.wait(&mut started);
        }
        drop(started);

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// The processor's friendly name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Admits a machine.
    ///
    /// Resolves the machine type's dispatch table (building it on the
    /// type's first spawn anywhere in the process), binds the machine's
    /// mailbox, and enqueues the admission. On the worker the admission
    /// runs `on_entry` and then the initial state's entry handler with an
    /// [`Admitted`] event.
    ///
    /// # Errors
    ///
    /// [`ProcessorError::Table`] if the type's `configure` is invalid;
    /// [`ProcessorError::Terminated`] after disposal.
    pub fn spawn<M: StateMachine>(&self, machine: M) -> Result<MachineHandle, ProcessorError> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(ProcessorError::Terminated);
        }
        let table = table_for::<M>()?;
        let id = MachineId::from_raw(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let shared_dyn: Arc<dyn Host> = self.shared.clone();
        let host: Weak<dyn Host> = Arc::downgrade(&shared_dyn);
        machine.mailbox().bind(id, host);

        let hosted = Box::new(Hosted::new(id, machine, table));
        if !self.shared.push_job(Job::Admit(hosted)) {
            return Err(ProcessorError::Terminated);
        }
        Ok(MachineHandle {
            id,
            host: Arc::downgrade(&self.shared),
        })
    }

    /// Posts an event to a machine.
    ///
    /// Returns `false` — not admitted — once the processor is disposed.
    /// A push of the same event object to the same machine as the
    /// immediately preceding push, while the queue is nonempty, merges
    /// with the queued delivery and returns `true`.
    pub fn push_event(&self, event: Event, target: &MachineHandle) -> bool {
        self.shared.push_event_job(target.id, event)
    }

    /// Schedules a timer for a machine.
    ///
    /// The timer enters the expiry-ordered queue and bounds the worker's
    /// next wait.
    pub fn push_timer(&self, timer: Timer, target: &MachineHandle) -> bool {
        self.shared.insert_timer(target.id, timer)
    }

    /// Cancels a timer.
    ///
    /// Soft-delete: the timer is disabled in place and the worker reaps
    /// it when its scan reaches it. After this call the timer never
    /// fires.
    pub fn remove_timer(&self, timer: &Timer) {
        timer.disable();
        self.shared.timers.lock().changed = true;
        // The cancelled timer may have been bounding the worker's wait.
        self.shared.wake_worker();
    }

    /// Whether `event` is currently sitting in the job queue.
    #[must_use]
    pub fn contains(&self, event: &Event) -> bool {
        self.shared
            .jobs
            .lock()
            .jobs
            .iter()
            .any(|job| matches!(job, Job::Event { event: queued, .. } if queued.same_event(event)))
    }

    /// Terminates one machine.
    ///
    /// Safe from any thread, including from a handler running on the
    /// worker. When the call returns the machine is tombstoned: no
    /// further handler runs and no timer bound to it fires. Removal
    /// itself (exit hook, timer disable, unbind) happens on the worker.
    pub fn terminate(&self, target: &MachineHandle) {
        self.shared.terminate_machine(target.id);
    }

    /// Terminates every machine and stops the worker.
    pub fn terminate_all(&self) {
        self.shared.push_job(Job::TerminateAll);
        self.shared.running.store(false, Ordering::Release);
    }

    /// Requests the worker to pause at its next suspension point.
    ///
    /// Queued work stays queued; a handler already running completes.
    pub fn suspend(&self) {
        self.shared.pause.lock().requested = true;
    }

    /// Clears a pause request and wakes the worker.
    pub fn resume(&self) {
        let mut gate = self.shared.pause.lock();
        gate.requested = false;
        self.shared.pause_cond.notify_all();
    }

    /// Posts the engine-terminate envelope and returns immediately.
    ///
    /// The worker unregisters every machine and exits; undispatched
    /// events are dropped. Use [`join`](Self::join) to wait for that.
    pub fn dispose(&self) {
        self.shared.push_job(Job::TerminateEngine);
        self.shared.running.store(false, Ordering::Release);
    }

    /// Disposes the processor and joins the worker.
    ///
    /// A panic that escaped a handler on the worker is surfaced here.
    pub fn join(self) -> thread::Result<()> {
        self.dispose();
        let handle = self.worker.lock().take();
        match handle {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        // Let the worker drain and exit on its own; join() is the
        // blocking path.
        if self.shared.running.load(Ordering::Acquire) {
            self.dispose();
        }
    }
}

fn worker_loop(shared: &Arc<Shared>) {
    tracing::info!("{}: worker started", shared.name);
    {
        let mut started = shared.startup.lock();
        *started = true;
        shared.startup_cond.notify_all();
    }

    let mut machines: HashMap<MachineId, Box<dyn AnyMachine>> = HashMap::new();

    loop {
        pause_gate(shared);
        let deadline = fire_due_timers(shared, &mut machines);
        let Some(job) = next_job(shared, deadline) else {
            continue;
        };
        tracing::trace!("{}: processing {} job", shared.name, job.kind());
        match job {
            Job::Admit(mut hosted) => {
                let id = hosted.id();
                tracing::info!("{}: admitted {} as {}", shared.name, hosted.name(), id);
                hosted.on_entry();
                hosted.enter_first_state(&Event::new(Admitted));
                machines.insert(id, hosted);
            }
            Job::Event { target, event } => {
                if shared.defunct.lock().contains(&target) {
                    tracing::debug!(
                        "{}: dropping event for terminated machine {}",
                        shared.name,
                        target
                    );
                } else if let Some(machine) = machines.get_mut(&target) {
                    machine.handle(&event);
                    event.done();
                } else {
                    tracing::warn!(
                        "{}: no machine {} for event, dropping",
                        shared.name,
                        target
                    );
                }
            }
            Job::TerminateMachine(id) => {
                remove_machine(shared, &mut machines, id);
            }
            Job::TerminateAll | Job::TerminateEngine => {
                let ids: Vec<MachineId> = machines.keys().copied().collect();
                for id in ids {
                    remove_machine(shared, &mut machines, id);
                }
                break;
            }
        }
    }

    shared.running.store(false, Ordering::Release);
    tracing::info!("{}: worker stopped", shared.name);
}

fn pause_gate(shared: &Shared) {
    let mut gate = shared.pause.lock();
    while gate.requested {
        if !gate.paused {
            gate.paused = true;
            tracing::debug!("{}: paused", shared.name);
        }
        shared.pause_cond.wait(&mut gate);
    }
    if gate.paused {
        gate.paused = false;
        tracing::debug!("{}: resumed", shared.name);
    }
}

/// Fires every due timer and returns the next deadline bounding the
/// worker's queue wait (`None` = wait unbounded).
fn fire_due_timers(
    shared: &Arc<Shared>,
    machines: &mut HashMap<MachineId, Box<dyn AnyMachine>>,
) -> Option<Instant> {
    loop {
        let timer = {
            let mut board = shared.timers.lock();
            board.changed = false;
            match board.queue.pop_due(Instant::now()) {
                Some(timer) => timer,
                None => return board.queue.next_deadline(),
            }
        };

        if !timer.is_enabled() {
            continue;
        }
        let Some(target) = timer.target() else {
            continue;
        };
        if shared.defunct.lock().contains(&target) {
            continue;
        }
        let Some(machine) = machines.get_mut(&target) else {
            tracing::debug!(
                "{}: timer for unknown machine {} dropped",
                shared.name,
                target
            );
            continue;
        };

        // Timer lock is released here; handlers may schedule more timers.
        machine.handle(timer.event());

        match timer.repeats() {
            REPEAT_FOREVER => {
                timer.reschedule();
                shared.timers.lock().queue.insert(timer);
            }
            0 => timer.event().done(),
            _ => {
                timer.decrement_repeats();
                timer.reschedule();
                shared.timers.lock().queue.insert(timer);
            }
        }
    }
}

/// Pops the next job, waiting until one arrives, the deadline passes, or
/// the worker must re-examine its surroundings (pause requested, timer
/// list changed).
fn next_job(shared: &Shared, deadline: Option<Instant>) -> Option<Job> {
    let mut q = shared.jobs.lock();
    loop {
        if shared.pause.lock().requested {
            return None;
        }
        if let Some(job) = q.jobs.pop_front() {
            if q.jobs.is_empty() {
                q.last_event = None;
            }
            return Some(job);
        }
        if shared.timers.lock().changed {
            return None;
        }
        match deadline {
            Some(deadline) => {
                if shared.jobs_cond.wait_until(&mut q, deadline).timed_out() {
                    return None;
                }
            }
            None => shared.jobs_cond.wait(&mut q),
        }
    }
}

fn remove_machine(
    shared: &Arc<Shared>,
    machines: &mut HashMap<MachineId, Box<dyn AnyMachine>>,
    id: MachineId,
) {
    let Some(mut machine) = machines.remove(&id) else {
        shared.defunct.lock().remove(&id);
        return;
    };
    shared.timers.lock().queue.disable_machine(id);
    machine.on_exit();
    machine.unbind();
    shared.defunct.lock().remove(&id);
    tracing::info!("{}: removed {} ({})", shared.name, machine.name(), id);
}

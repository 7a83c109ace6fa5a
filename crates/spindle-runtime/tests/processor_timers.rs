//! Timer behavior and machine/engine lifecycle: expiry ordering,
//! repeats, soft-delete cleanup on termination, and disposal semantics.

use spindle_event::{Event, Timer};
use spindle_machine::{Mailbox, StateMachine, TableBuilder};
use spindle_runtime::{Processor, ProcessorError};
use spindle_types::ErrorCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn count_of(log: &Log, needle: &str) -> usize {
    log.lock().unwrap().iter().filter(|l| *l == needle).count()
}

/// Polls until `cond` holds or the timeout passes.
fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

struct Tick(&'static str);
struct Doom;

/// Event-only machine that records every tick tag.
struct TickSink {
    mailbox: Mailbox,
    log: Log,
}

impl TickSink {
    fn new(log: &Log) -> Self {
        Self {
            mailbox: Mailbox::new(),
            log: Arc::clone(log),
        }
    }
}

impl StateMachine for TickSink {
    type State = ();

    fn name(&self) -> &str {
        "tick-sink"
    }

    fn state(&self) {}

    fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    fn configure(table: &mut TableBuilder<Self>) {
        table.when::<Tick>(|m, tick| {
            m.log.lock().unwrap().push(format!("tick:{}", tick.0));
        });
    }
}

/// Terminates itself on the first `Doom` it sees; logs its exit hook.
struct SelfTerm {
    mailbox: Mailbox,
    log: Log,
}

impl SelfTerm {
    fn new(log: &Log) -> Self {
        Self {
            mailbox: Mailbox::new(),
            log: Arc::clone(log),
        }
    }
}

impl StateMachine for SelfTerm {
    type State = ();

    fn name(&self) -> &str {
        "self-term"
    }

    fn state(&self) {}

    fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    fn configure(table: &mut TableBuilder<Self>) {
        table.when::<Doom>(|m, _| {
            m.log.lock().unwrap().push("doom".into());
            assert!(m.mailbox.terminate());
        });
    }

    fn on_exit(&mut self) {
        self.log.lock().unwrap().push("exit".into());
    }
}

#[test]
fn earlier_expiry_fires_first() {
    let log = new_log();
    let processor = Processor::new("timer-order").unwrap();
    let sink = processor.spawn(TickSink::new(&log)).unwrap();

    let slow = Timer::one_shot(Tick("slow"), Duration::from_millis(60));
    let fast = Timer::one_shot(Tick("fast"), Duration::from_millis(15));
    assert!(processor.push_timer(slow.clone(), &sink));
    assert!(processor.push_timer(fast.clone(), &sink));

    assert!(slow.event().wait_for(Duration::from_secs(5)));
    processor.join().unwrap();

    assert_eq!(entries(&log), vec!["tick:fast", "tick:slow"]);
    assert!(fast.event().is_done());
}

#[test]
fn one_shot_timer_completes_after_single_fire() {
    let log = new_log();
    let processor = Processor::new("timer-once").unwrap();
    let sink = processor.spawn(TickSink::new(&log)).unwrap();

    let timer = Timer::one_shot(Tick("once"), Duration::from_millis(10));
    assert!(processor.push_timer(timer.clone(), &sink));
    assert!(timer.event().wait_for(Duration::from_secs(5)));

    std::thread::sleep(Duration::from_millis(40));
    processor.join().unwrap();
    assert_eq!(count_of(&log, "tick:once"), 1);
}

#[test]
fn repeating_timer_fires_repeats_plus_one_times() {
    let log = new_log();
    let processor = Processor::new("timer-repeat").unwrap();
    let sink = processor.spawn(TickSink::new(&log)).unwrap();

    let timer = Timer::repeating(Tick("rep"), Duration::from_millis(10), 2);
    assert!(processor.push_timer(timer.clone(), &sink));

    // Completion happens on the final (third) fire.
    assert!(timer.event().wait_for(Duration::from_secs(5)));
    std::thread::sleep(Duration::from_millis(40));
    processor.join().unwrap();

    assert_eq!(count_of(&log, "tick:rep"), 3);
    assert_eq!(timer.repeats(), 0);
}

#[test]
fn forever_timer_fires_until_removed() {
    let log = new_log();
    let processor = Processor::new("timer-forever").unwrap();
    let sink = processor.spawn(TickSink::new(&log)).unwrap();

    let timer = Timer::forever(Tick("inf"), Duration::from_millis(10));
    assert!(processor.push_timer(timer.clone(), &sink));

    assert!(wait_until(Duration::from_secs(5), || count_of(&log, "tick:inf") >= 3));
    processor.remove_timer(&timer);
    assert!(!timer.is_enabled());

    // One in-flight fire may still land; after that the count is frozen.
    std::thread::sleep(Duration::from_millis(50));
    let frozen = count_of(&log, "tick:inf");
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(count_of(&log, "tick:inf"), frozen);

    // An infinite timer's event is never completed.
    assert!(!timer.event().is_done());
    processor.join().unwrap();
}

#[test]
fn termination_disables_pending_repeats() {
    let log = new_log();
    let processor = Processor::new("timer-cleanup").unwrap();
    let machine = processor.spawn(SelfTerm::new(&log)).unwrap();

    let timer = Timer::repeating(Doom, Duration::from_millis(15), 3);
    assert!(processor.push_timer(timer.clone(), &machine));

    // First fire terminates the machine; the re-queued repeat must never
    // run again.
    assert!(wait_until(Duration::from_secs(5), || {
        count_of(&log, "exit") == 1
    }));
    std::thread::sleep(Duration::from_millis(80));
    processor.join().unwrap();

    assert_eq!(count_of(&log, "doom"), 1);
    assert!(!timer.is_enabled());
    assert!(!timer.event().is_done());
}

#[test]
fn terminated_machine_goes_silent() {
    let log = new_log();
    let processor = Processor::new("terminate").unwrap();
    let machine = processor.spawn(SelfTerm::new(&log)).unwrap();

    processor.suspend();
    let stranded = Event::new(Doom);
    assert!(processor.push_event(stranded.clone(), &machine));
    // Tombstoned before the queued event is reached.
    processor.terminate(&machine);
    processor.resume();

    assert!(wait_until(Duration::from_secs(5), || {
        count_of(&log, "exit") == 1
    }));
    processor.join().unwrap();

    // The stranded event was dropped undispatched, not completed.
    assert_eq!(count_of(&log, "doom"), 0);
    assert!(!stranded.is_done());
}

#[test]
fn terminate_all_removes_every_machine() {
    let log = new_log();
    let processor = Processor::new("terminate-all").unwrap();
    processor.spawn(SelfTerm::new(&log)).unwrap();
    processor.spawn(SelfTerm::new(&log)).unwrap();

    processor.terminate_all();
    let worker_done = wait_until(Duration::from_secs(5), || count_of(&log, "exit") == 2);
    assert!(worker_done);
    processor.join().unwrap();
}

#[test]
fn dispose_refuses_further_work() {
    let log = new_log();
    let processor = Processor::new("dispose").unwrap();
    let sink = processor.spawn(TickSink::new(&log)).unwrap();

    processor.dispose();
    assert!(!processor.push_event(Event::new(Tick("late")), &sink));
    assert!(!processor.push_timer(
        Timer::one_shot(Tick("late"), Duration::from_millis(1)),
        &sink
    ));

    let err = processor.spawn(TickSink::new(&log)).unwrap_err();
    assert_eq!(err.code(), "PROC_TERMINATED");
    assert!(matches!(err, ProcessorError::Terminated));

    processor.join().unwrap();
    assert!(entries(&log).is_empty());
}

#[test]
fn machines_exit_when_the_engine_is_disposed() {
    let log = new_log();
    let processor = Processor::new("drain").unwrap();
    processor.spawn(SelfTerm::new(&log)).unwrap();
    processor.join().unwrap();

    assert_eq!(count_of(&log, "exit"), 1);
}

//! Completion signaling between producers and the dispatching worker.
//!
//! A producer that pushes an event may block on [`Completion::wait`] until
//! the worker that dispatched the event marks it done. The protocol is
//! deliberately tiny:
//!
//! - `done()` is idempotent; calling it twice is the same as once.
//! - `wait()` returns immediately if the event is already done.
//! - Both are safe from any number of threads.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A one-way done/wait latch.
///
/// The flag only ever moves from pending to done. Waiters recheck the flag
/// after every wakeup, so spurious condvar wakeups are harmless.
#[derive(Debug, Default)]
pub struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    /// Creates a pending completion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the completion done and wakes all waiters.
    ///
    /// Idempotent.
    pub fn done(&self) {
        let mut done = self.done.lock();
        if !*done {
            *done = true;
            self.cond.notify_all();
        }
    }

    /// Returns whether `done()` has been called.
    #[must_use]
    pub fn is_done(&self) -> bool {
        *self.done.lock()
    }

    /// Blocks the calling thread until the completion is done.
    ///
    /// Returns immediately if it already is.
    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    /// Blocks until the completion is done or `timeout` elapses.
    ///
    /// Returns `true` if the completion was done when the wait ended.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut done = self.done.lock();
        if *done {
            return true;
        }
        self.cond.wait_for(&mut done, timeout);
        *done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_pending() {
        let c = Completion::new();
        assert!(!c.is_done());
    }

    #[test]
    fn done_is_idempotent() {
        let c = Completion::new();
        c.done();
        c.done();
        assert!(c.is_done());
    }

    #[test]
    fn wait_returns_immediately_when_done() {
        let c = Completion::new();
        c.done();
        c.wait();
    }

    #[test]
    fn wait_for_times_out_when_pending() {
        let c = Completion::new();
        assert!(!c.wait_for(Duration::from_millis(10)));
    }

    #[test]
    fn wakes_waiter_on_other_thread() {
        let c = Arc::new(Completion::new());
        let waiter = {
            let c = Arc::clone(&c);
            thread::spawn(move || c.wait())
        };
        thread::sleep(Duration::from_millis(5));
        c.done();
        waiter.join().unwrap();
        assert!(c.is_done());
    }

    #[test]
    fn wakes_all_waiters() {
        let c = Arc::new(Completion::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&c);
                thread::spawn(move || assert!(c.wait_for(Duration::from_secs(5))))
            })
            .collect();
        thread::sleep(Duration::from_millis(5));
        c.done();
        for w in waiters {
            w.join().unwrap();
        }
    }
}

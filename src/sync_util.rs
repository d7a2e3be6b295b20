//! Small synchronization helpers shared by the crate's background
//! threads (the cleanup manager and the refresh scheduler).

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Cancellable stop signal: a condvar-gated flag rather than a polling
/// sleep loop, so shutdown latency is bounded by wakeup time, not by
/// the full check/tick interval.
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        StopSignal {
            stopped: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn signal_stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.condvar.notify_all();
    }

    /// Sleeps for `duration` unless stop is signalled first. Returns
    /// true if a stop was observed.
    pub(crate) fn wait(&self, duration: Duration) -> bool {
        let guard = self.stopped.lock().unwrap();
        if *guard {
            return true;
        }
        let (guard, _timeout_result) = self.condvar.wait_timeout(guard, duration).unwrap();
        *guard
    }

    pub(crate) fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap()
    }
}

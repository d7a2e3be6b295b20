//! Reference counting for in-flight queries against index snapshots.
//!
//! Every search against a golden repository's index path increments
//! that path's ref count for the duration of the query and decrements
//! it on completion. The cleanup manager only deletes a path once its
//! count reaches zero, the same floor-of-visibility idea as an MVCC
//! garbage collector gating reclamation on the oldest active read view.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct QueryTracker {
    counts: Mutex<HashMap<String, u64>>,
}

impl QueryTracker {
    pub fn new() -> Self {
        QueryTracker {
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Increments the ref count for `index_path`, creating an entry at
    /// 1 if none exists yet.
    pub fn increment_ref(&self, index_path: &str) {
        let mut counts = self.counts.lock().unwrap();
        *counts.entry(index_path.to_string()).or_insert(0) += 1;
    }

    /// Decrements the ref count for `index_path`.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero or the path has never been
    /// tracked — a caller decrementing without a matching increment is
    /// a bug in the caller, not a condition to paper over.
    pub fn decrement_ref(&self, index_path: &str) {
        let mut counts = self.counts.lock().unwrap();
        match counts.get_mut(index_path) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    counts.remove(index_path);
                }
            }
            _ => panic!("decrement_ref called on {} with no outstanding ref", index_path),
        }
    }

    /// Returns the current ref count for `index_path`, or 0 if untracked.
    pub fn get_ref_count(&self, index_path: &str) -> u64 {
        self.counts.lock().unwrap().get(index_path).copied().unwrap_or(0)
    }
}

/// RAII guard returned by [`QueryTracker::track`]: increments on
/// creation, decrements on drop, so a query path can't leak a ref
/// count on an early return or panic.
pub struct QueryGuard<'a> {
    tracker: &'a QueryTracker,
    index_path: String,
}

impl QueryTracker {
    pub fn track<'a>(&'a self, index_path: &str) -> QueryGuard<'a> {
        self.increment_ref(index_path);
        QueryGuard {
            tracker: self,
            index_path: index_path.to_string(),
        }
    }
}

impl Drop for QueryGuard<'_> {
    fn drop(&mut self) {
        self.tracker.decrement_ref(&self.index_path);
    }
}

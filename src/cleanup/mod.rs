//! Background cleanup of old index versions.
//!
//! Watches [`QueryTracker`](crate::query_tracker::QueryTracker) ref
//! counts and deletes scheduled index directories once nothing is
//! reading them, with exponential backoff and a circuit breaker per
//! path so one persistently broken path can't spin the loop forever,
//! and a file-descriptor back-pressure check so a cleanup cycle never
//! runs a process out of descriptors mid-deletion.

mod entry;
mod errors;

pub use entry::FailureState;
pub use errors::CleanupError;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::fsutil;
use crate::observability::Logger;
use crate::query_tracker::QueryTracker;
use crate::sync_util::StopSignal;

pub struct CleanupConfig {
    pub check_interval: Duration,
    pub max_failures: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub fd_usage_threshold: f64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        CleanupConfig {
            check_interval: Duration::from_secs(1),
            max_failures: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            fd_usage_threshold: 0.80,
        }
    }
}

struct SharedState {
    pending: Mutex<HashSet<String>>,
    failures: Mutex<HashMap<String, FailureState>>,
}

pub struct CleanupManager {
    config: CleanupConfig,
    query_tracker: Arc<QueryTracker>,
    state: Arc<SharedState>,
    stop: Arc<StopSignal>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupManager {
    pub fn new(query_tracker: Arc<QueryTracker>, config: CleanupConfig) -> Self {
        CleanupManager {
            config,
            query_tracker,
            state: Arc::new(SharedState {
                pending: Mutex::new(HashSet::new()),
                failures: Mutex::new(HashMap::new()),
            }),
            stop: Arc::new(StopSignal::new()),
            thread: Mutex::new(None),
        }
    }

    /// Schedules `index_path` for deletion once its ref count reaches zero.
    pub fn schedule_cleanup(&self, index_path: &str) {
        self.state.pending.lock().unwrap().insert(index_path.to_string());
        Logger::info("CLEANUP_SCHEDULED", &[("path", index_path)]);
    }

    pub fn pending_cleanups(&self) -> HashSet<String> {
        self.state.pending.lock().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().unwrap().is_some()
    }

    /// Starts the background cleanup thread. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut thread_slot = self.thread.lock().unwrap();
        if thread_slot.is_some() {
            Logger::trace("CLEANUP_MANAGER_ALREADY_RUNNING", &[]);
            return;
        }

        let manager = Arc::clone(self);
        let handle = thread::spawn(move || manager.run_loop());
        *thread_slot = Some(handle);
        Logger::info("CLEANUP_MANAGER_STARTED", &[]);
    }

    /// Signals the background thread to stop and joins it. Idempotent.
    pub fn stop(&self) {
        let handle = self.thread.lock().unwrap().take();
        let Some(handle) = handle else {
            Logger::trace("CLEANUP_MANAGER_ALREADY_STOPPED", &[]);
            return;
        };
        self.stop.signal_stop();
        let _ = handle.join();
        Logger::info("CLEANUP_MANAGER_STOPPED", &[]);
    }

    fn run_loop(self: Arc<Self>) {
        Logger::trace("CLEANUP_LOOP_STARTED", &[]);
        loop {
            self.process_pending();
            if self.stop.wait(self.config.check_interval) {
                break;
            }
        }
        Logger::trace("CLEANUP_LOOP_EXITED", &[]);
    }

    fn process_pending(&self) {
        if fsutil::is_fd_usage_high(self.config.fd_usage_threshold) {
            Logger::warn(
                "CLEANUP_SKIPPED_FD_PRESSURE",
                &[("reason", "file descriptor usage above threshold")],
            );
            return;
        }

        let candidates: Vec<String> = self.state.pending.lock().unwrap().iter().cloned().collect();

        for path in candidates {
            if self.stop.is_stopped() {
                return;
            }
            self.process_one(&path);
        }
    }

    fn process_one(&self, path: &str) {
        {
            let failures = self.state.failures.lock().unwrap();
            if let Some(state) = failures.get(path) {
                if state.has_tripped_circuit_breaker(self.config.max_failures) {
                    drop(failures);
                    self.state.pending.lock().unwrap().remove(path);
                    self.state.failures.lock().unwrap().remove(path);
                    Logger::fatal(
                        "CLEANUP_CIRCUIT_BREAKER_TRIPPED",
                        &[("path", path), ("consecutive_failures", &state.consecutive_failures.to_string())],
                    );
                    return;
                }
                if !state.is_ready_for_retry() {
                    return;
                }
            }
        }

        let ref_count = self.query_tracker.get_ref_count(path);
        if ref_count > 0 {
            Logger::trace("CLEANUP_SKIPPED_ACTIVE_QUERIES", &[("path", path), ("ref_count", &ref_count.to_string())]);
            return;
        }

        match fsutil::robust_delete(Path::new(path)) {
            Ok(()) => {
                self.state.pending.lock().unwrap().remove(path);
                self.state.failures.lock().unwrap().remove(path);
                Logger::info("CLEANUP_DELETED", &[("path", path)]);
            }
            Err(e) => {
                let mut failures = self.state.failures.lock().unwrap();
                let state = failures.entry(path.to_string()).or_default();
                state.record_failure(self.config.base_backoff, self.config.max_backoff);
                Logger::error(
                    "CLEANUP_DELETE_FAILED",
                    &[
                        ("path", path),
                        ("error", &e.to_string()),
                        ("consecutive_failures", &state.consecutive_failures.to_string()),
                    ],
                );
            }
        }
    }
}

impl Drop for CleanupManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread::sleep;
    use tempfile::TempDir;

    fn config_for_tests() -> CleanupConfig {
        CleanupConfig {
            check_interval: Duration::from_millis(20),
            ..CleanupConfig::default()
        }
    }

    #[test]
    fn deletes_path_once_ref_count_reaches_zero() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("index-v1");
        fs::create_dir_all(&target).unwrap();

        let tracker = Arc::new(QueryTracker::new());
        let manager = Arc::new(CleanupManager::new(Arc::clone(&tracker), config_for_tests()));

        manager.schedule_cleanup(target.to_str().unwrap());
        manager.start();

        let mut waited = Duration::ZERO;
        while target.exists() && waited < Duration::from_secs(2) {
            sleep(Duration::from_millis(20));
            waited += Duration::from_millis(20);
        }

        manager.stop();
        assert!(!target.exists());
        assert!(manager.pending_cleanups().is_empty());
    }

    #[test]
    fn does_not_delete_while_ref_count_is_positive() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("index-v1");
        fs::create_dir_all(&target).unwrap();

        let tracker = Arc::new(QueryTracker::new());
        tracker.increment_ref(target.to_str().unwrap());

        let manager = Arc::new(CleanupManager::new(Arc::clone(&tracker), config_for_tests()));
        manager.schedule_cleanup(target.to_str().unwrap());
        manager.start();

        sleep(Duration::from_millis(100));
        manager.stop();

        assert!(target.exists());
    }

    #[test]
    fn start_is_idempotent() {
        let tracker = Arc::new(QueryTracker::new());
        let manager = Arc::new(CleanupManager::new(tracker, config_for_tests()));
        manager.start();
        manager.start();
        assert!(manager.is_running());
        manager.stop();
        assert!(!manager.is_running());
    }

    #[test]
    fn stop_is_fast_not_bounded_by_check_interval() {
        let tracker = Arc::new(QueryTracker::new());
        let manager = Arc::new(CleanupManager::new(
            tracker,
            CleanupConfig {
                check_interval: Duration::from_secs(30),
                ..CleanupConfig::default()
            },
        ));
        manager.start();
        let start = std::time::Instant::now();
        manager.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn circuit_breaker_removes_path_after_max_failures() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("leaf-file");
        fs::write(&not_a_dir, b"x").unwrap();

        let tracker = Arc::new(QueryTracker::new());
        let manager = CleanupManager::new(
            Arc::clone(&tracker),
            CleanupConfig {
                max_failures: 2,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                ..config_for_tests()
            },
        );

        // Exists but is not a directory -> robust_delete errors every
        // time, tripping the breaker after max_failures attempts.
        manager.schedule_cleanup(not_a_dir.to_str().unwrap());

        for _ in 0..3 {
            manager.process_pending();
            sleep(Duration::from_millis(5));
        }

        assert!(manager.pending_cleanups().is_empty());
    }
}

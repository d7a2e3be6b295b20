//! Background refresh scheduling for the golden repository fleet.
//!
//! One background thread per process ticks on a fixed interval,
//! enumerates scheduler-eligible repositories (remote git only — local
//! repositories only refresh via an explicit trigger from their writer
//! service), and runs the refresh pipeline for each. Refresh jobs for
//! distinct aliases run concurrently; jobs for the same alias are
//! serialized through a process-local keyed mutex registry, the same
//! pattern the write-lock manager uses for its own intra-process guard.

pub mod change_detection;
pub mod errors;
pub mod indexing;
pub mod pipeline;
pub mod reconciliation;
pub mod write_mode;

pub use errors::{RefreshError, RefreshOutcome, RefreshResult, SkipReason};
pub use pipeline::{PipelineConfig, RefreshPipeline};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::alias::AliasManager;
use crate::cleanup::CleanupManager;
use crate::observability::Logger;
use crate::registry::Registry;
use crate::scheduler::reconciliation::ReconciliationConfig;
use crate::scheduler::write_mode::WriteModeMarkers;
use crate::sync_util::StopSignal;
use crate::write_lock::WriteLockManager;

/// Process-local mutex-per-alias registry, serializing concurrent
/// refresh attempts on the same repository without blocking refreshes
/// of unrelated repositories.
struct AliasMutexes {
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AliasMutexes {
    fn new() -> Self {
        AliasMutexes {
            guards: Mutex::new(HashMap::new()),
        }
    }

    fn for_alias(&self, alias: &str) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().unwrap();
        guards
            .entry(alias.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

pub struct SchedulerConfig {
    pub refresh_interval: Duration,
    pub write_mode_marker_ttl: Duration,
    pub pipeline: PipelineConfig,
    pub reconciliation: ReconciliationConfig,
}

/// Owns the background refresh loop for a fleet of golden repositories
/// rooted at a single directory.
pub struct RefreshScheduler {
    root: PathBuf,
    registry: Arc<Registry>,
    aliases: Arc<AliasManager>,
    write_locks: Arc<WriteLockManager>,
    cleanup: Arc<CleanupManager>,
    write_mode: Arc<WriteModeMarkers>,
    config: SchedulerConfig,
    alias_mutexes: Arc<AliasMutexes>,
    stop: Arc<StopSignal>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        root: impl Into<PathBuf>,
        registry: Arc<Registry>,
        aliases: Arc<AliasManager>,
        write_locks: Arc<WriteLockManager>,
        cleanup: Arc<CleanupManager>,
        config: SchedulerConfig,
    ) -> Self {
        let root = root.into();
        RefreshScheduler {
            write_mode: Arc::new(WriteModeMarkers::new(&root)),
            root,
            registry,
            aliases,
            write_locks,
            cleanup,
            config,
            alias_mutexes: Arc::new(AliasMutexes::new()),
            stop: Arc::new(StopSignal::new()),
            thread: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().unwrap().is_some()
    }

    /// Runs startup reconciliation and force-evicts stale write-mode
    /// markers, then starts the background tick thread. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut thread_slot = self.thread.lock().unwrap();
        if thread_slot.is_some() {
            Logger::trace("SCHEDULER_ALREADY_RUNNING", &[]);
            return;
        }

        self.write_mode.evict_all(&self.write_locks);
        reconciliation::reconcile_if_needed(
            &self.root,
            &self.registry,
            &self.write_locks,
            &self.config.reconciliation,
        );

        let scheduler = Arc::clone(self);
        let handle = thread::spawn(move || scheduler.run_loop());
        *thread_slot = Some(handle);
        Logger::info("SCHEDULER_STARTED", &[]);
    }

    /// Signals the background thread to stop and joins it. Idempotent.
    pub fn stop(&self) {
        let handle = self.thread.lock().unwrap().take();
        let Some(handle) = handle else {
            Logger::trace("SCHEDULER_ALREADY_STOPPED", &[]);
            return;
        };
        self.stop.signal_stop();
        let _ = handle.join();
        Logger::info("SCHEDULER_STOPPED", &[]);
    }

    /// Refreshes a single alias immediately, outside the scheduled
    /// tick, serialized against any concurrent refresh of the same
    /// alias. Used for both the scheduled loop and manual triggers
    /// (including local/non-git repositories, which are never
    /// enumerated by the tick loop itself).
    pub fn refresh_one(&self, alias: &str) -> RefreshResult<RefreshOutcome> {
        let alias_guard = self.alias_mutexes.for_alias(alias);
        let _guard = alias_guard.lock().unwrap();

        let pipeline = RefreshPipeline {
            root: &self.root,
            aliases: &self.aliases,
            write_locks: &self.write_locks,
            cleanup: &self.cleanup,
            registry: &self.registry,
            config: &self.config.pipeline,
        };
        pipeline.refresh(alias)
    }

    fn run_loop(self: Arc<Self>) {
        Logger::trace("SCHEDULER_LOOP_STARTED", &[]);
        loop {
            self.tick();
            if self.stop.wait(self.config.refresh_interval) {
                break;
            }
        }
        Logger::trace("SCHEDULER_LOOP_EXITED", &[]);
    }

    fn tick(&self) {
        self.write_mode
            .evict_expired(&self.write_locks, self.config.write_mode_marker_ttl);

        let repos = match self.registry.list_scheduler_eligible() {
            Ok(repos) => repos,
            Err(e) => {
                Logger::error("SCHEDULER_REGISTRY_READ_FAILED", &[("error", &e.to_string())]);
                return;
            }
        };

        let handles: Vec<JoinHandle<()>> = repos
            .into_iter()
            .map(|repo| {
                let alias = repo.alias.clone();
                let alias_mutexes = Arc::clone(&self.alias_mutexes);
                let root = self.root.clone();
                let registry = Arc::clone(&self.registry);
                let aliases = Arc::clone(&self.aliases);
                let write_locks = Arc::clone(&self.write_locks);
                let cleanup = Arc::clone(&self.cleanup);

                // PipelineConfig borrows durations and Copy-able timeouts
                // only, so a fresh one is cheap to assemble per thread.
                let pipeline_config = PipelineConfig {
                    git: self.config.pipeline.git.clone(),
                    cow_clone_timeout: self.config.pipeline.cow_clone_timeout,
                    git_update_index_timeout: self.config.pipeline.git_update_index_timeout,
                    git_restore_timeout: self.config.pipeline.git_restore_timeout,
                    indexing: indexing::IndexingTimeouts {
                        fix_config: self.config.pipeline.indexing.fix_config,
                        index: self.config.pipeline.indexing.index,
                        scip_generate: self.config.pipeline.indexing.scip_generate,
                    },
                };

                thread::spawn(move || {
                    let guard = alias_mutexes.for_alias(&alias);
                    let _lock = guard.lock().unwrap();

                    let pipeline = RefreshPipeline {
                        root: &root,
                        aliases: &aliases,
                        write_locks: &write_locks,
                        cleanup: &cleanup,
                        registry: &registry,
                        config: &pipeline_config,
                    };

                    match pipeline.refresh(&alias) {
                        Ok(outcome) => {
                            Logger::info(
                                "SCHEDULER_REFRESH_TICK_RESULT",
                                &[("alias", &alias), ("outcome", &format!("{:?}", outcome))],
                            );
                        }
                        Err(e) => {
                            Logger::error(
                                "SCHEDULER_REFRESH_TICK_FAILED",
                                &[("alias", &alias), ("error", &e.to_string())],
                            );
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Single composition root for a golden-repository fleet.
//!
//! Every background component (refresh scheduler, cleanup manager,
//! write-lock manager, query tracker, search orchestrator) is
//! constructed here and wired together explicitly. There is no
//! module-level global state anywhere in this crate: every function
//! that needs one of these components takes it as an argument, and
//! `LifecycleManager` is the one place that owns them all and exposes
//! a single set of handles to the process entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::alias::{AliasManager, AliasResult};
use crate::cleanup::{CleanupConfig, CleanupManager};
use crate::config::Config;
use crate::git::GitConfig;
use crate::query_tracker::QueryTracker;
use crate::registry::Registry;
use crate::scheduler::indexing::IndexingTimeouts;
use crate::scheduler::reconciliation::ReconciliationConfig;
use crate::scheduler::{PipelineConfig, RefreshOutcome, RefreshResult, RefreshScheduler, SchedulerConfig};
use crate::search::{CrossRepoSearchOrchestrator, SearchOpResult, SearchOrchestratorConfig, SearchRequest, SearchResponse};
use crate::write_lock::{WriteLockManager, WriteLockResult};

/// Owns every shared component for one golden-repository fleet and
/// exposes the operations the CLI and any future server surface need.
/// Constructed once at process startup from a validated [`Config`].
pub struct LifecycleManager {
    root: PathBuf,
    registry: Arc<Registry>,
    aliases: Arc<AliasManager>,
    write_locks: Arc<WriteLockManager>,
    query_tracker: Arc<QueryTracker>,
    cleanup: Arc<CleanupManager>,
    scheduler: Arc<RefreshScheduler>,
    search: CrossRepoSearchOrchestrator,
}

impl LifecycleManager {
    pub fn new(config: &Config) -> Self {
        let root = config.golden_repos_path();
        let registry = Arc::new(Registry::new(&root));
        let aliases = Arc::new(AliasManager::new(&root));
        let write_locks = Arc::new(WriteLockManager::new(&root));
        let query_tracker = Arc::new(QueryTracker::new());

        let cleanup = Arc::new(CleanupManager::new(
            Arc::clone(&query_tracker),
            CleanupConfig {
                check_interval: Duration::from_secs(1),
                max_failures: config.cleanup_max_failures,
                base_backoff: Duration::from_secs_f64(config.cleanup_base_backoff_seconds),
                max_backoff: Duration::from_secs_f64(config.cleanup_max_backoff_seconds),
                fd_usage_threshold: config.cleanup_fd_usage_threshold,
            },
        ));

        let scheduler_config = SchedulerConfig {
            refresh_interval: Duration::from_secs(config.refresh_interval_seconds),
            write_mode_marker_ttl: Duration::from_secs(config.write_mode_marker_ttl_seconds),
            pipeline: PipelineConfig {
                git: GitConfig {
                    fetch_timeout: Duration::from_secs(config.git_fetch_timeout_seconds),
                    pull_timeout: Duration::from_secs(config.git_pull_timeout_seconds),
                    status_timeout: Duration::from_secs(config.git_status_timeout_seconds),
                    ..GitConfig::default()
                },
                cow_clone_timeout: Duration::from_secs(config.cow_clone_timeout_seconds),
                git_update_index_timeout: Duration::from_secs(config.git_update_index_timeout_seconds),
                git_restore_timeout: Duration::from_secs(config.git_restore_timeout_seconds),
                indexing: IndexingTimeouts {
                    fix_config: Duration::from_secs(config.indexer_fix_config_timeout_seconds),
                    index: Duration::from_secs(config.indexer_index_timeout_seconds),
                    scip_generate: Duration::from_secs(config.indexer_scip_generate_timeout_seconds),
                },
            },
            reconciliation: ReconciliationConfig {
                clone_timeout: Duration::from_secs(config.cow_clone_timeout_seconds),
                fix_config_timeout: Duration::from_secs(config.indexer_fix_config_timeout_seconds),
            },
        };

        let scheduler = Arc::new(RefreshScheduler::new(
            &root,
            Arc::clone(&registry),
            Arc::clone(&aliases),
            Arc::clone(&write_locks),
            Arc::clone(&cleanup),
            scheduler_config,
        ));

        let search = CrossRepoSearchOrchestrator::new(
            Arc::clone(&aliases),
            Arc::clone(&registry),
            Arc::clone(&query_tracker),
            SearchOrchestratorConfig {
                max_workers: config.multi_search_max_workers,
                default_timeout: Duration::from_secs(config.multi_search_timeout_seconds),
            },
        );

        LifecycleManager {
            root,
            registry,
            aliases,
            write_locks,
            query_tracker,
            cleanup,
            scheduler,
            search,
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn aliases(&self) -> &Arc<AliasManager> {
        &self.aliases
    }

    /// Starts the background refresh scheduler and the cleanup loop.
    /// Idempotent; safe to call once at process startup.
    pub fn start(&self) {
        self.scheduler.start();
        self.cleanup.start();
    }

    /// Stops both background loops. Called from `Drop` as well, so
    /// an explicit call before process exit is not required but makes
    /// shutdown ordering visible in logs.
    pub fn stop(&self) {
        self.scheduler.stop();
        self.cleanup.stop();
    }

    pub fn read_alias(&self, alias: &str) -> AliasResult<Option<String>> {
        self.aliases.read_alias(alias)
    }

    pub fn trigger_refresh(&self, alias: &str) -> RefreshResult<RefreshOutcome> {
        self.scheduler.refresh_one(alias)
    }

    pub fn acquire_write_lock(&self, alias: &str, owner: &str, ttl_seconds: u64) -> WriteLockResult<bool> {
        self.write_locks.acquire(alias, owner, ttl_seconds)
    }

    pub fn release_write_lock(&self, alias: &str, owner: &str) -> WriteLockResult<bool> {
        self.write_locks.release(alias, owner)
    }

    pub fn is_write_locked(&self, alias: &str) -> WriteLockResult<bool> {
        self.write_locks.is_locked(alias)
    }

    pub fn schedule_cleanup(&self, index_path: &str) {
        self.cleanup.schedule_cleanup(index_path);
    }

    pub fn increment_query_ref(&self, index_path: &str) {
        self.query_tracker.increment_ref(index_path);
    }

    pub fn decrement_query_ref(&self, index_path: &str) {
        self.query_tracker.decrement_ref(index_path);
    }

    pub fn search(&self, request: SearchRequest) -> SearchOpResult<SearchResponse> {
        self.search.search(request)
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        self.stop();
    }
}

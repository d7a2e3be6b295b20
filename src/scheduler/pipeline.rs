//! The per-repository refresh pipeline: the core of the core.
//!
//! For a given alias, ordered, with abort semantics at each step. Any
//! exception at any step that is not explicitly handled (lock
//! contention, no-change) becomes a failed refresh, surfaced to the
//! caller so the operator sees it.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::alias::AliasManager;
use crate::cleanup::CleanupManager;
use crate::git::{GitConfig, GitUpdater};
use crate::observability::Logger;
use crate::process;
use crate::registry::Registry;
use crate::scheduler::change_detection::UpdateStrategy;
use crate::scheduler::errors::{RefreshError, RefreshOutcome, RefreshResult, SkipReason};
use crate::scheduler::indexing::{self, IndexingTimeouts};
use crate::write_lock::WriteLockManager;
use crate::{fsutil, git};

pub struct PipelineConfig {
    pub git: GitConfig,
    pub cow_clone_timeout: Duration,
    pub git_update_index_timeout: Duration,
    pub git_restore_timeout: Duration,
    pub indexing: IndexingTimeouts,
}

pub struct RefreshPipeline<'a> {
    pub root: &'a Path,
    pub aliases: &'a AliasManager,
    pub write_locks: &'a WriteLockManager,
    pub cleanup: &'a CleanupManager,
    pub registry: &'a Registry,
    pub config: &'a PipelineConfig,
}

/// Detected index subdirectories under a repository's indexed tree.
/// The specific indexer CLI owns the actual on-disk layout; this
/// reconciliation pass only needs to know presence/absence per kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexFlags {
    pub has_semantic: bool,
    pub has_fts: bool,
    pub has_temporal: bool,
    pub has_scip: bool,
}

fn scan_index_flags(target: &Path) -> IndexFlags {
    let index_root = target.join(".code-indexer").join("index");
    IndexFlags {
        has_semantic: index_root.join("semantic").exists(),
        has_fts: index_root.join("fts").exists(),
        has_temporal: index_root.join("temporal").exists(),
        has_scip: index_root.join("scip").exists(),
    }
}

/// Owner name the scheduler registers under while it holds a repository's
/// write lock for the duration of a refresh.
const REFRESH_OWNER: &str = "scheduler-refresh";

impl<'a> RefreshPipeline<'a> {
    /// Runs the full refresh pipeline for `alias`.
    pub fn refresh(&self, alias: &str) -> RefreshResult<RefreshOutcome> {
        // Step 1: resolve alias and master.
        let current_target = self
            .aliases
            .read_alias(alias)?
            .ok_or_else(|| RefreshError::AliasMissing(alias.to_string()))?;

        let repo = self
            .registry
            .get(alias)?
            .ok_or_else(|| RefreshError::AliasMissing(alias.to_string()))?;

        // Step 2: reconcile registry flags with filesystem (pre-refresh).
        self.reconcile_flags(alias, &current_target)?;

        // Step 3: write-lock gate, held for the whole pull/index/clone/
        // publish sequence below so a writer can't start mutating the
        // master tree out from under a snapshot in progress. The TTL is a
        // generous upper bound on one refresh run, not a hold duration we
        // expect to hit; it only protects against a crashed scheduler
        // leaving the lock stranded.
        if !self.write_locks.acquire(alias, REFRESH_OWNER, self.refresh_lock_ttl_seconds())? {
            Logger::info("REFRESH_SKIPPED_LOCKED", &[("alias", alias)]);
            return Ok(RefreshOutcome::Skipped(SkipReason::LockHeldByAnotherWriter));
        }

        let result = self.refresh_locked(alias, &current_target, &repo);
        let _ = self.write_locks.release(alias, REFRESH_OWNER);
        result
    }

    fn refresh_lock_ttl_seconds(&self) -> u64 {
        (self.config.cow_clone_timeout
            + self.config.git_update_index_timeout
            + self.config.git_restore_timeout
            + self.config.indexing.fix_config
            + self.config.indexing.index
            + self.config.indexing.scip_generate
            + Duration::from_secs(60))
        .as_secs()
    }

    /// Runs steps 4-11 with the write lock already held; the caller
    /// acquires and releases it around this call.
    fn refresh_locked(
        &self,
        alias: &str,
        current_target: &str,
        repo: &crate::registry::GoldenRepository,
    ) -> RefreshResult<RefreshOutcome> {
        let master_path = self.root.join(alias);

        let is_git_backed = repo
            .repo_url
            .as_deref()
            .map(git::is_git_repo_url)
            .unwrap_or(false);

        let git_updater = if is_git_backed {
            Some(GitUpdater::new(&master_path, self.config.git.clone())?)
        } else {
            None
        };

        // Steps 4/5: change detection, per repository kind.
        let versioned_dir = self.root.join(".versioned").join(alias);

        let strategy = match &git_updater {
            Some(updater) => UpdateStrategy::GitPull(updater),
            None => {
                let config_dir = master_path.join(".code-indexer");
                if !config_dir.exists() {
                    Logger::info("REFRESH_SKIPPED_NOT_INITIALIZED", &[("alias", alias)]);
                    return Ok(RefreshOutcome::Skipped(SkipReason::NotYetInitialized));
                }
                UpdateStrategy::LocalMtime {
                    master_path: master_path.clone(),
                }
            }
        };

        if !strategy.has_changes(&versioned_dir)? {
            Logger::info("REFRESH_SKIPPED_NO_CHANGES", &[("alias", alias)]);
            return Ok(RefreshOutcome::Skipped(SkipReason::NoUpstreamChanges));
        }

        if let Some(updater) = &git_updater {
            updater.update(false)?;
        }

        // Step 6: index in place on the master.
        indexing::run_indexing_pipeline(
            &master_path,
            &self.config.indexing,
            repo.enable_temporal,
            repo.enable_scip,
            !is_git_backed,
        )
        .map_err(|e| RefreshError::ValidationFailed(e.to_string()))?;

        // Step 7: snapshot via copy-on-write clone.
        let snapshot_ts = unix_seconds_now();
        let snapshot_path = versioned_dir.join(format!("v_{}", snapshot_ts));

        if let Err(e) = self.build_snapshot(&master_path, &snapshot_path, is_git_backed) {
            let _ = fsutil::robust_delete(&snapshot_path);
            return Err(e);
        }

        // Step 8: validate.
        if !scan_index_flags(&snapshot_path).has_semantic {
            let _ = fsutil::robust_delete(&snapshot_path);
            return Err(RefreshError::ValidationFailed(
                "clone's index directory is missing after snapshot".to_string(),
            ));
        }

        // Step 9: swap alias.
        self.aliases
            .swap_alias(alias, snapshot_path.to_str().unwrap_or_default(), current_target)?;

        // Step 10: schedule retirement of previous target, only under .versioned/.
        if current_target.contains("/.versioned/") {
            self.cleanup.schedule_cleanup(current_target);
        }

        // Step 11: update last_refresh; reconcile flags again.
        let _ = self.registry.set_last_refresh(alias, chrono::Utc::now());
        self.reconcile_flags(alias, snapshot_path.to_str().unwrap_or_default())?;

        Logger::info(
            "REFRESH_PUBLISHED",
            &[("alias", alias), ("snapshot", &snapshot_path.display().to_string())],
        );

        Ok(RefreshOutcome::Published {
            snapshot_path: snapshot_path.display().to_string(),
        })
    }

    fn reconcile_flags(&self, alias: &str, target: &str) -> RefreshResult<()> {
        let flags = scan_index_flags(Path::new(target));
        self.registry
            .set_feature_flags(alias, flags.has_temporal, flags.has_scip)
            .map_err(RefreshError::Registry)?;
        Ok(())
    }

    fn build_snapshot(&self, master_path: &Path, snapshot_path: &Path, is_git_backed: bool) -> RefreshResult<()> {
        fsutil::clone_snapshot(master_path, snapshot_path, self.config.cow_clone_timeout)
            .map_err(RefreshError::Clone)?;

        if is_git_backed {
            // Non-fatal: normalises timestamps, must not abort the build.
            let _ = process::run_with_timeout_in(
                "git",
                &["update-index", "--refresh"],
                self.config.git_update_index_timeout,
                Some(snapshot_path),
            );
            let _ = process::run_with_timeout_in(
                "git",
                &["restore", "."],
                self.config.git_restore_timeout,
                Some(snapshot_path),
            );
        }

        // Fatal: rewrites embedded path literals in index metadata.
        indexing::run_fix_config(snapshot_path, self.config.indexing.fix_config)
            .map_err(|e| RefreshError::ValidationFailed(e.to_string()))?;

        Ok(())
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::GoldenRepository;
    use tempfile::TempDir;

    fn default_pipeline_config() -> PipelineConfig {
        PipelineConfig {
            git: GitConfig::default(),
            cow_clone_timeout: Duration::from_secs(30),
            git_update_index_timeout: Duration::from_secs(10),
            git_restore_timeout: Duration::from_secs(10),
            indexing: IndexingTimeouts {
                fix_config: Duration::from_secs(10),
                index: Duration::from_secs(10),
                scip_generate: Duration::from_secs(10),
            },
        }
    }

    fn local_repo(alias: &str) -> GoldenRepository {
        GoldenRepository {
            alias: alias.to_string(),
            repo_name: alias.to_string(),
            repo_url: None,
            last_refresh: None,
            enable_temporal: false,
            enable_scip: false,
        }
    }

    #[test]
    fn refresh_fails_when_alias_has_no_record() {
        let dir = TempDir::new().unwrap();
        let aliases = AliasManager::new(dir.path());
        let write_locks = WriteLockManager::new(dir.path());
        let cleanup = CleanupManager::new(
            std::sync::Arc::new(crate::query_tracker::QueryTracker::new()),
            crate::cleanup::CleanupConfig::default(),
        );
        let registry = Registry::new(dir.path());
        let config = default_pipeline_config();

        let pipeline = RefreshPipeline {
            root: dir.path(),
            aliases: &aliases,
            write_locks: &write_locks,
            cleanup: &cleanup,
            registry: &registry,
            config: &config,
        };

        let result = pipeline.refresh("cidx-meta");
        assert!(matches!(result, Err(RefreshError::AliasMissing(_))));
    }

    #[test]
    fn refresh_skips_uninitialized_local_master() {
        let dir = TempDir::new().unwrap();
        let aliases = AliasManager::new(dir.path());
        let write_locks = WriteLockManager::new(dir.path());
        let cleanup = CleanupManager::new(
            std::sync::Arc::new(crate::query_tracker::QueryTracker::new()),
            crate::cleanup::CleanupConfig::default(),
        );
        let registry = Registry::new(dir.path());
        let config = default_pipeline_config();

        std::fs::create_dir_all(dir.path().join("cidx-meta")).unwrap();
        aliases
            .create_alias("cidx-meta", dir.path().join("cidx-meta").to_str().unwrap(), "cidx-meta")
            .unwrap();
        registry.register(local_repo("cidx-meta")).unwrap();

        let pipeline = RefreshPipeline {
            root: dir.path(),
            aliases: &aliases,
            write_locks: &write_locks,
            cleanup: &cleanup,
            registry: &registry,
            config: &config,
        };

        let outcome = pipeline.refresh("cidx-meta").unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped(SkipReason::NotYetInitialized));
    }

    #[test]
    fn refresh_skips_when_write_locked_by_another_owner() {
        let dir = TempDir::new().unwrap();
        let aliases = AliasManager::new(dir.path());
        let write_locks = WriteLockManager::new(dir.path());
        let cleanup = CleanupManager::new(
            std::sync::Arc::new(crate::query_tracker::QueryTracker::new()),
            crate::cleanup::CleanupConfig::default(),
        );
        let registry = Registry::new(dir.path());
        let config = default_pipeline_config();

        std::fs::create_dir_all(dir.path().join("cidx-meta")).unwrap();
        aliases
            .create_alias("cidx-meta", dir.path().join("cidx-meta").to_str().unwrap(), "cidx-meta")
            .unwrap();
        registry.register(local_repo("cidx-meta")).unwrap();
        write_locks.acquire("cidx-meta", "some_writer_service", 3600).unwrap();

        let pipeline = RefreshPipeline {
            root: dir.path(),
            aliases: &aliases,
            write_locks: &write_locks,
            cleanup: &cleanup,
            registry: &registry,
            config: &config,
        };

        let outcome = pipeline.refresh("cidx-meta").unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped(SkipReason::LockHeldByAnotherWriter));
    }
}

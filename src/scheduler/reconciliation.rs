//! Startup reconciliation: restore missing masters from their most
//! recent snapshot.
//!
//! Gated by a marker file so the pass runs exactly once per server
//! install. For every registered remote-git repository whose master
//! directory is missing, finds the highest-timestamp `v_*` snapshot
//! and performs a reverse CoW clone (snapshot → master), then runs the
//! config-rewrite pass on the restored master. Protected by the
//! write-lock under the synthetic `reconciliation` owner so a
//! concurrent scheduled refresh can't snapshot a half-restored master.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::fsutil;
use crate::observability::Logger;
use crate::registry::{GoldenRepository, Registry};
use crate::scheduler::change_detection::highest_snapshot_timestamp;
use crate::scheduler::indexing;
use crate::write_lock::WriteLockManager;

pub const RECONCILIATION_OWNER: &str = "reconciliation";
const RECONCILIATION_MARKER: &str = ".reconciliation_complete_v1";

pub struct ReconciliationConfig {
    pub clone_timeout: Duration,
    pub fix_config_timeout: Duration,
}

/// Runs the one-time startup reconciliation pass if it hasn't run yet
/// for this install. Per-repo failures are logged and skipped; the
/// completion marker is written regardless so the pass is not
/// re-attempted.
pub fn reconcile_if_needed(
    root: &Path,
    registry: &Registry,
    write_locks: &WriteLockManager,
    config: &ReconciliationConfig,
) {
    let marker_path = root.join(RECONCILIATION_MARKER);
    if marker_path.exists() {
        return;
    }

    Logger::info("RECONCILIATION_STARTING", &[]);

    let repos = match registry.list_scheduler_eligible() {
        Ok(repos) => repos,
        Err(e) => {
            Logger::error("RECONCILIATION_REGISTRY_READ_FAILED", &[("error", &e.to_string())]);
            Vec::new()
        }
    };

    for repo in repos {
        if let Err(e) = reconcile_one(root, &repo, write_locks, config) {
            Logger::error(
                "RECONCILIATION_REPO_FAILED",
                &[("alias", &repo.alias), ("error", &e)],
            );
        }
    }

    let _ = fs::write(&marker_path, b"");
    Logger::info("RECONCILIATION_COMPLETE", &[]);
}

fn reconcile_one(
    root: &Path,
    repo: &GoldenRepository,
    write_locks: &WriteLockManager,
    config: &ReconciliationConfig,
) -> Result<(), String> {
    let master_path = root.join(&repo.alias);
    if master_path.exists() {
        return Ok(());
    }

    let versioned_dir = root.join(".versioned").join(&repo.alias);
    let latest_ts = highest_snapshot_timestamp(&versioned_dir)
        .ok_or_else(|| "no snapshot available to restore from".to_string())?;
    let snapshot_path = versioned_dir.join(format!("v_{}", latest_ts));

    if !write_locks
        .acquire(&repo.alias, RECONCILIATION_OWNER, 300)
        .map_err(|e| e.to_string())?
    {
        return Err("could not acquire write lock for reconciliation".to_string());
    }

    let result = (|| -> Result<(), String> {
        fsutil::clone_snapshot(&snapshot_path, &master_path, config.clone_timeout)
            .map_err(|e| e.to_string())?;
        indexing::run_fix_config(&master_path, config.fix_config_timeout).map_err(|e| e.to_string())?;
        Ok(())
    })();

    let _ = write_locks.release(&repo.alias, RECONCILIATION_OWNER);

    result.map(|()| {
        Logger::info(
            "RECONCILIATION_REPO_RESTORED",
            &[("alias", &repo.alias), ("snapshot", &snapshot_path.display().to_string())],
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::GoldenRepository;
    use tempfile::TempDir;

    fn sample_repo(alias: &str) -> GoldenRepository {
        GoldenRepository {
            alias: alias.to_string(),
            repo_name: alias.to_string(),
            repo_url: Some("https://example.com/repo.git".to_string()),
            last_refresh: None,
            enable_temporal: false,
            enable_scip: false,
        }
    }

    #[test]
    fn skips_repo_whose_master_already_exists() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("cidx-meta")).unwrap();
        let write_locks = WriteLockManager::new(dir.path());

        let result = reconcile_one(
            dir.path(),
            &sample_repo("cidx-meta"),
            &write_locks,
            &ReconciliationConfig {
                clone_timeout: Duration::from_secs(10),
                fix_config_timeout: Duration::from_secs(10),
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn errors_when_no_snapshot_available() {
        let dir = TempDir::new().unwrap();
        let write_locks = WriteLockManager::new(dir.path());

        let result = reconcile_one(
            dir.path(),
            &sample_repo("cidx-meta"),
            &write_locks,
            &ReconciliationConfig {
                clone_timeout: Duration::from_secs(10),
                fix_config_timeout: Duration::from_secs(10),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn marker_prevents_second_run() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new(dir.path());
        let write_locks = WriteLockManager::new(dir.path());
        let config = ReconciliationConfig {
            clone_timeout: Duration::from_secs(10),
            fix_config_timeout: Duration::from_secs(10),
        };

        reconcile_if_needed(dir.path(), &registry, &write_locks, &config);
        assert!(dir.path().join(RECONCILIATION_MARKER).exists());

        // A second call must be a no-op (no panics, marker untouched).
        reconcile_if_needed(dir.path(), &registry, &write_locks, &config);
    }
}

//! Scenario: the upstream branch is force-pushed to a history that
//! diverges from the master clone's HEAD. `git pull` fails with the
//! divergent-branches message; the refresh must recover by fetching
//! and resetting to `origin/{branch}`, then continue to publish a new
//! snapshot rather than surfacing a fatal error.

mod common;

use std::time::Duration;

use goldenrepo::alias::AliasManager;
use goldenrepo::cleanup::{CleanupConfig, CleanupManager};
use goldenrepo::query_tracker::QueryTracker;
use goldenrepo::registry::{GoldenRepository, Registry};
use goldenrepo::scheduler::errors::RefreshOutcome;
use goldenrepo::scheduler::indexing::IndexingTimeouts;
use goldenrepo::scheduler::pipeline::PipelineConfig;
use goldenrepo::scheduler::RefreshPipeline;
use goldenrepo::write_lock::WriteLockManager;

use std::sync::Arc;

const ALIAS: &str = "cidx-meta";

fn default_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        git: goldenrepo::git::GitConfig::default(),
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

#[test]
fn divergent_branch_recovery_publishes_new_snapshot() {
    let _path_guard = common::PATH_MUTATION.lock().unwrap();
    let _indexer = common::FakeIndexer::install();

    let repos_root = tempfile::TempDir::new().unwrap();
    let git = common::GitFixture::new();
    std::fs::rename(git.master_dir.path(), repos_root.path().join(ALIAS)).unwrap();
    let master_path = repos_root.path().join(ALIAS);

    let aliases = AliasManager::new(repos_root.path());
    let registry = Registry::new(repos_root.path());
    let write_locks = WriteLockManager::new(repos_root.path());
    let query_tracker = Arc::new(QueryTracker::new());
    let cleanup = CleanupManager::new(Arc::clone(&query_tracker), CleanupConfig::default());

    registry
        .register(GoldenRepository {
            alias: ALIAS.to_string(),
            repo_name: ALIAS.to_string(),
            repo_url: Some("git://local-test/cidx-meta.git".to_string()),
            last_refresh: None,
            enable_temporal: false,
            enable_scip: false,
        })
        .unwrap();
    aliases.create_alias(ALIAS, master_path.to_str().unwrap(), ALIAS).unwrap();

    let config = default_pipeline_config();
    let pipeline = RefreshPipeline {
        root: repos_root.path(),
        aliases: &aliases,
        write_locks: &write_locks,
        cleanup: &cleanup,
        registry: &registry,
        config: &config,
    };

    let snapshot_v1 = match pipeline.refresh(ALIAS).unwrap() {
        RefreshOutcome::Published { snapshot_path } => snapshot_path,
        other => panic!("expected first refresh to publish, got {:?}", other),
    };

    // Diverge master_path's own HEAD from origin's.
    git.diverge(&master_path, "local_drift.txt", "upstream_drift.txt");

    let outcome = pipeline.refresh(ALIAS).unwrap();
    let snapshot_v2 = match outcome {
        RefreshOutcome::Published { snapshot_path } => snapshot_path,
        other => panic!("expected recovery to still publish a snapshot, got {:?}", other),
    };
    assert_ne!(snapshot_v1, snapshot_v2);
    assert_eq!(aliases.read_alias(ALIAS).unwrap().as_deref(), Some(snapshot_v2.as_str()));

    let status = goldenrepo::process::run_with_timeout_in(
        "git",
        &["log", "-1", "--pretty=%s"],
        Duration::from_secs(5),
        Some(&master_path),
    )
    .unwrap();
    assert_eq!(status.stdout.trim(), "divergent upstream commit");
}

//! CLI command implementations.
//!
//! Each command loads the fleet's `Config`, builds a one-shot
//! `LifecycleManager` against it, performs exactly one operation, and
//! exits. None of these commands start the background scheduler or
//! cleanup loop — that belongs to a long-running server process, which
//! is out of scope for this CLI (see spec's Non-goals on the HTTP/MCP
//! surface); the CLI is strictly an operator-facing dispatcher.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::alias::AliasManager;
use crate::config::Config;
use crate::lifecycle::LifecycleManager;
use crate::registry::GoldenRepository;
use crate::scheduler::{RefreshError, RefreshOutcome, SkipReason};
use crate::search::{ResponseFormat, SearchRequest, SearchResultsBody};

use super::args::{Command, LockAction};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point. This is the only function main.rs calls.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Register {
            config,
            alias,
            repo_name,
            url,
            enable_temporal,
            enable_scip,
        } => register(&config, &alias, &repo_name, url, enable_temporal, enable_scip),
        Command::Refresh { config, alias } => refresh(&config, &alias),
        Command::Lock { action } => lock(action),
        Command::Search {
            config,
            repositories,
            query,
            search_type,
            limit,
            timeout_seconds,
            flatten,
        } => search(&config, repositories, query, search_type, limit, timeout_seconds, flatten),
    }
}

/// Creates the golden-repos directory structure. Writes no registry
/// entries and does not start any background loop.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let root = config.golden_repos_path();

    if root.join(".registry").exists() {
        return Err(CliError::already_initialized());
    }

    fs::create_dir_all(root.join("aliases")).map_err(|e| CliError::config_error(e.to_string()))?;
    fs::create_dir_all(root.join(".versioned")).map_err(|e| CliError::config_error(e.to_string()))?;
    fs::create_dir_all(root.join(".registry")).map_err(|e| CliError::config_error(e.to_string()))?;

    write_response(json!({"initialized": true, "golden_repos_dir": config.golden_repos_dir}))?;
    Ok(())
}

fn require_initialized(root: &Path) -> CliResult<()> {
    if !root.join(".registry").exists() && !root.join("aliases").exists() {
        return Err(CliError::not_initialized());
    }
    Ok(())
}

pub fn register(
    config_path: &Path,
    alias: &str,
    repo_name: &str,
    url: Option<String>,
    enable_temporal: bool,
    enable_scip: bool,
) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let root = config.golden_repos_path();
    require_initialized(&root)?;

    let manager = LifecycleManager::new(&config);
    manager
        .registry()
        .register(GoldenRepository {
            alias: alias.to_string(),
            repo_name: repo_name.to_string(),
            repo_url: url,
            last_refresh: None,
            enable_temporal,
            enable_scip,
        })
        .map_err(|e| CliError::operation_failed(e.to_string()))?;

    // A fresh alias has nowhere to point until the first refresh
    // publishes a snapshot, so the master working tree itself is the
    // initial target — the pipeline's first run treats it the same
    // way it treats any not-yet-refreshed local repository.
    let master = root.join(alias);
    fs::create_dir_all(&master).map_err(|e| CliError::config_error(e.to_string()))?;
    let aliases = AliasManager::new(&root);
    if aliases
        .read_alias(alias)
        .map_err(|e| CliError::operation_failed(e.to_string()))?
        .is_none()
    {
        aliases
            .create_alias(alias, master.to_str().unwrap_or_default(), repo_name)
            .map_err(|e| CliError::operation_failed(e.to_string()))?;
    }

    write_response(json!({"registered": true, "alias": alias}))?;
    Ok(())
}

pub fn refresh(config_path: &Path, alias: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    require_initialized(&config.golden_repos_path())?;
    let manager = LifecycleManager::new(&config);

    match manager.trigger_refresh(alias) {
        Ok(RefreshOutcome::Published { snapshot_path }) => {
            write_response(json!({"outcome": "published", "snapshot_path": snapshot_path}))?;
            Ok(())
        }
        Ok(RefreshOutcome::Skipped(reason)) => {
            write_response(json!({"outcome": "skipped", "reason": skip_reason_str(&reason)}))?;
            Ok(())
        }
        Err(RefreshError::AliasMissing(alias)) => Err(CliError::alias_not_found(&alias)),
        Err(e) => Err(CliError::operation_failed(e.to_string())),
    }
}

fn skip_reason_str(reason: &SkipReason) -> &'static str {
    match reason {
        SkipReason::LockHeldByAnotherWriter => "lock_held_by_another_writer",
        SkipReason::NoUpstreamChanges => "no_upstream_changes",
        SkipReason::NotYetInitialized => "not_yet_initialized",
        SkipReason::NotSchedulerEligible => "not_scheduler_eligible",
    }
}

pub fn lock(action: LockAction) -> CliResult<()> {
    match action {
        LockAction::Acquire {
            config,
            alias,
            owner,
            ttl_seconds,
        } => {
            let config = Config::load(&config)?;
            require_initialized(&config.golden_repos_path())?;
            let manager = LifecycleManager::new(&config);
            let acquired = manager
                .acquire_write_lock(&alias, &owner, ttl_seconds)
                .map_err(|e| CliError::operation_failed(e.to_string()))?;
            if !acquired {
                return Err(CliError::lock_contended(format!(
                    "alias '{}' is already write-locked by another owner",
                    alias
                )));
            }
            write_response(json!({"acquired": true, "alias": alias, "owner": owner}))?;
            Ok(())
        }
        LockAction::Release { config, alias, owner } => {
            let config = Config::load(&config)?;
            require_initialized(&config.golden_repos_path())?;
            let manager = LifecycleManager::new(&config);
            let released = manager
                .release_write_lock(&alias, &owner)
                .map_err(|e| CliError::operation_failed(e.to_string()))?;
            write_response(json!({"released": released, "alias": alias}))?;
            Ok(())
        }
        LockAction::Status { config, alias } => {
            let config = Config::load(&config)?;
            require_initialized(&config.golden_repos_path())?;
            let manager = LifecycleManager::new(&config);
            let locked = manager
                .is_write_locked(&alias)
                .map_err(|e| CliError::operation_failed(e.to_string()))?;
            write_response(json!({"alias": alias, "locked": locked}))?;
            Ok(())
        }
    }
}

pub fn search(
    config_path: &Path,
    repositories: Vec<String>,
    query: String,
    search_type: String,
    limit: Option<usize>,
    timeout_seconds: Option<u64>,
    flatten: bool,
) -> CliResult<()> {
    let config = Config::load(config_path)?;
    require_initialized(&config.golden_repos_path())?;
    let manager = LifecycleManager::new(&config);

    let request = SearchRequest {
        repositories,
        query,
        search_type,
        limit,
        timeout: timeout_seconds.map(std::time::Duration::from_secs),
        response_format: if flatten { ResponseFormat::Flattened } else { ResponseFormat::ByRepo },
    };

    let response = manager.search(request).map_err(|e| CliError::operation_failed(e.to_string()))?;

    let results_json = match response.results {
        SearchResultsBody::ByRepo(by_repo) => {
            let map: serde_json::Map<String, serde_json::Value> = by_repo
                .into_iter()
                .map(|(repo, hits)| (repo, serde_json::to_value(hits).unwrap_or_else(|_| json!([]))))
                .collect();
            serde_json::Value::Object(map)
        }
        SearchResultsBody::Flattened(hits) => serde_json::to_value(hits).unwrap_or_else(|_| json!([])),
    };

    write_response(json!({
        "results": results_json,
        "metadata": {
            "total_results": response.metadata.total_results,
            "repos_searched": response.metadata.repos_searched,
            "repos_with_results": response.metadata.repos_with_results,
            "execution_time_ms": response.metadata.execution_time_ms,
        },
        "skipped": response.skipped.into_iter().map(|s| json!({"repo": s.repo, "reason": s.reason})).collect::<Vec<_>>(),
        "errors": response.errors.into_iter().map(|e| json!({"repo": e.repo, "message": e.message})).collect::<Vec<_>>(),
    }))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir) -> std::path::PathBuf {
        let config_path = dir.path().join("goldenrepo.json");
        let root = dir.path().join("golden-repos");
        let config = json!({"golden_repos_dir": root.to_string_lossy(), "refresh_interval_seconds": 60});
        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    #[test]
    fn init_creates_directory_structure() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir);
        init(&config_path).unwrap();

        let config = Config::load(&config_path).unwrap();
        assert!(config.golden_repos_path().join("aliases").exists());
        assert!(config.golden_repos_path().join(".versioned").exists());
    }

    #[test]
    fn register_requires_init() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir);
        let result = register(&config_path, "cidx-meta", "cidx-meta", None, false, false);
        assert!(result.is_err());
    }

    #[test]
    fn register_then_refresh_completes_without_error() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir);
        init(&config_path).unwrap();
        register(&config_path, "cidx-meta", "cidx-meta", None, false, false).unwrap();

        // A freshly registered local repo has no `.code-indexer` dir yet,
        // so this is expected to skip rather than fail.
        let result = refresh(&config_path, "cidx-meta");
        assert!(result.is_ok());
    }

    #[test]
    fn refresh_unknown_alias_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir);
        init(&config_path).unwrap();
        let result = refresh(&config_path, "never-registered");
        assert!(matches!(result, Err(ref e) if e.code() == &super::super::errors::CliErrorCode::AliasNotFound));
    }

    #[test]
    fn lock_acquire_then_status_then_release() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir);
        init(&config_path).unwrap();

        lock(LockAction::Acquire {
            config: config_path.clone(),
            alias: "cidx-meta".to_string(),
            owner: "alice".to_string(),
            ttl_seconds: 60,
        })
        .unwrap();

        lock(LockAction::Status {
            config: config_path.clone(),
            alias: "cidx-meta".to_string(),
        })
        .unwrap();

        lock(LockAction::Release {
            config: config_path.clone(),
            alias: "cidx-meta".to_string(),
            owner: "alice".to_string(),
        })
        .unwrap();
    }

    #[test]
    fn search_rejects_empty_repository_list() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir);
        init(&config_path).unwrap();
        let result = search(&config_path, vec![], "fn main".to_string(), "semantic".to_string(), None, None, false);
        assert!(result.is_err());
    }
}

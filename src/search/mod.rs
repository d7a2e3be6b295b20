//! Cross-repository search orchestrator.
//!
//! Fans a single query out over a list of repositories: resolves each
//! alias to its current snapshot path, skips repositories lacking the
//! requested index kind, submits the rest to a small worker pool with a
//! per-repository timeout, and aggregates partial results with
//! repository attribution. A timeout only reclaims the orchestrator's
//! wait slot — it does not attempt to interrupt the worker, which is
//! expected to carry its own process-level deadline.

pub mod errors;
pub mod pool;
pub mod types;

pub use errors::{SearchError, SearchOpResult};
pub use types::{
    ResponseFormat, SearchMetadata, SearchRequest, SearchResponse, SearchResult, SearchResultsBody,
    SearchTaskError, SkippedRepo,
};

use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::alias::AliasManager;
use crate::observability::Logger;
use crate::process;
use crate::query_tracker::QueryTracker;
use crate::registry::Registry;
use crate::search::pool::WorkerPool;

const INDEXER_BINARY: &str = "cidx";

pub struct SearchOrchestratorConfig {
    pub max_workers: usize,
    pub default_timeout: Duration,
}

impl Default for SearchOrchestratorConfig {
    fn default() -> Self {
        SearchOrchestratorConfig {
            max_workers: 2,
            default_timeout: Duration::from_secs(30),
        }
    }
}

pub struct CrossRepoSearchOrchestrator {
    aliases: Arc<AliasManager>,
    registry: Arc<Registry>,
    query_tracker: Arc<QueryTracker>,
    pool: WorkerPool,
    config: SearchOrchestratorConfig,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    file: String,
    line: u32,
    snippet: String,
    score: f64,
}

impl CrossRepoSearchOrchestrator {
    pub fn new(
        aliases: Arc<AliasManager>,
        registry: Arc<Registry>,
        query_tracker: Arc<QueryTracker>,
        config: SearchOrchestratorConfig,
    ) -> Self {
        let pool = WorkerPool::new(config.max_workers);
        CrossRepoSearchOrchestrator {
            aliases,
            registry,
            query_tracker,
            pool,
            config,
        }
    }

    pub fn search(&self, request: SearchRequest) -> SearchOpResult<SearchResponse> {
        if request.repositories.is_empty() {
            return Err(SearchError::EmptyRepositoryList);
        }

        let start = Instant::now();
        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        let known_aliases = self.known_aliases();

        let mut skipped = Vec::new();
        let mut errors = Vec::new();
        let mut pending: Vec<(String, mpsc::Receiver<Result<Vec<SearchResult>, String>>)> = Vec::new();

        for repo in &request.repositories {
            match self.aliases.read_alias(repo) {
                Ok(Some(target)) => {
                    if !has_index_kind(Path::new(&target), &request.search_type) {
                        skipped.push(SkippedRepo {
                            repo: repo.clone(),
                            reason: format!("no {} index available", request.search_type),
                        });
                        continue;
                    }

                    let (tx, rx) = mpsc::channel();
                    let tracker = Arc::clone(&self.query_tracker);
                    let query = request.query.clone();
                    let search_type = request.search_type.clone();
                    let limit = request.limit;
                    let target_for_job = target.clone();

                    self.pool.submit(move || {
                        let _guard = tracker.track(&target_for_job);
                        let outcome = run_repo_search(&target_for_job, &query, &search_type, limit, timeout);
                        let _ = tx.send(outcome);
                    });
                    pending.push((repo.clone(), rx));
                }
                Ok(None) => {
                    let message = match suggest_alias(repo, &known_aliases) {
                        Some(suggestion) => {
                            format!("repository '{}' not found; did you mean '{}'?", repo, suggestion)
                        }
                        None => format!("repository '{}' not found", repo),
                    };
                    errors.push(SearchTaskError {
                        repo: repo.clone(),
                        message,
                    });
                }
                Err(e) => errors.push(SearchTaskError {
                    repo: repo.clone(),
                    message: e.to_string(),
                }),
            }
        }

        let mut results_by_repo: HashMap<String, Vec<SearchResult>> = HashMap::new();
        for (repo, rx) in pending {
            match rx.recv_timeout(timeout) {
                Ok(Ok(mut hits)) => {
                    for hit in &mut hits {
                        hit.repo = repo.clone();
                    }
                    results_by_repo.insert(repo, hits);
                }
                Ok(Err(message)) => {
                    Logger::warn("SEARCH_TASK_FAILED", &[("repo", &repo), ("error", &message)]);
                    errors.push(SearchTaskError { repo, message });
                }
                Err(_) => {
                    let message = format!("timed out after {}s", timeout.as_secs());
                    Logger::warn("SEARCH_TASK_TIMED_OUT", &[("repo", &repo), ("timeout_s", &timeout.as_secs().to_string())]);
                    errors.push(SearchTaskError { repo, message });
                }
            }
        }

        let total_results: usize = results_by_repo.values().map(|v| v.len()).sum();
        let repos_searched = results_by_repo.len();
        let repos_with_results = results_by_repo.values().filter(|v| !v.is_empty()).count();

        let results = match request.response_format {
            ResponseFormat::ByRepo => SearchResultsBody::ByRepo(results_by_repo),
            ResponseFormat::Flattened => {
                let mut flat: Vec<SearchResult> = results_by_repo.into_values().flatten().collect();
                flat.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                if let Some(limit) = request.limit {
                    flat.truncate(limit);
                }
                SearchResultsBody::Flattened(flat)
            }
        };

        Ok(SearchResponse {
            results,
            metadata: SearchMetadata {
                total_results,
                repos_searched,
                repos_with_results,
                execution_time_ms: start.elapsed().as_millis(),
            },
            skipped,
            errors,
        })
    }

    fn known_aliases(&self) -> Vec<String> {
        self.registry
            .list_repos()
            .map(|repos| repos.into_iter().map(|r| r.alias).collect())
            .unwrap_or_default()
    }
}

fn has_index_kind(target: &Path, search_type: &str) -> bool {
    target.join(".code-indexer").join("index").join(search_type).exists()
}

fn run_repo_search(
    target: &str,
    query: &str,
    search_type: &str,
    limit: Option<usize>,
    timeout: Duration,
) -> Result<Vec<SearchResult>, String> {
    let mut args = vec![
        "query".to_string(),
        "--type".to_string(),
        search_type.to_string(),
        "--format".to_string(),
        "json".to_string(),
        query.to_string(),
    ];
    if let Some(limit) = limit {
        args.push("--limit".to_string());
        args.push(limit.to_string());
    }
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = process::run_with_timeout_in(INDEXER_BINARY, &arg_refs, timeout, Some(Path::new(target)))
        .map_err(|e| e.to_string())?;

    if !output.success() {
        return Err(output.stderr);
    }

    let hits: Vec<RawHit> =
        serde_json::from_str(&output.stdout).map_err(|e| format!("could not parse search output: {}", e))?;

    Ok(hits
        .into_iter()
        .map(|h| SearchResult {
            repo: String::new(),
            file: h.file,
            line: h.line,
            snippet: h.snippet,
            score: h.score,
        })
        .collect())
}

/// Suggests the closest known alias by edit distance, for when a
/// requested repository name doesn't resolve. Returns `None` if the
/// closest candidate is still too far to be a plausible typo.
fn suggest_alias(requested: &str, known: &[String]) -> Option<String> {
    known
        .iter()
        .map(|candidate| (candidate, strsim::levenshtein(requested, candidate)))
        .min_by_key(|(_, distance)| *distance)
        .filter(|(candidate, distance)| *distance <= (candidate.len().max(requested.len()) / 2).max(1))
        .map(|(candidate, _)| candidate.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::GoldenRepository;
    use tempfile::TempDir;

    fn orchestrator(dir: &Path) -> CrossRepoSearchOrchestrator {
        CrossRepoSearchOrchestrator::new(
            Arc::new(AliasManager::new(dir)),
            Arc::new(Registry::new(dir)),
            Arc::new(QueryTracker::new()),
            SearchOrchestratorConfig {
                max_workers: 2,
                default_timeout: Duration::from_secs(2),
            },
        )
    }

    fn sample_request(repos: Vec<&str>) -> SearchRequest {
        SearchRequest {
            repositories: repos.into_iter().map(String::from).collect(),
            query: "fn main".to_string(),
            search_type: "semantic".to_string(),
            limit: None,
            timeout: Some(Duration::from_millis(500)),
            response_format: ResponseFormat::ByRepo,
        }
    }

    #[test]
    fn rejects_empty_repository_list() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(dir.path());
        let result = orchestrator.search(sample_request(vec![]));
        assert!(matches!(result, Err(SearchError::EmptyRepositoryList)));
    }

    #[test]
    fn missing_alias_reports_error_with_suggestion() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(dir.path());
        orchestrator
            .registry
            .register(GoldenRepository {
                alias: "cidx-meta".to_string(),
                repo_name: "cidx-meta".to_string(),
                repo_url: None,
                last_refresh: None,
                enable_temporal: false,
                enable_scip: false,
            })
            .unwrap();

        let response = orchestrator.search(sample_request(vec!["cidx-met"])).unwrap();
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].message.contains("cidx-meta"));
    }

    #[test]
    fn repo_missing_requested_index_kind_is_skipped() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(dir.path());
        let aliases = AliasManager::new(dir.path());
        std::fs::create_dir_all(dir.path().join("cidx-meta")).unwrap();
        aliases
            .create_alias("cidx-meta", dir.path().join("cidx-meta").to_str().unwrap(), "cidx-meta")
            .unwrap();

        let response = orchestrator.search(sample_request(vec!["cidx-meta"])).unwrap();
        assert_eq!(response.skipped.len(), 1);
        assert_eq!(response.skipped[0].repo, "cidx-meta");
    }

    #[test]
    fn task_failure_surfaces_in_errors_when_indexer_binary_missing() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(dir.path());
        let aliases = AliasManager::new(dir.path());
        let target = dir.path().join("cidx-meta");
        std::fs::create_dir_all(target.join(".code-indexer").join("index").join("semantic")).unwrap();
        aliases
            .create_alias("cidx-meta", target.to_str().unwrap(), "cidx-meta")
            .unwrap();

        // The "cidx" binary isn't present in the test environment, so
        // the task fails to spawn and must surface as a per-repo error
        // rather than aborting the whole request.
        let response = orchestrator.search(sample_request(vec!["cidx-meta"])).unwrap();
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].repo, "cidx-meta");
    }

    #[test]
    fn suggest_alias_finds_close_typo() {
        let known = vec!["cidx-meta".to_string(), "other-repo".to_string()];
        assert_eq!(suggest_alias("cidx-met", &known), Some("cidx-meta".to_string()));
    }

    #[test]
    fn suggest_alias_none_when_nothing_close() {
        let known = vec!["cidx-meta".to_string()];
        assert_eq!(suggest_alias("zzzzzzzzzzzzzzzzzzz", &known), None);
    }
}

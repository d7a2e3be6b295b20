//! Request/response shapes for the cross-repository search orchestrator.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub repositories: Vec<String>,
    pub query: String,
    pub search_type: String,
    pub limit: Option<usize>,
    pub timeout: Option<Duration>,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Results grouped by repository, with attribution.
    ByRepo,
    /// Results flattened across repositories, sorted by score descending.
    Flattened,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub repo: String,
    pub file: String,
    pub line: u32,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SkippedRepo {
    pub repo: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct SearchTaskError {
    pub repo: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SearchMetadata {
    pub total_results: usize,
    pub repos_searched: usize,
    pub repos_with_results: usize,
    pub execution_time_ms: u128,
}

#[derive(Debug, Clone)]
pub enum SearchResultsBody {
    ByRepo(HashMap<String, Vec<SearchResult>>),
    Flattened(Vec<SearchResult>),
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: SearchResultsBody,
    pub metadata: SearchMetadata,
    pub skipped: Vec<SkippedRepo>,
    pub errors: Vec<SearchTaskError>,
}

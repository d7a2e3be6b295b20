//! Errors for the cross-repository search orchestrator itself (as
//! distinct from per-repository task failures, which are reported in
//! the response's `errors` map rather than as a `Result::Err`).

use std::fmt;

#[derive(Debug)]
pub enum SearchError {
    EmptyRepositoryList,
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::EmptyRepositoryList => write!(f, "search request named no repositories"),
        }
    }
}

impl std::error::Error for SearchError {}

pub type SearchOpResult<T> = Result<T, SearchError>;

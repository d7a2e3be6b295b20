//! Error types for git-backed repository updates.

use std::fmt;

use crate::process::ProcessError;

/// Classification of a failed `git fetch`, used by the scheduler to
/// decide between waiting out a transient failure and triggering
/// re-clone for local corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureCategory {
    /// The local object database is damaged; retrying will not help.
    Corruption,
    /// Network, DNS, or auth issue; may resolve on its own.
    Transient,
    /// Did not match a known pattern.
    Unknown,
}

impl fmt::Display for FetchFailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchFailureCategory::Corruption => "corruption",
            FetchFailureCategory::Transient => "transient",
            FetchFailureCategory::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Patterns indicating local object database corruption; these require
/// immediate re-clone because the repository cannot self-heal.
const CORRUPTION_PATTERNS: &[&str] = &[
    "Could not read",
    "pack has",
    "unresolved deltas",
    "invalid index-pack output",
    "is corrupt",
    "is empty",
    "packfile",
    "bad object",
];

/// Patterns indicating transient network/auth failures.
const TRANSIENT_PATTERNS: &[&str] = &[
    "Could not resolve host",
    "Connection refused",
    "Connection timed out",
    "Network is unreachable",
    "SSL",
    "unable to access",
    "Authentication failed",
];

/// Classifies a `git fetch` failure from its stderr output. Checks
/// corruption patterns first since they are the more actionable case.
pub fn classify_fetch_error(stderr: &str) -> FetchFailureCategory {
    for pattern in CORRUPTION_PATTERNS {
        if stderr.contains(pattern) {
            return FetchFailureCategory::Corruption;
        }
    }
    for pattern in TRANSIENT_PATTERNS {
        if stderr.contains(pattern) {
            return FetchFailureCategory::Transient;
        }
    }
    FetchFailureCategory::Unknown
}

#[derive(Debug)]
pub enum GitError {
    /// `git fetch` failed; carries the classification and raw stderr.
    FetchFailed {
        category: FetchFailureCategory,
        stderr: String,
    },
    /// Some other git subcommand (log, pull, reset, status) failed.
    CommandFailed { command: String, stderr: String },
    /// The invoking process (not git itself) could not be run or timed out.
    Process(ProcessError),
    /// The target path is not a valid repository root.
    InvalidRepoPath(String),
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitError::FetchFailed { category, stderr } => {
                write!(f, "git fetch failed (category={}): {}", category, stderr)
            }
            GitError::CommandFailed { command, stderr } => {
                write!(f, "git {} failed: {}", command, stderr)
            }
            GitError::Process(e) => write!(f, "{}", e),
            GitError::InvalidRepoPath(p) => write!(f, "repository path does not exist: {}", p),
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::Process(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProcessError> for GitError {
    fn from(e: ProcessError) -> Self {
        GitError::Process(e)
    }
}

pub type GitResult<T> = Result<T, GitError>;

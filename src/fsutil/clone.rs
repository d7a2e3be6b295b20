//! Copy-on-write snapshot cloning.
//!
//! Reconciliation needs a cheap, atomic-looking copy of a golden
//! repository's working tree to rebuild a read snapshot from. `cp
//! --reflink=auto -a` uses the filesystem's CoW support when available
//! (btrfs, xfs with reflink, overlayfs) and transparently falls back to
//! a full byte copy otherwise, so this wrapper never has to detect
//! filesystem capabilities itself.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::process::{self, ProcessError};

#[derive(Debug)]
pub enum CloneError {
    Process(ProcessError),
    SourceMissing(String),
}

impl fmt::Display for CloneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloneError::Process(e) => write!(f, "clone failed: {}", e),
            CloneError::SourceMissing(p) => write!(f, "clone source does not exist: {}", p),
        }
    }
}

impl std::error::Error for CloneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CloneError::Process(e) => Some(e),
            CloneError::SourceMissing(_) => None,
        }
    }
}

impl From<ProcessError> for CloneError {
    fn from(e: ProcessError) -> Self {
        CloneError::Process(e)
    }
}

/// Clones `source` into `dest` using reflink when the filesystem
/// supports it, otherwise a regular recursive copy. `dest` must not
/// already exist; its parent must.
pub fn clone_snapshot(source: &Path, dest: &Path, timeout: Duration) -> Result<(), CloneError> {
    if !source.exists() {
        return Err(CloneError::SourceMissing(source.display().to_string()));
    }

    let source_arg = format!("{}/.", source.display());
    process::run_with_timeout(
        "cp",
        &["--reflink=auto", "-a", &source_arg, &dest.display().to_string()],
        timeout,
    )?;

    Ok(())
}

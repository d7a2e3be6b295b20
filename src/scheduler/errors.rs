//! Refresh pipeline result and error types.
//!
//! Lock contention and "no changes" are explicitly not errors — the
//! pipeline returns `Ok` with a skip reason so the job manager (and a
//! human reading its dashboard) can tell "nothing to do" apart from
//! "something broke".

use std::fmt;

use crate::alias::AliasError;
use crate::fsutil::{CloneError, DeleteError};
use crate::git::GitError;
use crate::process::ProcessError;
use crate::registry::RegistryError;
use crate::write_lock::WriteLockError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    LockHeldByAnotherWriter,
    NotYetInitialized,
    NoUpstreamChanges,
    NotSchedulerEligible,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::LockHeldByAnotherWriter => "write lock held by another writer",
            SkipReason::NotYetInitialized => "master not yet initialized",
            SkipReason::NoUpstreamChanges => "no upstream changes",
            SkipReason::NotSchedulerEligible => "repository is not scheduler-eligible",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was built and published.
    Published { snapshot_path: String },
    /// Nothing needed doing; not a failure.
    Skipped(SkipReason),
}

#[derive(Debug)]
pub enum RefreshError {
    AliasMissing(String),
    Alias(AliasError),
    Git(GitError),
    Clone(CloneError),
    Delete(DeleteError),
    Process(ProcessError),
    Registry(RegistryError),
    WriteLock(WriteLockError),
    ValidationFailed(String),
    Io(std::io::Error),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshError::AliasMissing(alias) => write!(f, "alias '{}' has no record; cannot refresh", alias),
            RefreshError::Alias(e) => write!(f, "{}", e),
            RefreshError::Git(e) => write!(f, "{}", e),
            RefreshError::Clone(e) => write!(f, "{}", e),
            RefreshError::Delete(e) => write!(f, "{}", e),
            RefreshError::Process(e) => write!(f, "{}", e),
            RefreshError::Registry(e) => write!(f, "{}", e),
            RefreshError::WriteLock(e) => write!(f, "{}", e),
            RefreshError::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            RefreshError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for RefreshError {}

macro_rules! impl_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for RefreshError {
            fn from(e: $ty) -> Self {
                RefreshError::$variant(e)
            }
        }
    };
}

impl_from!(Alias, AliasError);
impl_from!(Git, GitError);
impl_from!(Clone, CloneError);
impl_from!(Delete, DeleteError);
impl_from!(Process, ProcessError);
impl_from!(Registry, RegistryError);
impl_from!(WriteLock, WriteLockError);
impl_from!(Io, std::io::Error);

pub type RefreshResult<T> = Result<T, RefreshError>;

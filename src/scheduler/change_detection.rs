//! Change detection for the two update strategies.
//!
//! Modeled as a small two-case variant rather than a trait object:
//! there are exactly two ways a master tree gets new content, and a
//! third is not expected to show up.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::git::GitUpdater;
use crate::scheduler::errors::{RefreshError, RefreshResult};

pub enum UpdateStrategy<'a> {
    GitPull(&'a GitUpdater),
    LocalMtime { master_path: PathBuf },
}

impl<'a> UpdateStrategy<'a> {
    /// Returns true if the source has changes not yet reflected in the
    /// most recent snapshot.
    pub fn has_changes(&self, versioned_dir: &Path) -> RefreshResult<bool> {
        // No snapshot has ever been published for this alias, git- or
        // local-backed: the first tick always produces one, regardless
        // of whether the remote has moved since the master was cloned.
        if highest_snapshot_timestamp(versioned_dir).is_none() {
            return Ok(true);
        }

        match self {
            UpdateStrategy::GitPull(updater) => Ok(updater.has_changes()?),
            UpdateStrategy::LocalMtime { master_path } => {
                Ok(local_mtime_has_changes(master_path, versioned_dir)?)
            }
        }
    }
}

/// Compares the master's maximum file mtime (skipping hidden entries)
/// against the timestamp embedded in the highest-numbered `v_{ts}`
/// directory name. No snapshots yet means changes (bootstrap case).
fn local_mtime_has_changes(master_path: &Path, versioned_dir: &Path) -> Result<bool, std::io::Error> {
    let latest_snapshot_ts = highest_snapshot_timestamp(versioned_dir);

    let Some(latest_snapshot_ts) = latest_snapshot_ts else {
        return Ok(true);
    };

    let max_mtime = max_mtime_under(master_path)?;
    let snapshot_time = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(latest_snapshot_ts);

    Ok(max_mtime
        .map(|mtime| mtime > snapshot_time)
        .unwrap_or(false))
}

/// Returns the `unix_seconds` component of the highest-numbered
/// `v_{unix_seconds}` directory under `versioned_dir`, if any exist.
pub fn highest_snapshot_timestamp(versioned_dir: &Path) -> Option<u64> {
    if !versioned_dir.is_dir() {
        return None;
    }
    std::fs::read_dir(versioned_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("v_"))
                .and_then(|ts| ts.parse::<u64>().ok())
        })
        .max()
}

fn max_mtime_under(root: &Path) -> Result<Option<SystemTime>, std::io::Error> {
    let mut max: Option<SystemTime> = None;
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() {
            if let Ok(metadata) = entry.metadata() {
                if let Ok(mtime) = metadata.modified() {
                    max = Some(max.map_or(mtime, |m| m.max(mtime)));
                }
            }
        }
    }
    Ok(max)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

impl From<std::io::Error> for RefreshError {
    fn from(e: std::io::Error) -> Self {
        RefreshError::Io(e)
    }
}

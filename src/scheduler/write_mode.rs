//! Write-mode marker eviction.
//!
//! An out-of-band protocol lets an interactive writer session mark a
//! repository as "write-mode-entered" by writing
//! `{root}/.write_mode/{alias}.json`. The scheduler periodically
//! evicts markers older than the configured TTL and releases the
//! corresponding write-lock, owned by the synthetic identity
//! `mcp_write_mode`. On startup, all markers are force-evicted
//! unconditionally since no interactive session survives a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observability::Logger;
use crate::write_lock::WriteLockManager;

pub const WRITE_MODE_OWNER: &str = "mcp_write_mode";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteModeMarker {
    pub entered_at: DateTime<Utc>,
}

pub struct WriteModeMarkers {
    dir: PathBuf,
}

impl WriteModeMarkers {
    pub fn new(root: impl AsRef<Path>) -> Self {
        WriteModeMarkers {
            dir: root.as_ref().join(".write_mode"),
        }
    }

    fn marker_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{}.json", alias))
    }

    /// Evicts every marker older than `ttl`, releasing each one's
    /// write-lock. Re-reads each marker immediately before deleting it
    /// to avoid racing a session that refreshed it in the meantime
    /// (time-of-check/time-of-use).
    pub fn evict_expired(&self, write_locks: &WriteLockManager, ttl: Duration) {
        self.for_each_marker(|alias, marker| {
            let age = Utc::now().signed_duration_since(marker.entered_at);
            if age.num_seconds() as u64 >= ttl.as_secs() {
                self.evict_one(alias, write_locks, Some(ttl));
            }
        });
    }

    /// Force-evicts every marker unconditionally, used once at process
    /// startup since no interactive session survives a restart.
    pub fn evict_all(&self, write_locks: &WriteLockManager) {
        self.for_each_marker(|alias, _marker| {
            self.evict_one(alias, write_locks, None);
        });
    }

    fn for_each_marker(&self, mut f: impl FnMut(&str, WriteModeMarker)) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(alias) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(contents) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(marker) = serde_json::from_str::<WriteModeMarker>(&contents) else {
                continue;
            };
            f(alias, marker);
        }
    }

    /// Re-reads the marker just before deleting to avoid a TOCTOU race
    /// with a session that refreshed it. `ttl` of `None` means
    /// force-evict regardless of age.
    fn evict_one(&self, alias: &str, write_locks: &WriteLockManager, ttl: Option<Duration>) {
        let path = self.marker_path(alias);
        let still_expired = match (ttl, fs::read_to_string(&path)) {
            (None, _) => true,
            (Some(ttl), Ok(contents)) => match serde_json::from_str::<WriteModeMarker>(&contents) {
                Ok(marker) => {
                    let age = Utc::now().signed_duration_since(marker.entered_at);
                    age.num_seconds() as u64 >= ttl.as_secs()
                }
                Err(_) => true,
            },
            (Some(_), Err(_)) => true,
        };

        if !still_expired {
            return;
        }

        let _ = fs::remove_file(&path);
        let _ = write_locks.release(alias, WRITE_MODE_OWNER);
        Logger::info("WRITE_MODE_MARKER_EVICTED", &[("alias", alias)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    fn write_marker(dir: &Path, alias: &str, entered_at: DateTime<Utc>) {
        fs::create_dir_all(dir.join(".write_mode")).unwrap();
        let marker = WriteModeMarker { entered_at };
        fs::write(
            dir.join(".write_mode").join(format!("{}.json", alias)),
            serde_json::to_vec(&marker).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn fresh_marker_is_not_evicted() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "cidx-meta", Utc::now());
        let markers = WriteModeMarkers::new(dir.path());
        let write_locks = WriteLockManager::new(dir.path());

        markers.evict_expired(&write_locks, Duration::from_secs(1800));
        assert!(markers.marker_path("cidx-meta").exists());
    }

    #[test]
    fn expired_marker_is_evicted_and_releases_lock() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "cidx-meta", Utc::now() - ChronoDuration::seconds(2000));
        let markers = WriteModeMarkers::new(dir.path());
        let write_locks = WriteLockManager::new(dir.path());
        write_locks.acquire("cidx-meta", WRITE_MODE_OWNER, 3600).unwrap();

        markers.evict_expired(&write_locks, Duration::from_secs(1800));

        assert!(!markers.marker_path("cidx-meta").exists());
        assert!(!write_locks.is_locked("cidx-meta").unwrap());
    }

    #[test]
    fn evict_all_removes_every_marker_regardless_of_age() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "fresh", Utc::now());
        write_marker(dir.path(), "stale", Utc::now() - ChronoDuration::seconds(10_000));
        let markers = WriteModeMarkers::new(dir.path());
        let write_locks = WriteLockManager::new(dir.path());

        markers.evict_all(&write_locks);

        assert!(!markers.marker_path("fresh").exists());
        assert!(!markers.marker_path("stale").exists());
    }
}

//! File-based named write locks for golden repository coordination.
//!
//! Each alias gets its own lock file under `.locks/{alias}.lock`,
//! created via `O_CREAT|O_EXCL` so cross-process exclusion is atomic.
//! A per-alias `Mutex` guards the TOCTOU window between the staleness
//! check and the atomic create within a single process; the lock file
//! itself is the durable guard across processes and restarts.

mod errors;
mod record;

pub use errors::{WriteLockError, WriteLockResult};
pub use record::LockRecord;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::observability::Logger;

pub const DEFAULT_TTL_SECONDS: u64 = 3600;

pub struct WriteLockManager {
    locks_dir: PathBuf,
    intra_process_guards: Mutex<HashMap<String, std::sync::Arc<Mutex<()>>>>,
}

impl WriteLockManager {
    pub fn new(golden_repos_dir: impl AsRef<Path>) -> Self {
        WriteLockManager {
            locks_dir: golden_repos_dir.as_ref().join(".locks"),
            intra_process_guards: Mutex::new(HashMap::new()),
        }
    }

    /// Non-blocking acquire. Returns `Ok(true)` on success, `Ok(false)`
    /// if the lock is already held by a live owner.
    pub fn acquire(&self, alias: &str, owner_name: &str, ttl_seconds: u64) -> WriteLockResult<bool> {
        fs::create_dir_all(&self.locks_dir)?;
        let lock_file = self.lock_file_path(alias);

        let guard_handle = self.intra_lock_for(alias);
        let guard = match guard_handle.try_lock() {
            Ok(g) => g,
            Err(_) => return Ok(false),
        };

        if lock_file.exists() && !self.evict_if_stale(&lock_file)? {
            drop(guard);
            return Ok(false);
        }

        let file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .mode(0o644)
            .open(&lock_file);

        let mut file = match file {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                drop(guard);
                return Ok(false);
            }
            Err(e) => {
                drop(guard);
                return Err(e.into());
            }
        };

        let record = LockRecord::new(owner_name, ttl_seconds);
        let body = serde_json::to_vec(&record)?;
        use std::io::Write;
        file.write_all(&body)?;

        Logger::trace(
            "WRITE_LOCK_ACQUIRED",
            &[("alias", alias), ("owner", owner_name)],
        );
        drop(guard);
        Ok(true)
    }

    /// Releases the lock. Idempotent if the lock file is already gone.
    /// Refuses (returns `Ok(false)`) if a different owner holds it.
    pub fn release(&self, alias: &str, owner_name: &str) -> WriteLockResult<bool> {
        let lock_file = self.lock_file_path(alias);
        if !lock_file.exists() {
            return Ok(true);
        }

        let record = match self.read_record(&lock_file) {
            Ok(Some(record)) => record,
            Ok(None) | Err(_) => return Ok(true),
        };

        if record.owner != owner_name {
            Logger::warn(
                "WRITE_LOCK_RELEASE_REFUSED",
                &[
                    ("alias", alias),
                    ("caller", owner_name),
                    ("actual_owner", &record.owner),
                ],
            );
            return Ok(false);
        }

        match fs::remove_file(&lock_file) {
            Ok(()) => {}
            Err(_) if !lock_file.exists() => {}
            Err(e) => return Err(e.into()),
        }

        Logger::trace(
            "WRITE_LOCK_RELEASED",
            &[("alias", alias), ("owner", owner_name)],
        );
        Ok(true)
    }

    /// Returns true if a live lock is currently held, evicting a stale
    /// one along the way.
    pub fn is_locked(&self, alias: &str) -> WriteLockResult<bool> {
        let lock_file = self.lock_file_path(alias);
        if !lock_file.exists() {
            return Ok(false);
        }
        Ok(!self.evict_if_stale(&lock_file)?)
    }

    /// Returns the lock's metadata if a live lock exists, evicting a
    /// stale one and returning `None` otherwise.
    pub fn get_lock_info(&self, alias: &str) -> WriteLockResult<Option<LockRecord>> {
        let lock_file = self.lock_file_path(alias);
        let record = match self.read_record(&lock_file)? {
            Some(r) => r,
            None => return Ok(None),
        };

        if record.is_stale() {
            let _ = fs::remove_file(&lock_file);
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn lock_file_path(&self, alias: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", alias))
    }

    fn intra_lock_for(&self, alias: &str) -> std::sync::Arc<Mutex<()>> {
        let mut guards = self.intra_process_guards.lock().unwrap();
        guards
            .entry(alias.to_string())
            .or_insert_with(|| std::sync::Arc::new(Mutex::new(())))
            .clone()
    }

    fn read_record(&self, lock_file: &Path) -> WriteLockResult<Option<LockRecord>> {
        let contents = match fs::read_to_string(lock_file) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(_) => {
                Logger::warn("WRITE_LOCK_CORRUPT_FILE", &[("path", &lock_file.display().to_string())]);
                Ok(None)
            }
        }
    }

    /// Reads `lock_file`, deleting it if stale (or corrupt). Returns
    /// true if the lock was stale/corrupt and has been removed.
    fn evict_if_stale(&self, lock_file: &Path) -> WriteLockResult<bool> {
        let record = match self.read_record(lock_file)? {
            Some(r) => r,
            None => {
                // Missing or corrupt: corrupt was already logged and
                // deletion below makes this idempotent either way.
                let _ = fs::remove_file(lock_file);
                return Ok(true);
            }
        };

        if record.is_stale() {
            Logger::info(
                "WRITE_LOCK_EVICTED_STALE",
                &[
                    ("path", &lock_file.display().to_string()),
                    ("owner", &record.owner),
                    ("pid", &record.pid.to_string()),
                ],
            );
            let _ = fs::remove_file(lock_file);
            return Ok(true);
        }

        Ok(false)
    }
}

//! Atomic pointer-swap from a stable alias name to the currently-live
//! snapshot path.
//!
//! A failed swap leaves the old target live; the new snapshot becomes
//! an orphan the caller is responsible for cleaning up (the manager
//! does not retry internally — retrying a half-failed filesystem
//! operation from inside the primitive that's supposed to be atomic
//! just hides the failure).

mod errors;
mod record;

pub use errors::{AliasError, AliasErrorKind, AliasResult};
pub use record::{AliasFile, AliasRecord};

use std::path::{Path, PathBuf};

pub struct AliasManager {
    aliases_dir: PathBuf,
}

impl AliasManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        AliasManager {
            aliases_dir: root.as_ref().join("aliases"),
        }
    }

    /// Returns the current target path for `name`, or `None` if the
    /// alias has never been created.
    pub fn read_alias(&self, name: &str) -> AliasResult<Option<String>> {
        let file = AliasFile::new(&self.aliases_dir, name);
        Ok(file.read()?.map(|record| record.target_path))
    }

    pub fn read_alias_record(&self, name: &str) -> AliasResult<Option<AliasRecord>> {
        AliasFile::new(&self.aliases_dir, name).read()
    }

    /// Creates the initial alias record. Overwrites any existing record
    /// for `name` (callers should check `read_alias` first if that
    /// matters to them).
    pub fn create_alias(&self, name: &str, target: &str, repo_name: &str) -> AliasResult<()> {
        let file = AliasFile::new(&self.aliases_dir, name);
        let record = AliasRecord::new(target, repo_name);
        file.write_atomic(&record)
    }

    /// Atomically retargets `name` from `old_target` to `new_target`.
    ///
    /// `old_target` is an expected-value check, not a locking
    /// mechanism: if the alias's recorded target no longer matches
    /// `old_target`, the swap is refused so a concurrent writer's swap
    /// is never silently clobbered.
    pub fn swap_alias(&self, name: &str, new_target: &str, old_target: &str) -> AliasResult<()> {
        let file = AliasFile::new(&self.aliases_dir, name);
        let current = file.read()?.ok_or_else(|| AliasError::not_found(name))?;

        if current.target_path != old_target {
            return Err(AliasError::write_failed(format!(
                "alias {} target changed concurrently: expected {}, found {}",
                name, old_target, current.target_path
            )));
        }

        let updated = current.retargeted(new_target);
        file.write_atomic(&updated)
    }
}

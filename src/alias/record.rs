//! On-disk alias record and its atomic-write durability mechanism.
//!
//! Each alias is a small JSON pointer file naming the currently-live
//! snapshot path plus the metadata the registry surface needs
//! (`created_at`, `last_refresh`, `repo_name`). Atomicity follows the
//! same write-temp / fsync / rename-over pattern used for crash-safe
//! marker files elsewhere in this crate: the alias is never observably
//! half-written, and a reader either sees the old target or the new
//! one, never neither.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::AliasError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasRecord {
    pub target_path: String,
    pub created_at: DateTime<Utc>,
    pub last_refresh: DateTime<Utc>,
    pub repo_name: String,
}

impl AliasRecord {
    /// Builds the initial record for a freshly-created alias: created_at
    /// and last_refresh both start at the moment of creation.
    pub fn new(target_path: impl Into<String>, repo_name: impl Into<String>) -> Self {
        let now = Utc::now();
        AliasRecord {
            target_path: target_path.into(),
            created_at: now,
            last_refresh: now,
            repo_name: repo_name.into(),
        }
    }

    /// Returns a copy retargeted to `new_target`, preserving `created_at`
    /// and `repo_name` but advancing `last_refresh`.
    pub fn retargeted(&self, new_target: impl Into<String>) -> Self {
        AliasRecord {
            target_path: new_target.into(),
            created_at: self.created_at,
            last_refresh: Utc::now(),
            repo_name: self.repo_name.clone(),
        }
    }
}

pub struct AliasFile {
    path: PathBuf,
    temp_path: PathBuf,
}

impl AliasFile {
    pub fn new(aliases_dir: &Path, alias: &str) -> Self {
        AliasFile {
            path: aliases_dir.join(format!("{}-global.json", alias)),
            temp_path: aliases_dir.join(format!("{}-global.json.tmp", alias)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes `record` atomically: temp file, fsync, rename over the
    /// live pointer, then a best-effort directory fsync so the rename
    /// itself survives a crash. Rename is the commit point.
    pub fn write_atomic(&self, record: &AliasRecord) -> Result<(), AliasError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AliasError::write_failed(format!("failed to create aliases directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| AliasError::write_failed(format!("failed to serialize alias record: {}", e)))?;

        let mut file = File::create(&self.temp_path)
            .map_err(|e| AliasError::write_failed(format!("failed to create temp alias file: {}", e)))?;
        file.write_all(content.as_bytes())
            .map_err(|e| AliasError::write_failed(format!("failed to write alias record: {}", e)))?;
        file.sync_all()
            .map_err(|e| AliasError::write_failed(format!("failed to fsync alias file: {}", e)))?;

        fs::rename(&self.temp_path, &self.path)
            .map_err(|e| AliasError::write_failed(format!("failed to atomically commit alias: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    pub fn read(&self) -> Result<Option<AliasRecord>, AliasError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| AliasError::read_failed(format!("failed to read alias file: {}", e)))?;
        let record = serde_json::from_str(&content)
            .map_err(|e| AliasError::read_failed(format!("failed to parse alias file: {}", e)))?;
        Ok(Some(record))
    }

    pub fn remove(&self) -> Result<(), AliasError> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| AliasError::write_failed(format!("failed to remove alias file: {}", e)))?;
        }
        if self.temp_path.exists() {
            let _ = fs::remove_file(&self.temp_path);
        }
        Ok(())
    }
}

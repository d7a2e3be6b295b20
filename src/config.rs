//! Global configuration for the lifecycle core.
//!
//! Loaded from a single JSON file, following the same
//! read-parse-validate flow as a boot-time config layer: everything a
//! background component needs to be tuned at deploy time lives here
//! rather than as scattered constants.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 3600;
pub const MINIMUM_REFRESH_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_WRITE_MODE_MARKER_TTL_SECONDS: u64 = 1800;

fn default_refresh_interval_seconds() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECONDS
}

fn default_write_mode_marker_ttl_seconds() -> u64 {
    DEFAULT_WRITE_MODE_MARKER_TTL_SECONDS
}

fn default_cow_clone_timeout_seconds() -> u64 {
    60
}

fn default_git_update_index_timeout_seconds() -> u64 {
    30
}

fn default_git_restore_timeout_seconds() -> u64 {
    30
}

fn default_git_fetch_timeout_seconds() -> u64 {
    30
}

fn default_git_pull_timeout_seconds() -> u64 {
    120
}

fn default_git_status_timeout_seconds() -> u64 {
    10
}

fn default_indexer_fix_config_timeout_seconds() -> u64 {
    60
}

fn default_indexer_index_timeout_seconds() -> u64 {
    900
}

fn default_indexer_scip_generate_timeout_seconds() -> u64 {
    900
}

fn default_multi_search_max_workers() -> usize {
    8
}

fn default_multi_search_timeout_seconds() -> u64 {
    30
}

fn default_cleanup_max_failures() -> u32 {
    5
}

fn default_cleanup_base_backoff_seconds() -> f64 {
    1.0
}

fn default_cleanup_max_backoff_seconds() -> f64 {
    60.0
}

fn default_cleanup_fd_usage_threshold() -> f64 {
    0.80
}

/// Top-level configuration for a golden-repository fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding all golden repository working trees.
    pub golden_repos_dir: String,

    /// How often the scheduler re-refreshes a repo, in seconds.
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,

    /// TTL for a stale write-mode marker before it is considered abandoned.
    #[serde(default = "default_write_mode_marker_ttl_seconds")]
    pub write_mode_marker_ttl_seconds: u64,

    /// Timeout for the copy-on-write clone used during reconciliation.
    #[serde(default = "default_cow_clone_timeout_seconds")]
    pub cow_clone_timeout_seconds: u64,

    #[serde(default = "default_git_update_index_timeout_seconds")]
    pub git_update_index_timeout_seconds: u64,

    #[serde(default = "default_git_restore_timeout_seconds")]
    pub git_restore_timeout_seconds: u64,

    #[serde(default = "default_git_fetch_timeout_seconds")]
    pub git_fetch_timeout_seconds: u64,

    #[serde(default = "default_git_pull_timeout_seconds")]
    pub git_pull_timeout_seconds: u64,

    #[serde(default = "default_git_status_timeout_seconds")]
    pub git_status_timeout_seconds: u64,

    /// Timeout for the external indexer's config-fix step.
    #[serde(default = "default_indexer_fix_config_timeout_seconds")]
    pub indexer_fix_config_timeout_seconds: u64,

    /// Timeout for the external indexer's full-index step.
    #[serde(default = "default_indexer_index_timeout_seconds")]
    pub indexer_index_timeout_seconds: u64,

    /// Timeout for the external indexer's SCIP-generation step.
    #[serde(default = "default_indexer_scip_generate_timeout_seconds")]
    pub indexer_scip_generate_timeout_seconds: u64,

    /// Maximum concurrent worker threads for cross-repository search.
    #[serde(default = "default_multi_search_max_workers")]
    pub multi_search_max_workers: usize,

    /// Per-repository timeout for a single search worker.
    #[serde(default = "default_multi_search_timeout_seconds")]
    pub multi_search_timeout_seconds: u64,

    /// Consecutive cleanup failures before a path's circuit breaker trips.
    #[serde(default = "default_cleanup_max_failures")]
    pub cleanup_max_failures: u32,

    /// Base delay for cleanup retry backoff, in seconds.
    #[serde(default = "default_cleanup_base_backoff_seconds")]
    pub cleanup_base_backoff_seconds: f64,

    /// Ceiling for cleanup retry backoff, in seconds.
    #[serde(default = "default_cleanup_max_backoff_seconds")]
    pub cleanup_max_backoff_seconds: f64,

    /// Fraction of the process's file-descriptor rlimit that triggers
    /// cleanup back-pressure.
    #[serde(default = "default_cleanup_fd_usage_threshold")]
    pub cleanup_fd_usage_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            golden_repos_dir: "./golden-repos".to_string(),
            refresh_interval_seconds: default_refresh_interval_seconds(),
            write_mode_marker_ttl_seconds: default_write_mode_marker_ttl_seconds(),
            cow_clone_timeout_seconds: default_cow_clone_timeout_seconds(),
            git_update_index_timeout_seconds: default_git_update_index_timeout_seconds(),
            git_restore_timeout_seconds: default_git_restore_timeout_seconds(),
            git_fetch_timeout_seconds: default_git_fetch_timeout_seconds(),
            git_pull_timeout_seconds: default_git_pull_timeout_seconds(),
            git_status_timeout_seconds: default_git_status_timeout_seconds(),
            indexer_fix_config_timeout_seconds: default_indexer_fix_config_timeout_seconds(),
            indexer_index_timeout_seconds: default_indexer_index_timeout_seconds(),
            indexer_scip_generate_timeout_seconds: default_indexer_scip_generate_timeout_seconds(),
            multi_search_max_workers: default_multi_search_max_workers(),
            multi_search_timeout_seconds: default_multi_search_timeout_seconds(),
            cleanup_max_failures: default_cleanup_max_failures(),
            cleanup_base_backoff_seconds: default_cleanup_base_backoff_seconds(),
            cleanup_max_backoff_seconds: default_cleanup_max_backoff_seconds(),
            cleanup_fd_usage_threshold: default_cleanup_fd_usage_threshold(),
        }
    }
}

impl Config {
    /// Loads and validates configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Config = serde_json::from_str(&contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes this configuration to a JSON file, pretty-printed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Parse)?;
        fs::write(path, contents).map_err(ConfigError::Io)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_seconds < MINIMUM_REFRESH_INTERVAL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "refresh_interval_seconds must be at least {} seconds, got {}",
                MINIMUM_REFRESH_INTERVAL_SECONDS, self.refresh_interval_seconds
            )));
        }
        if self.multi_search_max_workers == 0 {
            return Err(ConfigError::Invalid(
                "multi_search_max_workers must be at least 1".to_string(),
            ));
        }
        if self.cleanup_fd_usage_threshold <= 0.0 || self.cleanup_fd_usage_threshold > 1.0 {
            return Err(ConfigError::Invalid(
                "cleanup_fd_usage_threshold must be in (0.0, 1.0]".to_string(),
            ));
        }
        if self.cleanup_max_failures == 0 {
            return Err(ConfigError::Invalid(
                "cleanup_max_failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Updates and re-validates the refresh interval, mirroring the
    /// upstream "set global config" operation.
    pub fn set_refresh_interval_seconds(&mut self, seconds: u64) -> Result<(), ConfigError> {
        if seconds < MINIMUM_REFRESH_INTERVAL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "refresh interval must be at least {} seconds, got {}",
                MINIMUM_REFRESH_INTERVAL_SECONDS, seconds
            )));
        }
        self.refresh_interval_seconds = seconds;
        Ok(())
    }

    pub fn golden_repos_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.golden_repos_dir)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

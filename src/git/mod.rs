//! Git-backed update strategy for a golden repository's working tree.
//!
//! Mirrors the upstream pull-based updater: change detection via
//! `git fetch` + `git log HEAD..@{upstream}`, updates via `git pull`
//! with defense-in-depth reset of local modifications first, divergent
//! branch auto-recovery, and an explicit force-reset path that skips
//! the pull entirely.

mod errors;

pub use errors::{classify_fetch_error, FetchFailureCategory, GitError, GitResult};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::observability::Logger;
use crate::process::{self, ProcessOutput};

#[derive(Clone)]
pub struct GitConfig {
    pub fetch_timeout: Duration,
    pub pull_timeout: Duration,
    pub status_timeout: Duration,
    pub rev_parse_timeout: Duration,
    pub reset_timeout: Duration,
    pub log_timeout: Duration,
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            fetch_timeout: Duration::from_secs(30),
            pull_timeout: Duration::from_secs(120),
            status_timeout: Duration::from_secs(10),
            rev_parse_timeout: Duration::from_secs(30),
            reset_timeout: Duration::from_secs(30),
            log_timeout: Duration::from_secs(30),
        }
    }
}

/// Git-pull update strategy bound to a single repository working tree.
pub struct GitUpdater {
    repo_path: PathBuf,
    config: GitConfig,
}

impl GitUpdater {
    pub fn new(repo_path: impl Into<PathBuf>, config: GitConfig) -> GitResult<Self> {
        let repo_path = repo_path.into();
        if !repo_path.exists() {
            return Err(GitError::InvalidRepoPath(repo_path.display().to_string()));
        }
        Ok(GitUpdater { repo_path, config })
    }

    pub fn source_path(&self) -> &Path {
        &self.repo_path
    }

    /// Fetches from origin and checks whether the upstream branch has
    /// commits not yet present locally.
    pub fn has_changes(&self) -> GitResult<bool> {
        let fetch = self.run_git(&["fetch", "origin"], self.config.fetch_timeout)?;
        if !fetch.success() {
            let category = classify_fetch_error(&fetch.stderr);
            Logger::warn(
                "GIT_FETCH_FAILED",
                &[
                    ("repo_path", &self.repo_path.display().to_string()),
                    ("category", &category.to_string()),
                ],
            );
            return Err(GitError::FetchFailed {
                category,
                stderr: fetch.stderr,
            });
        }

        let log = self.run_git(
            &["log", "HEAD..@{upstream}", "--oneline"],
            self.config.log_timeout,
        )?;
        if !log.success() {
            return Err(GitError::CommandFailed {
                command: "log".to_string(),
                stderr: log.stderr,
            });
        }

        let trimmed = log.stdout.trim();
        let has_changes = !trimmed.is_empty();
        if has_changes {
            Logger::info(
                "GIT_REMOTE_CHANGES_DETECTED",
                &[
                    ("repo_path", &self.repo_path.display().to_string()),
                    ("commit_count", &trimmed.lines().count().to_string()),
                ],
            );
        }
        Ok(has_changes)
    }

    /// Updates the working tree. When `force_reset` is set, skips
    /// `git pull` entirely and resets straight to `origin/{branch}`.
    pub fn update(&self, force_reset: bool) -> GitResult<()> {
        self.reset_local_modifications_if_any()?;

        if force_reset {
            let branch = self.detect_branch();
            Logger::info(
                "GIT_FORCE_RESET",
                &[
                    ("repo_path", &self.repo_path.display().to_string()),
                    ("branch", &branch),
                ],
            );
            return self.fetch_and_reset(&branch);
        }

        Logger::info(
            "GIT_PULL_START",
            &[("repo_path", &self.repo_path.display().to_string())],
        );
        let pull = self.run_git(&["pull"], self.config.pull_timeout)?;
        if pull.success() {
            Logger::info(
                "GIT_PULL_SUCCESS",
                &[("repo_path", &self.repo_path.display().to_string())],
            );
            return Ok(());
        }

        if pull.stderr.contains("divergent branches")
            || pull.stderr.contains("Need to specify how to reconcile")
        {
            Logger::warn(
                "GIT_DIVERGENT_BRANCH",
                &[("repo_path", &self.repo_path.display().to_string())],
            );
            let branch = self.detect_branch();
            self.fetch_and_reset(&branch)?;
            Logger::info(
                "GIT_AUTO_RECOVERY_SUCCESS",
                &[
                    ("repo_path", &self.repo_path.display().to_string()),
                    ("branch", &branch),
                ],
            );
            return Ok(());
        }

        Err(GitError::CommandFailed {
            command: "pull".to_string(),
            stderr: pull.stderr,
        })
    }

    fn reset_local_modifications_if_any(&self) -> GitResult<()> {
        let status = self.run_git(&["status", "--porcelain"], self.config.status_timeout)?;
        if !status.success() || status.stdout.trim().is_empty() {
            return Ok(());
        }

        Logger::warn(
            "GIT_LOCAL_MODIFICATIONS_DETECTED",
            &[("repo_path", &self.repo_path.display().to_string())],
        );

        let reset = self.run_git(&["reset", "--hard", "HEAD"], self.config.reset_timeout)?;
        if !reset.success() {
            Logger::warn(
                "GIT_RESET_FAILED_PROCEEDING",
                &[
                    ("repo_path", &self.repo_path.display().to_string()),
                    ("stderr", &reset.stderr),
                ],
            );
        }
        Ok(())
    }

    /// Detects the current branch via `git rev-parse --abbrev-ref HEAD`,
    /// falling back to "main" on any failure or timeout.
    pub fn detect_branch(&self) -> String {
        match self.run_git(
            &["rev-parse", "--abbrev-ref", "HEAD"],
            self.config.rev_parse_timeout,
        ) {
            Ok(out) if out.success() && !out.stdout.trim().is_empty() => out.stdout.trim().to_string(),
            _ => {
                Logger::warn(
                    "GIT_BRANCH_DETECTION_FALLBACK",
                    &[("repo_path", &self.repo_path.display().to_string())],
                );
                "main".to_string()
            }
        }
    }

    fn fetch_and_reset(&self, branch: &str) -> GitResult<()> {
        let fetch = self.run_git(&["fetch", "origin"], self.config.fetch_timeout)?;
        if !fetch.success() {
            return Err(GitError::CommandFailed {
                command: "fetch".to_string(),
                stderr: fetch.stderr,
            });
        }

        let target = format!("origin/{}", branch);
        let reset = self.run_git(&["reset", "--hard", &target], self.config.reset_timeout)?;
        if !reset.success() {
            return Err(GitError::CommandFailed {
                command: "reset".to_string(),
                stderr: reset.stderr,
            });
        }
        Ok(())
    }

    fn run_git(&self, args: &[&str], timeout: Duration) -> GitResult<ProcessOutput> {
        process::run_with_timeout_in("git", args, timeout, Some(&self.repo_path)).map_err(Into::into)
    }
}

/// URL prefixes that mark a source as a remote git repository rather
/// than a local directory to index in place.
pub const GIT_URL_PREFIXES: &[&str] = &["https://", "http://", "git@", "ssh://", "git://"];

/// Returns true if `source` looks like a git remote URL rather than a
/// local filesystem path.
pub fn is_git_repo_url(source: &str) -> bool {
    GIT_URL_PREFIXES.iter().any(|prefix| source.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        process::run_with_timeout_in("git", &["init"], Duration::from_secs(5), Some(dir.path())).unwrap();
        process::run_with_timeout_in(
            "git",
            &["config", "user.email", "test@example.com"],
            Duration::from_secs(5),
            Some(dir.path()),
        )
        .unwrap();
        process::run_with_timeout_in(
            "git",
            &["config", "user.name", "Test"],
            Duration::from_secs(5),
            Some(dir.path()),
        )
        .unwrap();
        fs::write(dir.path().join("file.txt"), b"hello").unwrap();
        process::run_with_timeout_in("git", &["add", "."], Duration::from_secs(5), Some(dir.path())).unwrap();
        process::run_with_timeout_in(
            "git",
            &["commit", "-m", "init"],
            Duration::from_secs(5),
            Some(dir.path()),
        )
        .unwrap();
        dir
    }

    #[test]
    fn rejects_missing_repo_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let result = GitUpdater::new(&missing, GitConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn detect_branch_falls_back_outside_git_repo() {
        let dir = TempDir::new().unwrap();
        let updater = GitUpdater::new(dir.path(), GitConfig::default()).unwrap();
        assert_eq!(updater.detect_branch(), "main");
    }

    #[test]
    fn detect_branch_reports_current_branch() {
        let repo = init_repo();
        let updater = GitUpdater::new(repo.path(), GitConfig::default()).unwrap();
        let branch = updater.detect_branch();
        assert!(branch == "main" || branch == "master");
    }

    #[test]
    fn is_git_repo_url_recognizes_known_prefixes() {
        assert!(is_git_repo_url("https://github.com/org/repo.git"));
        assert!(is_git_repo_url("git@github.com:org/repo.git"));
        assert!(is_git_repo_url("ssh://git@host/repo.git"));
        assert!(!is_git_repo_url("/local/path/to/repo"));
        assert!(!is_git_repo_url("relative/path"));
    }
}

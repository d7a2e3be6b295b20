//! Shared fixtures for the scenario tests in this directory.
//!
//! Golden repository lifecycle tests need two kinds of harness the
//! unit tests under `src/` don't: a real local git remote to pull
//! from, and a stand-in for the external `cidx` indexer binary, which
//! is not guaranteed to be installed on a test runner. Both live here
//! so the scenario files stay focused on the behaviour under test.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use goldenrepo::process;

/// Guards every test in this crate that mutates the process-wide
/// `PATH` environment variable, so two tests installing a fake `cidx`
/// can't interleave and spawn each other's binary.
pub static PATH_MUTATION: Mutex<()> = Mutex::new(());

/// A bare git repository acting as `origin`, plus a working-tree clone
/// of it ready to serve as a golden repository's master directory.
pub struct GitFixture {
    pub bare_dir: tempfile::TempDir,
    pub master_dir: tempfile::TempDir,
}

impl GitFixture {
    /// Creates a bare origin with one commit and a clone of it.
    pub fn new() -> Self {
        let bare_dir = tempfile::TempDir::new().unwrap();
        run_git(&["init", "--bare"], bare_dir.path());

        let seed_dir = tempfile::TempDir::new().unwrap();
        run_git(&["init"], seed_dir.path());
        run_git(&["config", "user.email", "test@example.com"], seed_dir.path());
        run_git(&["config", "user.name", "Test"], seed_dir.path());
        fs::write(seed_dir.path().join("file.txt"), b"v1").unwrap();
        run_git(&["add", "."], seed_dir.path());
        run_git(&["commit", "-m", "init"], seed_dir.path());
        let branch = detect_branch(seed_dir.path());
        run_git(&["remote", "add", "origin", bare_dir.path().to_str().unwrap()], seed_dir.path());
        run_git(&["push", "origin", &branch], seed_dir.path());

        let master_dir = tempfile::TempDir::new().unwrap();
        run_git_in(
            &["clone", bare_dir.path().to_str().unwrap(), "."],
            master_dir.path(),
        );
        run_git(&["config", "user.email", "test@example.com"], master_dir.path());
        run_git(&["config", "user.name", "Test"], master_dir.path());

        GitFixture { bare_dir, master_dir }
    }

    /// Commits a new file directly to the bare origin's default
    /// branch via a throwaway clone, simulating an upstream push that
    /// never touches `master_dir`.
    pub fn push_upstream_change(&self, file_name: &str, contents: &str) {
        let scratch = tempfile::TempDir::new().unwrap();
        run_git_in(&["clone", self.bare_dir.path().to_str().unwrap(), "."], scratch.path());
        run_git(&["config", "user.email", "test@example.com"], scratch.path());
        run_git(&["config", "user.name", "Test"], scratch.path());
        fs::write(scratch.path().join(file_name), contents).unwrap();
        run_git(&["add", "."], scratch.path());
        run_git(&["commit", "-m", "upstream change"], scratch.path());
        let branch = detect_branch(scratch.path());
        run_git(&["push", "origin", &branch], scratch.path());
    }

    /// Diverges `master_path`'s branch from origin's: a local-only
    /// commit in `master_path` itself (simulating drift since the
    /// last refresh), plus an independent new commit pushed to the
    /// bare origin from a separate clone of the same ancestor. Neither
    /// side is an ancestor of the other, forcing the divergent-branch
    /// recovery path on the next pull.
    pub fn diverge(&self, master_path: &Path, local_file: &str, upstream_file: &str) {
        fs::write(master_path.join(local_file), "local drift").unwrap();
        run_git(&["add", "."], master_path);
        run_git(&["commit", "-m", "local divergent commit"], master_path);

        let scratch = tempfile::TempDir::new().unwrap();
        run_git_in(&["clone", self.bare_dir.path().to_str().unwrap(), "."], scratch.path());
        run_git(&["config", "user.email", "test@example.com"], scratch.path());
        run_git(&["config", "user.name", "Test"], scratch.path());
        let branch = detect_branch(scratch.path());
        fs::write(scratch.path().join(upstream_file), "upstream drift").unwrap();
        run_git(&["add", "."], scratch.path());
        run_git(&["commit", "-m", "divergent upstream commit"], scratch.path());
        run_git(&["push", "origin", &branch], scratch.path());
    }
}

fn detect_branch(dir: &Path) -> String {
    let out = process::run_with_timeout_in(
        "git",
        &["rev-parse", "--abbrev-ref", "HEAD"],
        Duration::from_secs(5),
        Some(dir),
    )
    .unwrap();
    out.stdout.trim().to_string()
}

fn run_git(args: &[&str], cwd: &Path) {
    run_git_in(args, cwd);
}

fn run_git_in(args: &[&str], cwd: &Path) {
    let out = process::run_with_timeout_in("git", args, Duration::from_secs(10), Some(cwd)).unwrap();
    assert!(out.success(), "git {:?} failed: {}", args, out.stderr);
}

/// Installs a fake `cidx` executable on `PATH` for the duration of the
/// returned guard. The script answers every subcommand with a
/// zero-exit, and for `query` invocations emits one canned JSON hit —
/// unless a file named `SLOW_MARKER` exists in its working directory,
/// in which case it sleeps past any reasonable per-repository search
/// timeout first. Restores the original `PATH` on drop.
pub struct FakeIndexer {
    _dir: tempfile::TempDir,
    original_path: Option<String>,
}

impl FakeIndexer {
    pub fn install() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let script_path = dir.path().join("cidx");
        fs::write(
            &script_path,
            "#!/bin/sh\n\
             if [ -f SLOW_MARKER ]; then\n\
             \tsleep 5\n\
             fi\n\
             mkdir -p .code-indexer/index/semantic .code-indexer/index/fts\n\
             echo '[{\"file\":\"src/lib.rs\",\"line\":10,\"snippet\":\"fn example() {}\",\"score\":0.9}]'\n\
             exit 0\n",
        )
        .unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        fs::set_permissions(&script_path, perms).unwrap();

        let original_path = std::env::var("PATH").ok();
        let new_path = match &original_path {
            Some(existing) => format!("{}:{}", dir.path().display(), existing),
            None => dir.path().display().to_string(),
        };
        std::env::set_var("PATH", new_path);

        FakeIndexer {
            _dir: dir,
            original_path,
        }
    }
}

impl Drop for FakeIndexer {
    fn drop(&mut self) {
        match &self.original_path {
            Some(path) => std::env::set_var("PATH", path),
            None => std::env::remove_var("PATH"),
        }
    }
}

/// Marks `target` as having a pre-built index of every kind the fake
/// indexer produces, without running it — used by tests that only
/// exercise the search orchestrator, not the refresh pipeline.
pub fn seed_index_dir(target: &Path, kinds: &[&str]) {
    for kind in kinds {
        fs::create_dir_all(target.join(".code-indexer").join("index").join(kind)).unwrap();
    }
}

pub fn touch_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

pub fn master_root(repos_root: &Path, alias: &str) -> PathBuf {
    repos_root.join(alias)
}

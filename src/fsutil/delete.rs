//! Robust recursive directory deletion.
//!
//! Plain `fs::remove_dir_all` gives up the moment any single file
//! handle open fails with EMFILE under fd pressure. This walks the
//! tree itself so a transient EMFILE can be retried after a GC-style
//! pause instead of aborting the whole deletion.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

const EMFILE_RETRY_PAUSE: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct DeleteError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for DeleteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to delete {}: {}", self.path, self.message)
    }
}

impl std::error::Error for DeleteError {}

/// Deletes `path` (a directory) as robustly as possible.
///
/// First attempts a single `remove_dir_all`. If that fails with
/// `EMFILE`, falls back to a manual bottom-up walk — files before
/// directories, pausing between directories — which tolerates
/// individual removal failures and keeps making progress. Returns an
/// error only if entries remain under `path` once the fallback is
/// exhausted.
pub fn robust_delete(path: &Path) -> Result<(), DeleteError> {
    if !path.exists() {
        return Ok(());
    }
    if !path.is_dir() {
        return Err(DeleteError {
            path: path.display().to_string(),
            message: "not a directory".to_string(),
        });
    }

    match fs::remove_dir_all(path) {
        Ok(()) => return Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EMFILE) => {
            // fall through to manual walk
        }
        Err(e) => {
            return Err(DeleteError {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }
    }

    bottom_up_delete(path);

    match fs::remove_dir(path) {
        Ok(()) => {}
        Err(_) => {}
    }

    if path.exists() {
        return Err(DeleteError {
            path: path.display().to_string(),
            message: "partial deletion: directory still exists after fallback".to_string(),
        });
    }

    Ok(())
}

fn bottom_up_delete(root: &Path) {
    let mut dirs_in_order = Vec::new();
    collect_dirs_depth_first(root, &mut dirs_in_order);

    for dir in dirs_in_order.into_iter().rev() {
        if let Ok(entries) = fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let p = entry.path();
                if p.is_dir() {
                    continue;
                }
                if let Err(e) = fs::remove_file(&p) {
                    if e.raw_os_error() == Some(libc::EMFILE) {
                        pause_for_fd_pressure();
                        let _ = fs::remove_file(&p);
                    }
                }
            }
        }
        let _ = fs::remove_dir(&dir);
        pause_for_fd_pressure();
    }
}

fn collect_dirs_depth_first(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
    out.push(dir.to_path_buf());
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let p = entry.path();
        if p.is_dir() {
            collect_dirs_depth_first(&p, out);
        }
    }
}

fn pause_for_fd_pressure() {
    thread::sleep(EMFILE_RETRY_PAUSE);
}

impl From<io::Error> for DeleteError {
    fn from(e: io::Error) -> Self {
        DeleteError {
            path: String::new(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn deletes_simple_tree() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("file.txt"), b"data").unwrap();

        robust_delete(dir.path()).unwrap();
        assert!(!dir.path().exists());
    }

    #[test]
    fn missing_path_is_ok() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(robust_delete(&missing).is_ok());
    }

    #[test]
    fn rejects_non_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"data").unwrap();
        assert!(robust_delete(&file).is_err());
    }

    #[test]
    fn deletes_deeply_nested_tree() {
        let dir = TempDir::new().unwrap();
        let mut cur = dir.path().to_path_buf();
        for i in 0..20 {
            cur = cur.join(format!("level{}", i));
            fs::create_dir_all(&cur).unwrap();
            fs::write(cur.join("marker"), b"x").unwrap();
        }
        robust_delete(dir.path()).unwrap();
        assert!(!dir.path().exists());
    }
}

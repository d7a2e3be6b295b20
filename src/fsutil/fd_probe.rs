//! File-descriptor pressure probe.
//!
//! Used by the cleanup manager to skip a cleanup cycle rather than run
//! a process out of file descriptors mid-deletion. Linux-only: counts
//! entries under `/proc/self/fd` against `RLIMIT_NOFILE`. On any other
//! platform, or if either read fails, usage is reported as low so the
//! probe never blocks cleanup where it can't be measured.

#[cfg(target_os = "linux")]
pub fn is_fd_usage_high(threshold: f64) -> bool {
    use std::fs;

    let fd_dir = "/proc/self/fd";
    if !std::path::Path::new(fd_dir).is_dir() {
        return false;
    }

    let soft_limit = match current_nofile_soft_limit() {
        Some(limit) if limit > 0 => limit,
        _ => return false,
    };

    let open_fds = match fs::read_dir(fd_dir) {
        Ok(entries) => entries.count(),
        Err(_) => return false,
    };

    (open_fds as f64 / soft_limit as f64) >= threshold
}

#[cfg(target_os = "linux")]
fn current_nofile_soft_limit() -> Option<u64> {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) };
    if rc != 0 {
        return None;
    }
    Some(rlim.rlim_cur as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn is_fd_usage_high(_threshold: f64) -> bool {
    false
}

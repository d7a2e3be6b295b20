//! On-disk lock-file record format and staleness rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub owner: String,
    pub pid: i32,
    pub acquired_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl LockRecord {
    pub fn new(owner: impl Into<String>, ttl_seconds: u64) -> Self {
        LockRecord {
            owner: owner.into(),
            pid: std::process::id() as i32,
            acquired_at: Utc::now(),
            ttl_seconds,
        }
    }

    /// A lock is stale if its owning process is dead, or its TTL has
    /// elapsed. Whichever is true first wins; a PID we cannot signal
    /// (EPERM — process exists, just not ours to kill) does not count
    /// as dead.
    pub fn is_stale(&self) -> bool {
        if pid_is_dead(self.pid) {
            return true;
        }
        let elapsed = Utc::now().signed_duration_since(self.acquired_at);
        elapsed.num_seconds() as i64 > self.ttl_seconds as i64
    }
}

/// Returns true if signalling `pid` with signal 0 fails with ESRCH
/// (no such process). This is the standard liveness probe: it does not
/// actually send a signal, just validates existence and permissions.
fn pid_is_dead(pid: i32) -> bool {
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return false;
    }
    let errno = std::io::Error::last_os_error().raw_os_error();
    errno == Some(libc::ESRCH)
}

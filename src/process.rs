//! Timeout-bounded external process invocation.
//!
//! `std::process::Command` has no built-in wall-clock timeout, so every
//! external call this crate makes (git, cp, the indexer CLI) goes
//! through here: spawn, poll `try_wait` on a short interval, and kill
//! the child if it outlives its budget.

use std::fmt;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct ProcessOutput {
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}

#[derive(Debug)]
pub enum ProcessError {
    Spawn(io::Error),
    Timeout { command: String, timeout: Duration },
    Wait(io::Error),
    Capture(io::Error),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Spawn(e) => write!(f, "failed to spawn process: {}", e),
            ProcessError::Timeout { command, timeout } => {
                write!(f, "process '{}' timed out after {:?}", command, timeout)
            }
            ProcessError::Wait(e) => write!(f, "failed to wait for process: {}", e),
            ProcessError::Capture(e) => write!(f, "failed to read process output: {}", e),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::Spawn(e) | ProcessError::Wait(e) | ProcessError::Capture(e) => Some(e),
            ProcessError::Timeout { .. } => None,
        }
    }
}

/// Runs `command` with `args`, killing it if it runs longer than
/// `timeout`. stdout/stderr are captured and returned regardless of
/// exit status; a non-zero exit is not itself an error here — callers
/// classify failures from the captured output.
pub fn run_with_timeout(
    command: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    run_with_timeout_in(command, args, timeout, None)
}

/// Same as [`run_with_timeout`] but runs the child in `cwd`.
pub fn run_with_timeout_in(
    command: &str,
    args: &[&str],
    timeout: Duration,
    cwd: Option<&std::path::Path>,
) -> Result<ProcessOutput, ProcessError> {
    let mut cmd = Command::new(command);
    cmd.args(args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;

    // A child that writes more than the OS pipe buffer before exiting
    // would block on write() forever if nothing reads the pipe until
    // after it exits, so both streams are drained concurrently on their
    // own threads rather than after `try_wait` reports completion.
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let start = Instant::now();

    loop {
        match child.try_wait().map_err(ProcessError::Wait)? {
            Some(status) => {
                return collect_output(status.code(), stdout_reader, stderr_reader);
            }
            None => {
                if start.elapsed() >= timeout {
                    kill_child(&mut child);
                    // The child is gone and its pipes are closed, so the
                    // reader threads are about to finish on their own;
                    // join them just to avoid leaking, discarding output.
                    join_reader(stdout_reader);
                    join_reader(stderr_reader);
                    return Err(ProcessError::Timeout {
                        command: command.to_string(),
                        timeout,
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<io::Result<String>> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Ok(buf)
    })
}

fn collect_output(
    status_code: Option<i32>,
    stdout_reader: Option<JoinHandle<io::Result<String>>>,
    stderr_reader: Option<JoinHandle<io::Result<String>>>,
) -> Result<ProcessOutput, ProcessError> {
    let stdout = take_reader_output(stdout_reader)?;
    let stderr = take_reader_output(stderr_reader)?;

    Ok(ProcessOutput {
        status_code,
        stdout,
        stderr,
    })
}

/// Joins a reader thread and propagates a read failure instead of
/// treating it as empty output.
fn take_reader_output(handle: Option<JoinHandle<io::Result<String>>>) -> Result<String, ProcessError> {
    match handle {
        Some(h) => match h.join() {
            Ok(result) => result.map_err(ProcessError::Capture),
            Err(_) => Ok(String::new()),
        },
        None => Ok(String::new()),
    }
}

/// Joins a reader thread without propagating its result, used when the
/// child has already been killed and its output is no longer wanted.
fn join_reader(handle: Option<JoinHandle<io::Result<String>>>) {
    if let Some(h) = handle {
        let _ = h.join();
    }
}

fn kill_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_on_success() {
        let out = run_with_timeout("echo", &["hello"], Duration::from_secs(5)).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn captures_nonzero_exit_as_ok_output() {
        let out = run_with_timeout("false", &[], Duration::from_secs(5)).unwrap();
        assert!(!out.success());
    }

    #[test]
    fn times_out_long_running_process() {
        let result = run_with_timeout("sleep", &["5"], Duration::from_millis(100));
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }

    #[test]
    fn spawn_failure_for_missing_binary() {
        let result = run_with_timeout("definitely-not-a-real-binary", &[], Duration::from_secs(1));
        assert!(matches!(result, Err(ProcessError::Spawn(_))));
    }

    #[test]
    fn drains_output_larger_than_a_pipe_buffer() {
        // A child writing well past the typical 64 KiB pipe buffer
        // before exiting must not block forever waiting for a reader —
        // the timeout here is generous precisely so that a regression
        // back to "drain only after try_wait reports exit" shows up as
        // a timeout failure instead of a slow pass.
        let out = run_with_timeout(
            "sh",
            &["-c", "yes | head -c 1000000"],
            Duration::from_secs(10),
        )
        .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.len(), 1_000_000);
    }
}

//! CLI module.
//!
//! Operator-facing dispatcher (`goldenctl`) over a golden-repository
//! fleet: `init`, `register`, `refresh`, `lock acquire|release|status`,
//! `search`. Each command is a one-shot operation; the long-running
//! scheduler/cleanup loops belong to a server process, not this CLI.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, LockAction};
pub use commands::{init, lock, refresh, register, run, run_command, search};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};

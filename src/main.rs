//! goldenctl CLI entry point.
//!
//! main.rs parses arguments and dispatches to exactly one CLI command;
//! it never calls any subsystem directly.

use std::process;

use goldenrepo::cli::{run_command, write_error, Cli};

fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run_command(cli.command) {
        let _ = write_error(e.code_str(), e.message());
        process::exit(1);
    }
}

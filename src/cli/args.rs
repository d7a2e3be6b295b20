//! CLI argument definitions using clap.
//!
//! Commands:
//! - goldenctl init --config <path>
//! - goldenctl register --config <path> --alias <alias> --repo-name <name> [--url <url>]
//! - goldenctl refresh --config <path> --alias <alias>
//! - goldenctl lock acquire|release|status --config <path> --alias <alias> [--owner <name>]
//! - goldenctl search --config <path> --repositories a,b,c --query <q> --search-type <type>

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Operator CLI for a fleet of golden source repositories.
#[derive(Parser, Debug)]
#[command(name = "goldenctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the golden-repos directory structure.
    Init {
        #[arg(long, default_value = "./goldenrepo.json")]
        config: PathBuf,
    },

    /// Register a golden repository with the fleet.
    Register {
        #[arg(long, default_value = "./goldenrepo.json")]
        config: PathBuf,
        #[arg(long)]
        alias: String,
        #[arg(long)]
        repo_name: String,
        /// Remote URL; omit for a local, writer-backed repository.
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        enable_temporal: bool,
        #[arg(long)]
        enable_scip: bool,
    },

    /// Trigger an immediate refresh of one alias, outside the scheduled tick.
    Refresh {
        #[arg(long, default_value = "./goldenrepo.json")]
        config: PathBuf,
        #[arg(long)]
        alias: String,
    },

    /// Acquire, release, or inspect a repository's write lock.
    Lock {
        #[command(subcommand)]
        action: LockAction,
    },

    /// Run a query against one or more golden repositories.
    Search {
        #[arg(long, default_value = "./goldenrepo.json")]
        config: PathBuf,
        /// Comma-separated list of aliases to search.
        #[arg(long, value_delimiter = ',')]
        repositories: Vec<String>,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "semantic")]
        search_type: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        timeout_seconds: Option<u64>,
        /// Flatten and globally sort results instead of grouping by repository.
        #[arg(long)]
        flatten: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum LockAction {
    Acquire {
        #[arg(long, default_value = "./goldenrepo.json")]
        config: PathBuf,
        #[arg(long)]
        alias: String,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 1800)]
        ttl_seconds: u64,
    },
    Release {
        #[arg(long, default_value = "./goldenrepo.json")]
        config: PathBuf,
        #[arg(long)]
        alias: String,
        #[arg(long)]
        owner: String,
    },
    Status {
        #[arg(long, default_value = "./goldenrepo.json")]
        config: PathBuf,
        #[arg(long)]
        alias: String,
    },
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

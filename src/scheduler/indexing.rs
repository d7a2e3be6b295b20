//! External indexer invocation contract.
//!
//! Indexing is delegated entirely to an external CLI; this module only
//! guarantees ordering, working directory, and timeout enforcement —
//! the specific indexer binary and its flags are an external contract.

use std::path::Path;
use std::time::Duration;

use crate::observability::Logger;
use crate::process::{self, ProcessError};

pub struct IndexingTimeouts {
    pub fix_config: Duration,
    pub index: Duration,
    pub scip_generate: Duration,
}

#[derive(Debug)]
pub struct IndexingError {
    pub stage: &'static str,
    pub detail: String,
}

impl std::fmt::Display for IndexingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "indexing stage '{}' failed: {}", self.stage, self.detail)
    }
}

impl std::error::Error for IndexingError {}

impl From<ProcessError> for IndexingError {
    fn from(e: ProcessError) -> Self {
        IndexingError {
            stage: "process",
            detail: e.to_string(),
        }
    }
}

const INDEXER_BINARY: &str = "cidx";

/// Runs the configured index builds on `master_path`, in order:
/// semantic + full-text (always), temporal (if enabled and not
/// local-only), SCIP (if enabled). Aborts on the first failure.
pub fn run_indexing_pipeline(
    master_path: &Path,
    timeouts: &IndexingTimeouts,
    enable_temporal: bool,
    enable_scip: bool,
    is_local_only: bool,
) -> Result<(), IndexingError> {
    run_stage(master_path, &["index"], timeouts.index, "semantic_index")?;
    run_stage(master_path, &["index", "--fts"], timeouts.index, "fts_index")?;

    if enable_temporal && !is_local_only {
        run_stage(
            master_path,
            &["index", "--index-commits"],
            timeouts.index,
            "temporal_index",
        )?;
    }

    if enable_scip {
        run_stage(
            master_path,
            &["scip", "generate"],
            timeouts.scip_generate,
            "scip_generate",
        )?;
    }

    Ok(())
}

/// Runs the post-clone/reconciliation config-fix pass that rewrites
/// embedded path literals in index metadata.
pub fn run_fix_config(target_path: &Path, timeout: Duration) -> Result<(), IndexingError> {
    run_stage(target_path, &["fix-config", "--force"], timeout, "fix_config")
}

fn run_stage(cwd: &Path, args: &[&str], timeout: Duration, stage: &'static str) -> Result<(), IndexingError> {
    Logger::info("INDEXING_STAGE_START", &[("stage", stage)]);
    let output = process::run_with_timeout_in(INDEXER_BINARY, args, timeout, Some(cwd))?;

    if !output.success() {
        Logger::error(
            "INDEXING_STAGE_FAILED",
            &[("stage", stage), ("stderr", &output.stderr)],
        );
        return Err(IndexingError {
            stage,
            detail: output.stderr,
        });
    }

    Logger::info("INDEXING_STAGE_SUCCESS", &[("stage", stage)]);
    Ok(())
}

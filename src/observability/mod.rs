//! Observability subsystem.
//!
//! Structured, synchronous, unbuffered JSON logging used by every
//! background component (scheduler, cleanup manager, write-lock manager,
//! search orchestrator) to report lifecycle events.
//!
//! # Principles
//!
//! 1. Observability is read-only: logging never changes control flow.
//! 2. No async, no background threads of its own.
//! 3. Deterministic field ordering so log lines are diffable.

mod logger;

pub use logger::{Logger, Severity};

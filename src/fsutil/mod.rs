//! Filesystem helpers shared by the cleanup manager and the refresh
//! scheduler: robust recursive deletion, file-descriptor back-pressure
//! detection, and copy-on-write snapshot cloning.

mod clone;
mod delete;
mod fd_probe;

pub use clone::{clone_snapshot, CloneError};
pub use delete::{robust_delete, DeleteError};
pub use fd_probe::is_fd_usage_high;

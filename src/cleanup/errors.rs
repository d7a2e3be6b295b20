//! Error type for the cleanup manager.

use std::fmt;

use crate::fsutil::DeleteError;

#[derive(Debug)]
pub enum CleanupError {
    Delete(DeleteError),
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupError::Delete(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CleanupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CleanupError::Delete(e) => Some(e),
        }
    }
}

impl From<DeleteError> for CleanupError {
    fn from(e: DeleteError) -> Self {
        CleanupError::Delete(e)
    }
}

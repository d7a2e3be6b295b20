//! Error type for the write-lock manager.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum WriteLockError {
    Io(io::Error),
    Serialize(serde_json::Error),
}

impl fmt::Display for WriteLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteLockError::Io(e) => write!(f, "write-lock I/O error: {}", e),
            WriteLockError::Serialize(e) => write!(f, "write-lock serialization error: {}", e),
        }
    }
}

impl std::error::Error for WriteLockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteLockError::Io(e) => Some(e),
            WriteLockError::Serialize(e) => Some(e),
        }
    }
}

impl From<io::Error> for WriteLockError {
    fn from(e: io::Error) -> Self {
        WriteLockError::Io(e)
    }
}

impl From<serde_json::Error> for WriteLockError {
    fn from(e: serde_json::Error) -> Self {
        WriteLockError::Serialize(e)
    }
}

pub type WriteLockResult<T> = Result<T, WriteLockError>;

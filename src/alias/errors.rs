//! Error type for the alias manager.

use std::fmt;

#[derive(Debug)]
pub enum AliasErrorKind {
    AliasNotFound,
    WriteFailed,
    ReadFailed,
}

#[derive(Debug)]
pub struct AliasError {
    pub kind: AliasErrorKind,
    pub message: String,
}

impl AliasError {
    pub fn new(kind: AliasErrorKind, message: impl Into<String>) -> Self {
        AliasError {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(alias: &str) -> Self {
        Self::new(AliasErrorKind::AliasNotFound, format!("alias not found: {}", alias))
    }

    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::new(AliasErrorKind::WriteFailed, message)
    }

    pub fn read_failed(message: impl Into<String>) -> Self {
        Self::new(AliasErrorKind::ReadFailed, message)
    }
}

impl fmt::Display for AliasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AliasError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for AliasError {}

pub type AliasResult<T> = Result<T, AliasError>;

//! CLI-specific error types.
//!
//! The CLI is a thin dispatcher: any error reaching this layer is
//! fatal for the invoked command and is reported to the caller as a
//! JSON error object on stdout plus a non-zero exit code.

use std::fmt;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout/filesystem)
    IoError,
    /// The golden-repos directory already has a registry
    AlreadyInitialized,
    /// The golden-repos directory has not been initialized
    NotInitialized,
    /// A requested alias has no registry record
    AliasNotFound,
    /// A write lock is held by another owner
    LockContended,
    /// The underlying component rejected the operation
    OperationFailed,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "GOLDEN_CLI_CONFIG_ERROR",
            Self::IoError => "GOLDEN_CLI_IO_ERROR",
            Self::AlreadyInitialized => "GOLDEN_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "GOLDEN_CLI_NOT_INITIALIZED",
            Self::AliasNotFound => "GOLDEN_CLI_ALIAS_NOT_FOUND",
            Self::LockContended => "GOLDEN_CLI_LOCK_CONTENDED",
            Self::OperationFailed => "GOLDEN_CLI_OPERATION_FAILED",
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized() -> Self {
        Self::new(CliErrorCode::AlreadyInitialized, "golden-repos directory already initialized")
    }

    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "golden-repos directory not initialized. Run 'goldenctl init' first.",
        )
    }

    pub fn alias_not_found(alias: &str) -> Self {
        Self::new(CliErrorCode::AliasNotFound, format!("no repository registered under alias '{}'", alias))
    }

    pub fn lock_contended(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::LockContended, msg)
    }

    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::OperationFailed, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<crate::config::ConfigError> for CliError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;

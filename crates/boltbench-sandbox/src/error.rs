//! Error types for sandbox operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during sandbox operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The runtime never finished booting
    #[error("sandbox runtime is not available: {0}")]
    Unavailable(String),

    /// The process could not be started
    #[error("failed to spawn '{program}': {message}")]
    SpawnFailed { program: String, message: String },

    /// The process was started but its exit status could not be collected
    #[error("process wait failed: {0}")]
    WaitFailed(String),

    /// Failed to create a directory
    #[error("failed to create directory '{path}': {message}")]
    MkdirFailed { path: PathBuf, message: String },

    /// Failed to write file
    #[error("failed to write file '{path}': {message}")]
    WriteFailed { path: PathBuf, message: String },

    /// Path is outside the workspace
    #[error("path '{path}' is outside the workspace")]
    PathOutsideWorkspace { path: PathBuf },

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    pub fn spawn_failed(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            message: message.into(),
        }
    }

    pub fn mkdir_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MkdirFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SandboxError::spawn_failed("jsh", "not found");
        assert_eq!(err.to_string(), "failed to spawn 'jsh': not found");

        let err = SandboxError::write_failed("/home/project/a.txt", "read-only");
        assert!(err.to_string().contains("/home/project/a.txt"));
    }
}

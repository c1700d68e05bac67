//! Error types for the core crate.

use boltbench_sandbox::SandboxError;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Runner error.
    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),

    /// Sandbox error.
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// IO error while reading or writing config files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An action arrived for an artifact that was never registered.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },

    /// Invalid path (e.g., could not determine config directory).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Action runner errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// `run_action` for an id that was never added.
    #[error("action not found: {0}")]
    ActionNotFound(String),

    /// The runner's worker has stopped.
    #[error("runner for artifact {0} is closed")]
    Closed(String),

    /// A shell action exited non-zero and the runner treats that as failure.
    #[error("command exited with code {0}")]
    NonZeroExit(i32),

    /// The sandbox rejected an operation.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::ArtifactNotFound("a1".to_string());
        assert_eq!(err.to_string(), "artifact not found: a1");

        let err: CoreError = RunnerError::ActionNotFound("msg_1:0".to_string()).into();
        assert_eq!(err.to_string(), "runner error: action not found: msg_1:0");
    }

    #[test]
    fn test_sandbox_error_is_transparent_in_runner() {
        let err: RunnerError = SandboxError::Unavailable("boot failed".to_string()).into();
        assert_eq!(
            err.to_string(),
            SandboxError::Unavailable("boot failed".to_string()).to_string()
        );
    }
}

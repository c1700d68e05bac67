//! Validation errors for action descriptors.

use thiserror::Error;

/// Reasons an action cannot be finalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A `file` action without a usable `filePath`.
    #[error("file action is missing a filePath")]
    MissingFilePath,

    /// A `shell` action whose command is empty after trimming.
    #[error("shell action has no command")]
    EmptyCommand,

    /// The `type` attribute names no known action.
    #[error("unknown action type: {0:?}")]
    UnknownType(String),
}

/// Result type for descriptor construction.
pub type DescriptorResult<T> = Result<T, DescriptorError>;

//! Errors raised by the utility layer.

use thiserror::Error;

/// Result alias for utility operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The global tracing subscriber could not be installed.
    #[error("could not initialize logging: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_error_message() {
        let err = Error::Logging("a global default trace dispatcher has already been set".into());
        assert!(err.to_string().starts_with("could not initialize logging"));
        assert!(err.to_string().ends_with("has already been set"));
    }
}

//! Tracing subscriber setup.
//!
//! Logs are written to stderr; stdout belongs to command output. `RUST_LOG`
//! takes precedence over the configured level.

use crate::error::{Error, Result};
use std::io::IsTerminal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Minimum level that is logged when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by [`EnvFilter`].
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Install the stderr formatter. Without it events are filtered but dropped.
    pub print: bool,
    pub level: LogLevel,
    /// Add file and line to every event.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            print: true,
            level: LogLevel::default(),
            include_location: false,
        }
    }
}

/// Install the global subscriber. Fails with [`Error::Logging`] if one is
/// already installed.
pub fn init(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.print {
        let stderr = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(config.include_location)
            .with_file(config.include_location)
            .with_line_number(config.include_location);
        registry.with(stderr).try_init()
    } else {
        registry.try_init()
    };

    installed.map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::default(), LogLevel::Warn);
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogLevel::Error.as_str(), "error");
    }

    #[test]
    fn test_init_only_once() {
        let first = init(LogConfig {
            print: false,
            ..Default::default()
        });
        let second = init(LogConfig::default());
        // Another test in this binary may have installed a subscriber first.
        assert!(first.is_err() || second.is_err());
        if let Err(e) = second {
            assert!(matches!(e, Error::Logging(_)));
        }
    }
}

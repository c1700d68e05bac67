//! Logging initialization.
//!
//! Logs go to stderr so stdout stays clean for rendered transcripts and
//! JSON output.

use boltbench_util::{LogConfig, LogLevel};

/// Initialize logging at the configured level, or debug with `verbose`.
/// `RUST_LOG` overrides both.
pub fn init_logging(verbose: bool, level: LogLevel) {
    let config = LogConfig {
        print: true,
        level: if verbose { LogLevel::Debug } else { level },
        include_location: verbose,
    };

    if let Err(e) = boltbench_util::log::init(config) {
        eprintln!("Warning: Could not initialize logging: {e}");
    }
}

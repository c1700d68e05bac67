//! RAII timing for action execution.
//!
//! ```rust,ignore
//! use boltbench_util::timing::TimingGuard;
//!
//! async fn execute(action_id: &str) {
//!     let _timing = TimingGuard::action(action_id);
//!     // ... write the file or wait for the shell ...
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Logs the elapsed time of an operation when dropped.
///
/// Fast operations log at `debug`, anything past the info threshold at
/// `info`, and anything past the warn threshold at `warn`.
pub struct TimingGuard {
    operation_type: &'static str,
    operation_name: String,
    start: Instant,
    info_threshold: Duration,
    warn_threshold: Duration,
}

impl TimingGuard {
    /// Start timing an operation.
    pub fn new(operation_type: &'static str, operation_name: impl Into<String>) -> Self {
        Self {
            operation_type,
            operation_name: operation_name.into(),
            start: Instant::now(),
            info_threshold: Duration::from_secs(1),
            warn_threshold: Duration::from_secs(60),
        }
    }

    /// Start timing a runner action.
    pub fn action(action_id: impl Into<String>) -> Self {
        Self::new("action", action_id)
    }

    pub fn with_info_threshold(mut self, threshold: Duration) -> Self {
        self.info_threshold = threshold;
        self
    }

    pub fn with_warn_threshold(mut self, threshold: Duration) -> Self {
        self.warn_threshold = threshold;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

fn format_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    match ms {
        0..=999 => format!("{ms}ms"),
        1_000..=59_999 => format!("{:.2}s", elapsed.as_secs_f64()),
        _ => format!("{}m {:.1}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0),
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let duration = format_duration(elapsed);
        let duration_ms = elapsed.as_millis() as u64;
        let name = self.operation_name.as_str();

        if elapsed >= self.warn_threshold {
            warn!(
                operation_type = self.operation_type,
                operation_name = %name,
                duration_ms,
                %duration,
                "Slow operation completed"
            );
        } else if elapsed >= self.info_threshold {
            info!(
                operation_type = self.operation_type,
                operation_name = %name,
                duration_ms,
                %duration,
                "Operation completed"
            );
        } else {
            debug!(
                operation_type = self.operation_type,
                operation_name = %name,
                duration_ms,
                %duration,
                "Operation completed"
            );
        }
    }
}

//! Shared utilities for boltbench.
//!
//! This crate provides common utilities used across the boltbench workspace:
//! - Error handling patterns
//! - Deterministic action identifiers
//! - Logging setup with tracing
//! - RAII-based timing for action execution

pub mod error;
pub mod id;
pub mod log;
pub mod timing;

pub use error::{Error, Result};
pub use id::Identifier;
pub use log::{LogConfig, LogLevel};
pub use timing::TimingGuard;

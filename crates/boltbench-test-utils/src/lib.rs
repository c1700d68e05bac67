//! Testing utilities, fixtures, and mocks for boltbench.
//!
//! - **Sandbox**: scripted in-memory sandbox that records every call
//! - **Fixtures**: temporary projects and assistant transcripts
//! - **Chunks**: growing-prefix helpers for streaming parser tests
//! - **Assertions**: diffs and status lifecycle checks
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use boltbench_test_utils::{chunks, fixtures::transcripts, MockSandbox};
//!
//! #[tokio::test]
//! async fn test_streamed_transcript() {
//!     let sandbox = MockSandbox::new();
//!     let workbench =
//!         Workbench::new(sandbox.handle(), RunnerConfig::default(), Default::default());
//!
//!     for prefix in chunks::sized_prefixes(transcripts::SIMPLE, 7) {
//!         // feed `prefix` to the parser
//!     }
//! }
//! ```

pub mod assertions;
pub mod chunks;
pub mod fixtures;
pub mod sandbox;

pub use fixtures::{transcripts, TestProject};
pub use sandbox::{CommandScript, MockOp, MockSandbox, RecordedCall, KILLED_EXIT_CODE};

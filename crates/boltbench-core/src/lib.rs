//! Core logic for boltbench.
//!
//! This crate turns streamed assistant messages into workspace changes:
//! - Streaming parser for `<boltArtifact>`/`<boltAction>` markup
//! - Per-artifact action runners executing against a sandbox
//! - Workbench coordinator owning artifacts, editor and file state
//! - Event bus for status, output and file notifications
//! - Configuration management (multi-source, JSONC support)

pub mod bus;
pub mod config;
pub mod editor;
pub mod error;
pub mod parser;
pub mod runner;
pub mod scanner;
pub mod store;
pub mod workbench;

pub use bus::{ActionOutput, ActionStatusChanged, ArtifactUpdated, Bus, BusEvent, FileWritten};
pub use config::Config;
pub use editor::{EditorDocument, EditorStore, FileStore, WorkbenchView};
pub use error::{ConfigError, CoreError, CoreResult, RunnerError, RunnerResult};
pub use parser::{
    EventLog, ParsedMessages, ParserCallbacks, ParserEvent, ParserOptions, StreamingMessageParser,
};
pub use runner::{ActionCompletion, ActionRunner, ActionState, RunnerConfig, RunnerContext};
pub use store::MapStore;
pub use workbench::{
    ArtifactState, ArtifactUpdate, ParserBridge, Workbench, WorkbenchCallbacks, WorkbenchOptions,
};

pub use boltbench_protocol::{
    Action, ActionDescriptor, ActionStatus, ActionType, ArtifactDescriptor,
};

//! Sandboxed runtime interface for boltbench actions.
//!
//! Actions never touch the host directly. They go through a
//! [`SandboxRuntime`], which exposes the three operations the action runner
//! needs:
//!
//! - `mkdir` (recursive directory creation)
//! - `write_file`
//! - `spawn`, returning a [`SpawnedProcess`] with input/output streams, an
//!   exit future and a kill switch
//!
//! The runtime is booted once and shared through a [`SandboxHandle`]; every
//! component awaits the same handle instead of booting its own runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use boltbench_sandbox::{PassthroughRuntime, SandboxHandle, SandboxRuntime, SpawnOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = SandboxHandle::ready(Arc::new(PassthroughRuntime::new(
//!         "/tmp/checkout",
//!         "/home/project",
//!     )));
//!
//!     let sandbox = handle.get().await?;
//!     sandbox.write_file("/home/project/hello.txt".as_ref(), b"hi\n").await?;
//!
//!     let process = sandbox
//!         .spawn("sh", &["-c".into(), "cat hello.txt".into()], SpawnOptions::default())
//!         .await?;
//!     let exit_code = process.exit.await?;
//!     println!("exit: {exit_code}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod path;
pub mod runtime;

pub use config::{ShellConfig, DEFAULT_WORKDIR};
pub use error::{SandboxError, SandboxResult};
pub use path::PathMapper;
pub use runtime::{PassthroughRuntime, SandboxHandle};

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Options for [`SandboxRuntime::spawn`].
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    /// Working directory (sandbox path). Defaults to the runtime workdir.
    pub cwd: Option<PathBuf>,
}

type KillFn = Box<dyn FnOnce() + Send>;

/// A process started inside the sandbox.
///
/// `output` yields chunks of combined stdout/stderr as they arrive and closes
/// when the process is gone. `exit` resolves with the exit code.
pub struct SpawnedProcess {
    /// Writes to the process stdin.
    pub input: mpsc::Sender<String>,
    /// Combined output stream.
    pub output: mpsc::Receiver<String>,
    /// Resolves with the exit code.
    pub exit: BoxFuture<'static, SandboxResult<i32>>,
    kill: Option<KillFn>,
}

impl SpawnedProcess {
    pub fn new<F, K>(
        input: mpsc::Sender<String>,
        output: mpsc::Receiver<String>,
        exit: F,
        kill: K,
    ) -> Self
    where
        F: Future<Output = SandboxResult<i32>> + Send + 'static,
        K: FnOnce() + Send + 'static,
    {
        Self {
            input,
            output,
            exit: Box::pin(exit),
            kill: Some(Box::new(kill)),
        }
    }

    /// Kill the process. Only the first call reaches the runtime; returns
    /// whether this call was that one.
    pub fn kill(&mut self) -> bool {
        match self.kill.take() {
            Some(kill) => {
                kill();
                true
            }
            None => false,
        }
    }

    pub fn is_killed(&self) -> bool {
        self.kill.is_none()
    }
}

impl fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("killed", &self.is_killed())
            .finish_non_exhaustive()
    }
}

/// Trait for sandbox runtime implementations.
///
/// Paths are sandbox paths: absolute, under [`SandboxRuntime::workdir`] for
/// anything an action writes.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Get the unique identifier for this sandbox instance.
    fn id(&self) -> &str;

    /// Workspace directory inside the sandbox.
    fn workdir(&self) -> &Path;

    /// Create a directory. With `recursive`, parents are created and an
    /// existing directory is not an error.
    async fn mkdir(&self, path: &Path, recursive: bool) -> SandboxResult<()>;

    /// Write a file, replacing any previous content.
    async fn write_file(&self, path: &Path, content: &[u8]) -> SandboxResult<()>;

    /// Start `program` with `args`.
    async fn spawn(
        &self,
        program: &str,
        args: &[String],
        options: SpawnOptions,
    ) -> SandboxResult<SpawnedProcess>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_kill_reaches_runtime_once() {
        let kills = Arc::new(AtomicUsize::new(0));
        let counter = kills.clone();
        let (input, _input_rx) = mpsc::channel(1);
        let (_output_tx, output) = mpsc::channel(1);

        let mut process = SpawnedProcess::new(input, output, async { Ok(0) }, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!process.is_killed());
        assert!(process.kill());
        assert!(!process.kill());
        assert!(process.is_killed());
        assert_eq!(kills.load(Ordering::SeqCst), 1);
        assert_eq!(process.exit.await.unwrap(), 0);
    }
}

//! Sandbox runtime implementations and the shared runtime handle.
//!
//! - `passthrough`: runs commands on the host inside a project directory

pub mod passthrough;

use crate::{SandboxError, SandboxResult, SandboxRuntime};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

pub use passthrough::PassthroughRuntime;

type BootOutput = Result<Arc<dyn SandboxRuntime>, String>;

/// A runtime that is booted once and awaited by everyone who needs it.
///
/// Cloning the handle is cheap; all clones resolve to the same runtime (or
/// the same boot failure).
///
/// ```rust,no_run
/// use boltbench_sandbox::{PassthroughRuntime, SandboxHandle, SandboxRuntime};
/// use std::sync::Arc;
///
/// # async fn demo() -> boltbench_sandbox::SandboxResult<()> {
/// let handle = SandboxHandle::new(async {
///     let runtime: Arc<dyn SandboxRuntime> =
///         Arc::new(PassthroughRuntime::new("/tmp/checkout", "/home/project"));
///     Ok(runtime)
/// });
///
/// let a = handle.get().await?;
/// let b = handle.clone().get().await?;
/// assert_eq!(a.id(), b.id());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SandboxHandle {
    inner: Shared<BoxFuture<'static, BootOutput>>,
}

impl SandboxHandle {
    /// Create a handle from a boot future. The future runs on first `get`.
    pub fn new<F>(boot: F) -> Self
    where
        F: Future<Output = SandboxResult<Arc<dyn SandboxRuntime>>> + Send + 'static,
    {
        let inner = async move {
            match boot.await {
                Ok(runtime) => {
                    debug!(id = runtime.id(), "Sandbox runtime booted");
                    Ok(runtime)
                }
                Err(e) => {
                    error!(error = %e, "Sandbox runtime failed to boot");
                    Err(e.to_string())
                }
            }
        }
        .boxed()
        .shared();

        Self { inner }
    }

    /// A handle for an already running runtime.
    pub fn ready(runtime: Arc<dyn SandboxRuntime>) -> Self {
        Self::new(async move { Ok(runtime) })
    }

    /// Wait for the runtime.
    pub async fn get(&self) -> SandboxResult<Arc<dyn SandboxRuntime>> {
        self.inner.clone().await.map_err(SandboxError::Unavailable)
    }

    /// The runtime, if booting already finished successfully.
    pub fn try_get(&self) -> Option<Arc<dyn SandboxRuntime>> {
        self.inner.peek().and_then(|out| out.as_ref().ok().cloned())
    }
}

impl fmt::Debug for SandboxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.peek() {
            None => "booting",
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("SandboxHandle").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_boot_runs_once() {
        let boots = Arc::new(AtomicUsize::new(0));
        let counter = boots.clone();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let handle = SandboxHandle::new(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let runtime: Arc<dyn SandboxRuntime> =
                Arc::new(PassthroughRuntime::new(root, "/home/project"));
            Ok(runtime)
        });
        assert!(handle.try_get().is_none());

        let first = handle.get().await.unwrap();
        let second = handle.clone().get().await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(boots.load(Ordering::SeqCst), 1);
        assert!(handle.try_get().is_some());
    }

    #[tokio::test]
    async fn test_boot_failure_is_shared() {
        let handle = SandboxHandle::new(async {
            Err(SandboxError::ConfigError("no shell".to_string()))
        });

        let err = handle.get().await.err().unwrap();
        assert!(matches!(err, SandboxError::Unavailable(ref m) if m.contains("no shell")));
        assert!(handle.clone().get().await.is_err());
        assert!(format!("{handle:?}").contains("failed"));
    }
}

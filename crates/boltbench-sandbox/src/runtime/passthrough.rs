//! Passthrough runtime - no isolation.
//!
//! Maps the sandbox workdir onto a host directory and runs commands with
//! `tokio::process`. Used by the CLI to apply a transcript to a checkout.

use crate::{
    error::{SandboxError, SandboxResult},
    path::PathMapper,
    SandboxRuntime, SpawnOptions, SpawnedProcess,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const OUTPUT_BUFFER: usize = 64;
const INPUT_BUFFER: usize = 16;
const READ_CHUNK: usize = 4096;

/// Runtime that executes directly on the host.
pub struct PassthroughRuntime {
    id: String,
    path_mapper: PathMapper,
}

impl PassthroughRuntime {
    /// Create a runtime whose sandbox path `sandbox_root` is `host_root` on disk.
    pub fn new(host_root: impl Into<PathBuf>, sandbox_root: impl Into<PathBuf>) -> Self {
        let id = format!("passthrough-{}", &uuid::Uuid::new_v4().to_string()[..8]);
        let path_mapper = PathMapper::new(host_root, sandbox_root);

        debug!(
            id = %id,
            host_root = %path_mapper.host_root().display(),
            sandbox_root = %path_mapper.sandbox_root().display(),
            "Passthrough runtime created"
        );

        Self { id, path_mapper }
    }

    fn host_path(&self, path: &Path) -> SandboxResult<PathBuf> {
        self.path_mapper
            .to_host(path)
            .ok_or_else(|| SandboxError::PathOutsideWorkspace {
                path: path.to_path_buf(),
            })
    }
}

#[async_trait]
impl SandboxRuntime for PassthroughRuntime {
    fn id(&self) -> &str {
        &self.id
    }

    fn workdir(&self) -> &Path {
        self.path_mapper.sandbox_root()
    }

    async fn mkdir(&self, path: &Path, recursive: bool) -> SandboxResult<()> {
        let host = self.host_path(path)?;
        let result = if recursive {
            tokio::fs::create_dir_all(&host).await
        } else {
            tokio::fs::create_dir(&host).await
        };
        result.map_err(|e| SandboxError::mkdir_failed(path, e.to_string()))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> SandboxResult<()> {
        let host = self.host_path(path)?;
        tokio::fs::write(&host, content)
            .await
            .map_err(|e| SandboxError::write_failed(path, e.to_string()))
    }

    async fn spawn(
        &self,
        program: &str,
        args: &[String],
        options: SpawnOptions,
    ) -> SandboxResult<SpawnedProcess> {
        let cwd = options.cwd.as_deref().unwrap_or(self.workdir());
        let host_cwd = self.host_path(cwd)?;

        debug!(program, ?args, cwd = %host_cwd.display(), "Spawning process (passthrough)");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&host_cwd)
            .envs(&options.env)
            .env("TERM", "dumb")
            .env("NO_COLOR", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::spawn_failed(program, e.to_string()))?;

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_output(stdout, output_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_output(stderr, output_tx.clone()));
        }
        drop(output_tx);

        let (input_tx, mut input_rx) = mpsc::channel::<String>(INPUT_BUFFER);
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                while let Some(data) = input_rx.recv().await {
                    if stdin.write_all(data.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel::<Result<i32, String>>();
        let pid = child.id();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = kill_rx => {
                    debug!(?pid, "Killing process");
                    if let Err(e) = child.start_kill() {
                        warn!(?pid, error = %e, "Failed to kill process");
                    }
                    child.wait().await
                }
            };
            let code = status
                .map(|s| s.code().unwrap_or(-1))
                .map_err(|e| e.to_string());
            let _ = exit_tx.send(code);
        });

        let exit = async move {
            exit_rx
                .await
                .map_err(|_| SandboxError::WaitFailed("process monitor stopped".to_string()))?
                .map_err(SandboxError::WaitFailed)
        };

        Ok(SpawnedProcess::new(input_tx, output_rx, exit, move || {
            let _ = kill_tx.send(());
        }))
    }
}

/// Forward a pipe to the output channel, keeping multi-byte characters whole
/// across reads.
async fn pump_output<R>(mut reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);

        let valid = match std::str::from_utf8(&pending) {
            Ok(_) => pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => pending.len(),
        };
        let chunk: Vec<u8> = pending.drain(..valid).collect();
        if chunk.is_empty() {
            continue;
        }
        if tx
            .send(String::from_utf8_lossy(&chunk).into_owned())
            .await
            .is_err()
        {
            return;
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned()).await;
    }
}

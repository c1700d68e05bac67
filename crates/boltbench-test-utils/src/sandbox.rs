//! Sandbox test utilities.
//!
//! Provides a scripted in-memory sandbox so runner and workbench tests run
//! without spawning real processes.

use async_trait::async_trait;
use boltbench_sandbox::{
    SandboxError, SandboxHandle, SandboxResult, SandboxRuntime, SpawnOptions, SpawnedProcess,
    DEFAULT_WORKDIR,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Exit code reported by a process that was killed.
pub const KILLED_EXIT_CODE: i32 = 143;

/// Scripted behavior of one command.
#[derive(Debug, Clone, Default)]
pub struct CommandScript {
    /// Exit code once the script finishes.
    pub exit_code: i32,
    /// Output chunks, sent in order.
    pub output: Vec<String>,
    /// Wait before producing output.
    pub delay: Duration,
    /// Never exit on its own; only a kill ends the process.
    pub hold: bool,
}

impl CommandScript {
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Default::default()
        }
    }

    /// A process that runs until killed.
    pub fn hanging() -> Self {
        Self {
            hold: true,
            ..Default::default()
        }
    }

    pub fn with_output(mut self, chunk: impl Into<String>) -> Self {
        self.output.push(chunk.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A call the sandbox received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Mkdir { path: PathBuf },
    WriteFile { path: PathBuf, content: String },
    Spawn { program: String, args: Vec<String> },
    Kill { command: String },
    Exit { command: String, code: i32 },
}

/// A recorded call with its global position.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub seq: usize,
    pub at: Instant,
    pub op: MockOp,
}

#[derive(Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    files: HashMap<PathBuf, String>,
    directories: Vec<PathBuf>,
    scripts: Vec<(String, CommandScript)>,
    failing_spawns: Vec<String>,
    failing_writes: Vec<PathBuf>,
    failing_mkdirs: Vec<PathBuf>,
    write_delay: Duration,
}

impl MockState {
    fn record(&mut self, op: MockOp) {
        let seq = self.calls.len();
        self.calls.push(RecordedCall {
            seq,
            at: Instant::now(),
            op,
        });
    }

    fn script_for(&self, command: &str) -> CommandScript {
        self.scripts
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_default()
    }
}

/// A mock sandbox runtime for testing.
///
/// Files live in memory, commands follow a [`CommandScript`] matched by
/// substring of the command text (the last spawn argument). Unmatched
/// commands exit 0 immediately. Every call is recorded in order.
///
/// # Example
///
/// ```rust
/// use boltbench_test_utils::sandbox::{CommandScript, MockSandbox};
///
/// let sandbox = MockSandbox::new()
///     .with_script("npm install", CommandScript::exit(0).with_output("added 1 package\n"))
///     .with_script("npm run dev", CommandScript::hanging());
///
/// assert_eq!(sandbox.workdir_path(), std::path::Path::new("/home/project"));
/// assert!(sandbox.calls().is_empty());
/// ```
#[derive(Clone)]
pub struct MockSandbox {
    id: String,
    workdir: PathBuf,
    state: Arc<Mutex<MockState>>,
}

impl MockSandbox {
    /// Create a mock sandbox rooted at `/home/project`.
    pub fn new() -> Self {
        Self::with_workdir(DEFAULT_WORKDIR)
    }

    pub fn with_workdir(workdir: impl Into<PathBuf>) -> Self {
        Self {
            id: format!("mock-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            workdir: workdir.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Script every command containing `pattern`. Earlier scripts win.
    pub fn with_script(self, pattern: &str, script: CommandScript) -> Self {
        self.lock().scripts.push((pattern.to_string(), script));
        self
    }

    /// Make spawning any command containing `pattern` fail.
    pub fn with_failing_spawn(self, pattern: &str) -> Self {
        self.lock().failing_spawns.push(pattern.to_string());
        self
    }

    /// Make writes to `path` fail.
    pub fn with_failing_write(self, path: impl Into<PathBuf>) -> Self {
        self.lock().failing_writes.push(path.into());
        self
    }

    /// Make creating `path` fail.
    pub fn with_failing_mkdir(self, path: impl Into<PathBuf>) -> Self {
        self.lock().failing_mkdirs.push(path.into());
        self
    }

    /// Slow down every write, to expose interleaving.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.lock().write_delay = delay;
        self
    }

    /// Add a file before the test starts.
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.lock().files.insert(path.into(), content.into());
        self
    }

    /// A ready handle for this sandbox.
    pub fn handle(&self) -> SandboxHandle {
        SandboxHandle::ready(Arc::new(self.clone()))
    }

    pub fn workdir_path(&self) -> &Path {
        &self.workdir
    }

    /// All calls in the order they happened.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.lock().calls.iter().map(|c| c.op.clone()).collect()
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    pub fn files(&self) -> HashMap<PathBuf, String> {
        self.lock().files.clone()
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        self.lock().directories.clone()
    }

    /// Command texts of every spawn, in order.
    pub fn spawned_commands(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match &c.op {
                MockOp::Spawn { args, .. } => args.last().cloned(),
                _ => None,
            })
            .collect()
    }

    /// Number of kill requests that reached the sandbox.
    pub fn kill_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c.op, MockOp::Kill { .. }))
            .count()
    }

    /// Exit code recorded for the first process whose command contains `pattern`.
    pub fn exit_code(&self, pattern: &str) -> Option<i32> {
        self.lock().calls.iter().find_map(|c| match &c.op {
            MockOp::Exit { command, code } if command.contains(pattern) => Some(*code),
            _ => None,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxRuntime for MockSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn mkdir(&self, path: &Path, _recursive: bool) -> SandboxResult<()> {
        let mut state = self.lock();
        state.record(MockOp::Mkdir {
            path: path.to_path_buf(),
        });
        if state.failing_mkdirs.iter().any(|p| p == path) {
            return Err(SandboxError::mkdir_failed(path, "permission denied"));
        }
        if !state.directories.iter().any(|p| p == path) {
            state.directories.push(path.to_path_buf());
        }
        Ok(())
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> SandboxResult<()> {
        let delay = self.lock().write_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let content = String::from_utf8_lossy(content).into_owned();
        let mut state = self.lock();
        state.record(MockOp::WriteFile {
            path: path.to_path_buf(),
            content: content.clone(),
        });
        if state.failing_writes.iter().any(|p| p == path) {
            return Err(SandboxError::write_failed(path, "read-only file system"));
        }
        state.files.insert(path.to_path_buf(), content);
        Ok(())
    }

    async fn spawn(
        &self,
        program: &str,
        args: &[String],
        _options: SpawnOptions,
    ) -> SandboxResult<SpawnedProcess> {
        let command = args.last().cloned().unwrap_or_else(|| program.to_string());

        let script = {
            let mut state = self.lock();
            if state.failing_spawns.iter().any(|p| command.contains(p.as_str())) {
                return Err(SandboxError::spawn_failed(program, "no such program"));
            }
            state.record(MockOp::Spawn {
                program: program.to_string(),
                args: args.to_vec(),
            });
            state.script_for(&command)
        };

        let (input, _input_rx) = mpsc::channel(16);
        let (output_tx, output) = mpsc::channel(64);
        let (exit_tx, exit_rx) = oneshot::channel();
        let kill_token = CancellationToken::new();

        let state = self.state.clone();
        let token = kill_token.clone();
        let exit_command = command.clone();
        tokio::spawn(async move {
            let run = async move {
                if !script.delay.is_zero() {
                    tokio::time::sleep(script.delay).await;
                }
                for chunk in script.output {
                    let _ = output_tx.send(chunk).await;
                }
                if script.hold {
                    std::future::pending::<()>().await;
                }
                script.exit_code
            };

            let code = tokio::select! {
                code = run => code,
                _ = token.cancelled() => KILLED_EXIT_CODE,
            };
            state.lock().unwrap().record(MockOp::Exit {
                command: exit_command,
                code,
            });
            let _ = exit_tx.send(code);
        });

        let exit = async move {
            exit_rx
                .await
                .map_err(|_| SandboxError::WaitFailed("mock process vanished".to_string()))
        };

        let state = self.state.clone();
        let kill = move || {
            state.lock().unwrap().record(MockOp::Kill { command });
            kill_token.cancel();
        };

        Ok(SpawnedProcess::new(input, output, exit, kill))
    }
}

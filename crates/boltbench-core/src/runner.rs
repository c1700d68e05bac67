//! Action runner.
//!
//! Each artifact owns one [`ActionRunner`]. Registered actions start out
//! `pending`; `run_action` queues them on the runner's FIFO, and a single
//! worker task executes the queue strictly in order against the shared
//! sandbox. A shell command therefore never starts before the file writes
//! queued ahead of it have settled.
//!
//! Failures are contained per action: a failed or aborted action settles with
//! that status and the worker moves on to the next job.

use crate::bus::{ActionOutput, ActionStatusChanged, Bus, FileWritten};
use crate::editor::{EditorStore, FileStore};
use crate::error::{RunnerError, RunnerResult};
use crate::store::{MapStore, StoreMap};
use boltbench_protocol::{Action, ActionDescriptor, ActionStatus, ActionType};
use boltbench_sandbox::{PathMapper, SandboxError, SandboxHandle, ShellConfig, SpawnOptions};
use boltbench_util::TimingGuard;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// The error recorded on a failed action. Details go to the log only.
pub const ACTION_FAILED: &str = "Action failed";

/// How long to keep forwarding output after a shell exits.
const OUTPUT_DRAIN: Duration = Duration::from_millis(100);

/// Runner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Sandbox workdir; relative file paths resolve against it.
    pub workdir: PathBuf,
    pub shell: ShellConfig,
    /// Treat a non-zero shell exit as `failed` instead of `complete`.
    pub fail_on_nonzero_exit: bool,
    /// Treat mkdir/write failures of file actions as `failed`.
    pub file_errors_fatal: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from(boltbench_sandbox::DEFAULT_WORKDIR),
            shell: ShellConfig::default(),
            fail_on_nonzero_exit: false,
            file_errors_fatal: false,
        }
    }
}

impl RunnerConfig {
    /// Absolute sandbox path for a `filePath` attribute.
    pub fn resolve_path(&self, file_path: &str) -> PathBuf {
        PathMapper::identity(&self.workdir).resolve(file_path)
    }
}

/// Stores and bus shared by every runner of a workbench.
#[derive(Debug, Clone, Default)]
pub struct RunnerContext {
    pub bus: Bus,
    pub files: FileStore,
    pub editor: EditorStore,
}

/// Runtime record of one action.
#[derive(Debug, Clone)]
pub struct ActionState {
    pub descriptor: ActionDescriptor,
    pub status: ActionStatus,
    /// A final (non-preview) run has been queued.
    pub executed: bool,
    /// Set only when `status` is `failed`.
    pub error: Option<String>,
    abort: CancellationToken,
}

impl ActionState {
    fn new(descriptor: ActionDescriptor) -> Self {
        Self {
            descriptor,
            status: ActionStatus::Pending,
            executed: false,
            error: None,
            abort: CancellationToken::new(),
        }
    }

    pub fn action_id(&self) -> &str {
        &self.descriptor.action_id
    }

    pub fn action(&self) -> &Action {
        &self.descriptor.action
    }

    /// Signal cancellation. The runner settles the status.
    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn is_abort_requested(&self) -> bool {
        self.abort.is_cancelled()
    }
}

/// Resolves once an action reaches a terminal status.
#[derive(Debug, Clone)]
pub struct ActionCompletion {
    action_id: String,
    queued: bool,
    rx: watch::Receiver<StoreMap<ActionState>>,
}

impl ActionCompletion {
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Whether the `run_action` call that returned this handle queued a job.
    /// `false` for re-runs, ignored streaming runs and settled actions.
    pub fn was_queued(&self) -> bool {
        self.queued
    }

    /// Wait for the terminal status. An action that disappears from the
    /// store counts as aborted.
    pub async fn wait(mut self) -> ActionStatus {
        let id = self.action_id;
        let settled = self
            .rx
            .wait_for(|actions| actions.get(&id).map_or(true, |s| s.status.is_terminal()))
            .await;

        match settled {
            Ok(actions) => actions
                .get(&id)
                .map_or(ActionStatus::Aborted, |state| state.status),
            Err(_) => ActionStatus::Aborted,
        }
    }
}

#[derive(Debug)]
struct Job {
    descriptor: ActionDescriptor,
    streaming: bool,
}

struct RunnerInner {
    artifact_id: String,
    sandbox: SandboxHandle,
    config: Arc<RunnerConfig>,
    context: RunnerContext,
    actions: MapStore<ActionState>,
}

/// FIFO executor for the actions of one artifact.
///
/// Clones share the queue. The worker stops once every clone is dropped and
/// the queue is drained.
#[derive(Clone)]
pub struct ActionRunner {
    inner: Arc<RunnerInner>,
    queue: mpsc::UnboundedSender<Job>,
}

impl std::fmt::Debug for ActionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRunner")
            .field("artifact_id", &self.inner.artifact_id)
            .field("actions", &self.inner.actions.len())
            .finish()
    }
}

impl ActionRunner {
    /// Create a runner and start its worker. Must be called within a Tokio
    /// runtime.
    pub fn new(
        artifact_id: impl Into<String>,
        sandbox: SandboxHandle,
        config: Arc<RunnerConfig>,
        context: RunnerContext,
    ) -> Self {
        let inner = Arc::new(RunnerInner {
            artifact_id: artifact_id.into(),
            sandbox,
            config,
            context,
            actions: MapStore::new(),
        });

        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(inner.clone(), rx));

        Self { inner, queue }
    }

    pub fn artifact_id(&self) -> &str {
        &self.inner.artifact_id
    }

    /// Observable `action_id -> ActionState` map.
    pub fn actions(&self) -> &MapStore<ActionState> {
        &self.inner.actions
    }

    pub fn action(&self, action_id: &str) -> Option<ActionState> {
        self.inner.actions.get(action_id)
    }

    /// Completion handle for an action, registered or not.
    pub fn completion(&self, action_id: &str) -> ActionCompletion {
        ActionCompletion {
            action_id: action_id.to_string(),
            queued: false,
            rx: self.inner.actions.subscribe(),
        }
    }

    /// Register an action as `pending`. Re-registering an id is a no-op;
    /// returns whether the action was new.
    pub async fn add_action(&self, descriptor: &ActionDescriptor) -> bool {
        let action_id = descriptor.action_id.as_str();
        if !self
            .inner
            .actions
            .insert_if_absent(action_id, ActionState::new(descriptor.clone()))
        {
            trace!(action_id, "Action already registered");
            return false;
        }

        debug!(
            artifact_id = %self.inner.artifact_id,
            action_id,
            action_type = %descriptor.action.action_type(),
            "Action added"
        );
        self.inner
            .publish_status(action_id, ActionStatus::Pending, None)
            .await;
        true
    }

    /// Queue an action for execution.
    ///
    /// With `streaming`, a `file` action is queued as a preview write of its
    /// current content; other action types ignore streaming runs. A final
    /// run is queued at most once per action.
    pub fn run_action(
        &self,
        descriptor: &ActionDescriptor,
        streaming: bool,
    ) -> RunnerResult<ActionCompletion> {
        let action_id = descriptor.action_id.as_str();
        let Some(state) = self.inner.actions.get(action_id) else {
            error!(artifact_id = %self.inner.artifact_id, action_id, "Action not found");
            return Err(RunnerError::ActionNotFound(action_id.to_string()));
        };

        let mut completion = self.completion(action_id);
        if state.executed || state.status.is_terminal() {
            trace!(action_id, "Action already executed");
            return Ok(completion);
        }
        if streaming && descriptor.action.action_type() != ActionType::File {
            return Ok(completion);
        }

        self.inner.actions.update(action_id, |state| {
            state.descriptor.action = descriptor.action.clone();
            if !streaming {
                state.executed = true;
            }
        });

        self.queue
            .send(Job {
                descriptor: descriptor.clone(),
                streaming,
            })
            .map_err(|_| RunnerError::Closed(self.inner.artifact_id.clone()))?;

        completion.queued = true;
        Ok(completion)
    }

    /// Request cancellation of an action. Returns `false` for unknown or
    /// already settled actions.
    ///
    /// An action that was never queued settles as `aborted` right away;
    /// queued and running actions are settled by the worker.
    pub async fn abort(&self, action_id: &str) -> bool {
        let Some(state) = self.inner.actions.get(action_id) else {
            return false;
        };
        if state.status.is_terminal() {
            return false;
        }

        debug!(artifact_id = %self.inner.artifact_id, action_id, "Abort requested");
        state.abort();
        if !state.executed {
            self.inner
                .set_status(action_id, ActionStatus::Aborted, None)
                .await;
        }
        true
    }

    /// Abort every action that has not settled. Returns how many were hit.
    pub async fn abort_all(&self) -> usize {
        let mut aborted = 0;
        for action_id in self.inner.actions.keys() {
            if self.abort(&action_id).await {
                aborted += 1;
            }
        }
        aborted
    }
}

async fn run_worker(inner: Arc<RunnerInner>, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        inner.execute(job).await;
    }
    trace!(artifact_id = %inner.artifact_id, "Runner worker stopped");
}

impl RunnerInner {
    async fn execute(&self, job: Job) {
        let action_id = job.descriptor.action_id.as_str();
        let Some(state) = self.actions.get(action_id) else {
            warn!(artifact_id = %self.artifact_id, action_id, "Dropping job for unknown action");
            return;
        };

        if job.streaming {
            self.preview(&state, &job.descriptor.action).await;
            return;
        }

        if state.is_abort_requested() {
            self.set_status(action_id, ActionStatus::Aborted, None).await;
            return;
        }

        // Previews of a streamed file action already moved it to running
        if state.status != ActionStatus::Running {
            self.set_status(action_id, ActionStatus::Running, None).await;
        }
        let _timing = TimingGuard::action(action_id);

        let result = match &job.descriptor.action {
            Action::Shell { content } => self.run_shell(action_id, content, &state.abort).await,
            Action::File { file_path, content } => {
                self.run_file(action_id, file_path, content, false).await
            }
        };

        let (status, error) = match result {
            _ if state.is_abort_requested() => (ActionStatus::Aborted, None),
            Ok(()) => (ActionStatus::Complete, None),
            Err(e) => {
                error!(artifact_id = %self.artifact_id, action_id, error = %e, "Action failed");
                (ActionStatus::Failed, Some(ACTION_FAILED.to_string()))
            }
        };
        self.set_status(action_id, status, error).await;
    }

    /// Write the in-flight content of a streaming file action.
    async fn preview(&self, state: &ActionState, action: &Action) {
        let action_id = state.action_id();
        // A final run is already queued or done; it supersedes the preview.
        if state.executed || state.status.is_terminal() || state.is_abort_requested() {
            trace!(action_id, "Skipping stale preview");
            return;
        }
        let Action::File { file_path, content } = action else {
            return;
        };

        if state.status == ActionStatus::Pending {
            self.set_status(action_id, ActionStatus::Running, None).await;
        }
        if let Err(e) = self.run_file(action_id, file_path, content, true).await {
            warn!(action_id, error = %e, "Preview write failed");
        }
    }

    async fn run_shell(
        &self,
        action_id: &str,
        command: &str,
        abort: &CancellationToken,
    ) -> RunnerResult<()> {
        let sandbox = self.sandbox.get().await?;
        let shell = &self.config.shell;
        let options = SpawnOptions {
            env: shell.env.clone(),
            cwd: None,
        };

        let mut process = sandbox
            .spawn(&shell.program, &shell.argv(command), options)
            .await
            .map_err(|e| {
                error!(action_id, command, error = %e, "Failed to spawn shell action");
                e
            })?;
        debug!(action_id, command, "Shell action started");

        let mut output_open = true;
        let exit = loop {
            tokio::select! {
                chunk = process.output.recv(), if output_open => match chunk {
                    Some(chunk) => self.publish_output(action_id, chunk).await,
                    None => output_open = false,
                },
                exit = &mut process.exit => break exit,
                _ = abort.cancelled(), if !process.is_killed() => {
                    debug!(action_id, "Killing shell action");
                    process.kill();
                }
            }
        };

        if output_open {
            let drain = async {
                while let Some(chunk) = process.output.recv().await {
                    self.publish_output(action_id, chunk).await;
                }
            };
            let _ = tokio::time::timeout(OUTPUT_DRAIN, drain).await;
        }

        let exit_code = exit?;
        if exit_code == 0 {
            debug!(action_id, exit_code, "Shell action exited");
        } else if abort.is_cancelled() {
            debug!(action_id, exit_code, "Aborted shell action exited");
        } else {
            warn!(action_id, exit_code, "Shell action exited with non-zero code");
            if self.config.fail_on_nonzero_exit {
                return Err(RunnerError::NonZeroExit(exit_code));
            }
        }
        Ok(())
    }

    async fn run_file(
        &self,
        action_id: &str,
        file_path: &str,
        content: &str,
        streaming: bool,
    ) -> RunnerResult<()> {
        let sandbox = self.sandbox.get().await?;
        let path = self.config.resolve_path(file_path);

        if let Some(folder) = path.parent() {
            if folder != self.config.workdir && folder != Path::new("/") {
                match sandbox.mkdir(folder, true).await {
                    Ok(()) => trace!(action_id, folder = %folder.display(), "Created folder"),
                    Err(e) => self.file_failure(action_id, e, streaming)?,
                }
            }
        }

        if let Err(e) = sandbox.write_file(&path, content.as_bytes()).await {
            return self.file_failure(action_id, e, streaming);
        }

        let key = path.to_string_lossy().into_owned();
        debug!(action_id, path = %key, streaming, "File written");
        if !streaming {
            self.context.files.record(&key, content);
            self.context.editor.apply(&key, content);
        }
        self.context
            .bus
            .publish(FileWritten {
                artifact_id: self.artifact_id.clone(),
                action_id: action_id.to_string(),
                path: key,
                streaming,
            })
            .await;
        Ok(())
    }

    fn file_failure(&self, action_id: &str, e: SandboxError, streaming: bool) -> RunnerResult<()> {
        if self.config.file_errors_fatal && !streaming {
            return Err(e.into());
        }
        error!(action_id, error = %e, "File action failed; continuing");
        Ok(())
    }

    async fn publish_output(&self, action_id: &str, chunk: String) {
        self.context
            .bus
            .publish(ActionOutput {
                artifact_id: self.artifact_id.clone(),
                action_id: action_id.to_string(),
                chunk,
            })
            .await;
    }

    async fn set_status(&self, action_id: &str, status: ActionStatus, error: Option<String>) {
        let updated = self.actions.update(action_id, |state| {
            state.status = status;
            state.error = error.clone();
        });
        if updated {
            debug!(artifact_id = %self.artifact_id, action_id, %status, "Action status changed");
            self.publish_status(action_id, status, error).await;
        }
    }

    async fn publish_status(&self, action_id: &str, status: ActionStatus, error: Option<String>) {
        self.context
            .bus
            .publish(ActionStatusChanged {
                artifact_id: self.artifact_id.clone(),
                action_id: action_id.to_string(),
                status,
                error,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        let config = RunnerConfig::default();
        assert_eq!(
            config.resolve_path("src/index.js"),
            PathBuf::from("/home/project/src/index.js")
        );
        assert_eq!(
            config.resolve_path("./src/../index.js"),
            PathBuf::from("/home/project/index.js")
        );
        assert_eq!(
            config.resolve_path("/home/project/a.txt"),
            PathBuf::from("/home/project/a.txt")
        );
    }

    #[test]
    fn test_action_state_abort_flag() {
        let state = ActionState::new(ActionDescriptor::new(
            "m",
            "a",
            "m:0",
            Action::shell("ls").unwrap(),
        ));
        assert_eq!(state.status, ActionStatus::Pending);
        assert!(!state.is_abort_requested());

        // Clones share the token
        let clone = state.clone();
        clone.abort();
        assert!(state.is_abort_requested());
    }

    #[tokio::test]
    async fn test_completion_for_missing_action_is_aborted() {
        let store: MapStore<ActionState> = MapStore::new();
        let completion = ActionCompletion {
            action_id: "nope".to_string(),
            queued: false,
            rx: store.subscribe(),
        };
        assert_eq!(completion.wait().await, ActionStatus::Aborted);
    }
}

//! Workbench coordinator.
//!
//! The workbench owns the artifact registry and connects the parser to the
//! runners. Each artifact gets its own [`ActionRunner`]; all runners share
//! one sandbox handle, one bus and the editor/file stores.
//!
//! Artifacts are keyed by [`artifact_key`], i.e. by message and artifact id.
//! A follow-up message that reuses an artifact id gets a fresh state and
//! runner, so it never queues behind a long-running command of an earlier
//! message.
//!
//! Parser callbacks are synchronous, so [`Workbench::attach_parser`] hands
//! out callbacks that only enqueue events. A dispatcher task applies them in
//! order:
//!
//! | event          | effect                                          |
//! |----------------|-------------------------------------------------|
//! | artifact open  | `add_artifact`                                  |
//! | artifact close | mark the artifact closed                        |
//! | action open    | `add_action` for file actions                   |
//! | action stream  | preview run of the file action                  |
//! | action close   | `add_action` for shell actions, then `run_action` |

use crate::bus::{ArtifactUpdated, Bus};
use crate::editor::{EditorStore, FileStore, WorkbenchView};
use crate::error::{CoreError, CoreResult};
use crate::parser::{ParserCallbacks, ParserEvent};
use crate::runner::{ActionCompletion, ActionRunner, ActionState, RunnerConfig, RunnerContext};
use crate::store::{MapStore, StoreMap};
use boltbench_protocol::{
    artifact_key, Action, ActionDescriptor, ActionStatus, ActionType, ArtifactDescriptor,
};
use boltbench_sandbox::SandboxHandle;
use boltbench_util::Identifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// An artifact as seen by the UI.
#[derive(Debug, Clone)]
pub struct ArtifactState {
    pub id: String,
    pub message_id: String,
    pub title: String,
    pub closed: bool,
    pub runner: ActionRunner,
}

impl ArtifactState {
    /// Current `action_id -> ActionState` map.
    pub fn actions(&self) -> StoreMap<ActionState> {
        self.runner.actions().snapshot()
    }
}

/// Partial artifact update; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactUpdate {
    pub title: Option<String>,
    pub closed: Option<bool>,
}

/// Workbench behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbenchOptions {
    /// Select the written file and show the code view after a file action.
    pub follow_file_actions: bool,
}

impl Default for WorkbenchOptions {
    fn default() -> Self {
        Self {
            follow_file_actions: true,
        }
    }
}

/// Artifact registry and action dispatch.
#[derive(Debug, Clone)]
pub struct Workbench {
    artifacts: MapStore<ArtifactState>,
    sandbox: SandboxHandle,
    runner_config: Arc<RunnerConfig>,
    context: RunnerContext,
    options: WorkbenchOptions,
}

impl Workbench {
    pub fn new(
        sandbox: SandboxHandle,
        runner_config: RunnerConfig,
        options: WorkbenchOptions,
    ) -> Self {
        Self {
            artifacts: MapStore::new(),
            sandbox,
            runner_config: Arc::new(runner_config),
            context: RunnerContext::default(),
            options,
        }
    }

    /// Use existing stores and bus instead of fresh ones.
    pub fn with_context(mut self, context: RunnerContext) -> Self {
        self.context = context;
        self
    }

    pub fn bus(&self) -> &Bus {
        &self.context.bus
    }

    pub fn editor(&self) -> &EditorStore {
        &self.context.editor
    }

    pub fn files(&self) -> &FileStore {
        &self.context.files
    }

    pub fn runner_config(&self) -> &RunnerConfig {
        &self.runner_config
    }

    /// Observable `artifact_key -> ArtifactState` map.
    pub fn artifacts(&self) -> &MapStore<ArtifactState> {
        &self.artifacts
    }

    pub fn artifact(&self, message_id: &str, artifact_id: &str) -> Option<ArtifactState> {
        self.artifacts.get(&artifact_key(message_id, artifact_id))
    }

    /// Register an artifact. Re-delivery of the same message/artifact pair is
    /// ignored; returns whether the artifact was new.
    pub async fn add_artifact(&self, artifact: &ArtifactDescriptor) -> bool {
        let key = artifact.key();
        if self.artifacts.contains(&key) {
            trace!(artifact = %key, "Artifact already registered");
            return false;
        }

        let state = ArtifactState {
            id: artifact.id.clone(),
            message_id: artifact.message_id.clone(),
            title: artifact.title.clone(),
            closed: false,
            runner: ActionRunner::new(
                artifact.id.clone(),
                self.sandbox.clone(),
                self.runner_config.clone(),
                self.context.clone(),
            ),
        };
        if !self.artifacts.insert_if_absent(&key, state) {
            return false;
        }

        debug!(
            artifact_id = %artifact.id,
            message_id = %artifact.message_id,
            "Artifact added"
        );
        self.context
            .bus
            .publish(ArtifactUpdated {
                message_id: artifact.message_id.clone(),
                artifact_id: artifact.id.clone(),
                title: artifact.title.clone(),
                closed: false,
            })
            .await;
        true
    }

    /// Merge `update` into an artifact.
    pub async fn update_artifact(
        &self,
        message_id: &str,
        artifact_id: &str,
        update: ArtifactUpdate,
    ) -> CoreResult<()> {
        let key = artifact_key(message_id, artifact_id);
        let mut current = None;
        let found = self.artifacts.update(&key, |artifact| {
            if let Some(title) = update.title {
                artifact.title = title;
            }
            if let Some(closed) = update.closed {
                artifact.closed = closed;
            }
            current = Some((artifact.title.clone(), artifact.closed));
        });

        let Some((title, closed)) = current.filter(|_| found) else {
            error!(artifact = %key, "Artifact not found");
            return Err(CoreError::ArtifactNotFound(key));
        };

        debug!(artifact = %key, %title, closed, "Artifact updated");
        self.context
            .bus
            .publish(ArtifactUpdated {
                message_id: message_id.to_string(),
                artifact_id: artifact_id.to_string(),
                title,
                closed,
            })
            .await;
        Ok(())
    }

    fn require_artifact(&self, descriptor: &ActionDescriptor) -> CoreResult<ArtifactState> {
        let key = descriptor.artifact_key();
        self.artifacts.get(&key).ok_or_else(|| {
            error!(artifact = %key, action_id = %descriptor.action_id, "Artifact not found");
            CoreError::ArtifactNotFound(key)
        })
    }

    /// Register an action with the runner of the artifact it belongs to.
    pub async fn add_action(&self, descriptor: &ActionDescriptor) -> CoreResult<bool> {
        let artifact = self.require_artifact(descriptor)?;
        Ok(artifact.runner.add_action(descriptor).await)
    }

    /// Run an action on its artifact's runner.
    ///
    /// File actions the runner queued are mirrored into the editor. A final
    /// (non streaming) file action also selects the file and switches to the
    /// code view when `follow_file_actions` is set. Runs the runner ignores
    /// (re-runs, aborted actions) leave the editor alone.
    pub fn run_action(
        &self,
        descriptor: &ActionDescriptor,
        streaming: bool,
    ) -> CoreResult<ActionCompletion> {
        let artifact = self.require_artifact(descriptor)?;
        let completion = artifact.runner.run_action(descriptor, streaming)?;
        if !completion.was_queued() {
            return Ok(completion);
        }

        if let Action::File { file_path, content } = &descriptor.action {
            let path = self
                .runner_config
                .resolve_path(file_path)
                .to_string_lossy()
                .into_owned();
            let editor = &self.context.editor;
            editor.update_document(&path, content);
            if !streaming && self.options.follow_file_actions {
                editor.set_selected_file(Some(path));
                editor.set_current_view(WorkbenchView::Code);
            }
        }

        Ok(completion)
    }

    /// Abort every unsettled action of every artifact.
    pub async fn abort_all_actions(&self) -> usize {
        let mut aborted = 0;
        for artifact in self.artifacts.values() {
            aborted += artifact.runner.abort_all().await;
        }
        if aborted > 0 {
            debug!(aborted, "Aborted all actions");
        }
        aborted
    }

    /// Abort everything and forget all artifacts.
    pub async fn clear(&self) {
        self.abort_all_actions().await;
        self.artifacts.clear();
    }

    /// Wait for every action that has been run to settle, and return the
    /// final state of all actions in document order.
    ///
    /// Actions that were only registered (never run) are returned as they
    /// are.
    pub async fn settle(&self) -> Vec<ActionState> {
        let mut states = Vec::new();
        for artifact in self.artifacts.values() {
            for state in artifact.runner.actions().values() {
                if state.executed {
                    artifact.runner.completion(state.action_id()).wait().await;
                }
                if let Some(state) = artifact.runner.action(state.action_id()) {
                    states.push(state);
                }
            }
        }
        states.sort_by(|a, b| action_order(a.action_id()).cmp(&action_order(b.action_id())));
        states
    }

    /// Start a dispatcher that applies parser events to this workbench.
    pub fn attach_parser(&self) -> ParserBridge {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(dispatch(self.clone(), rx));
        ParserBridge { tx, handle }
    }

    async fn apply(&self, event: ParserEvent) -> CoreResult<()> {
        match event {
            ParserEvent::ArtifactOpen(artifact) => {
                self.add_artifact(&artifact).await;
            }
            ParserEvent::ArtifactClose(artifact) => {
                self.update_artifact(
                    &artifact.message_id,
                    &artifact.id,
                    ArtifactUpdate {
                        closed: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
            }
            ParserEvent::ActionOpen(action) => {
                if action.action.action_type() == ActionType::File {
                    self.add_action(&action).await?;
                }
            }
            ParserEvent::ActionStream(action) => {
                self.run_action(&action, true)?;
            }
            ParserEvent::ActionClose(action) => {
                if action.action.action_type() == ActionType::Shell {
                    self.add_action(&action).await?;
                }
                self.run_action(&action, false)?;
            }
        }
        Ok(())
    }
}

/// Sort key for `{message_id}:{n}` ids; `n` compares numerically.
fn action_order(action_id: &str) -> (&str, usize) {
    Identifier::parse_action(action_id).unwrap_or((action_id, 0))
}

enum Command {
    Event(ParserEvent),
    Flush(oneshot::Sender<()>),
}

async fn dispatch(workbench: Workbench, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Event(event) => {
                if let Err(e) = workbench.apply(event).await {
                    error!(error = %e, "Failed to apply parser event");
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    trace!("Parser dispatcher stopped");
}

/// Connection between a parser and a workbench.
#[derive(Debug)]
pub struct ParserBridge {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl ParserBridge {
    /// Callbacks to install on a parser.
    pub fn callbacks(&self) -> WorkbenchCallbacks {
        WorkbenchCallbacks {
            tx: self.tx.clone(),
        }
    }

    /// Wait until every event sent so far has been applied.
    pub async fn flush(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Stop the dispatcher after the queued events. Parsers holding these
    /// callbacks keep the dispatcher alive until they are dropped.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

/// Parser callbacks that forward to a workbench dispatcher.
#[derive(Debug, Clone)]
pub struct WorkbenchCallbacks {
    tx: mpsc::UnboundedSender<Command>,
}

impl WorkbenchCallbacks {
    fn send(&self, event: ParserEvent) {
        if self.tx.send(Command::Event(event)).is_err() {
            error!("Parser dispatcher is gone; dropping event");
        }
    }
}

impl ParserCallbacks for WorkbenchCallbacks {
    fn on_artifact_open(&mut self, artifact: &ArtifactDescriptor) {
        self.send(ParserEvent::ArtifactOpen(artifact.clone()));
    }

    fn on_artifact_close(&mut self, artifact: &ArtifactDescriptor) {
        self.send(ParserEvent::ArtifactClose(artifact.clone()));
    }

    fn on_action_open(&mut self, action: &ActionDescriptor) {
        self.send(ParserEvent::ActionOpen(action.clone()));
    }

    fn on_action_stream(&mut self, action: &ActionDescriptor) {
        self.send(ParserEvent::ActionStream(action.clone()));
    }

    fn on_action_close(&mut self, action: &ActionDescriptor) {
        self.send(ParserEvent::ActionClose(action.clone()));
    }
}

/// Count actions per status, for summaries.
pub fn status_counts(states: &[ActionState]) -> Vec<(ActionStatus, usize)> {
    [
        ActionStatus::Pending,
        ActionStatus::Running,
        ActionStatus::Complete,
        ActionStatus::Aborted,
        ActionStatus::Failed,
    ]
    .into_iter()
    .map(|status| (status, states.iter().filter(|s| s.status == status).count()))
    .filter(|(_, count)| *count > 0)
    .collect()
}

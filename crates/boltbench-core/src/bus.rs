//! Event bus for workbench notifications.
//!
//! Runners and the workbench publish what happens to actions and artifacts;
//! terminals, CLIs and tests subscribe. Events are typed, and every event is
//! also delivered as JSON to wildcard subscribers.
//!
//! # Example
//!
//! ```ignore
//! let bus = Bus::new();
//!
//! let mut rx = bus.subscribe::<ActionOutput>().await;
//! tokio::spawn(async move {
//!     while let Ok(event) = rx.recv().await {
//!         print!("{}", event.chunk);
//!     }
//! });
//! ```

use boltbench_protocol::ActionStatus;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Trait for events that can be published on the bus.
pub trait Event: Clone + Send + Sync + 'static {
    /// Event type name for serialization/logging.
    fn event_type() -> &'static str;
}

/// The event bus for pub/sub communication.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    /// One broadcast sender per event type.
    channels: RwLock<ChannelMap>,
    /// Wildcard subscribers (receive all events as JSON).
    wildcard: broadcast::Sender<BusEvent>,
}

/// A serialized event for wildcard subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus").finish_non_exhaustive()
    }
}

impl Bus {
    pub fn new() -> Self {
        let (wildcard, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                wildcard,
            }),
        }
    }

    /// Publish an event to all subscribers.
    pub async fn publish<E: Event + Serialize>(&self, event: E) {
        if let Some(tx) = typed_sender::<E>(&*self.inner.channels.read().await) {
            // Nobody listening is fine
            let _ = tx.send(event.clone());
        }

        if let Ok(payload) = serde_json::to_value(&event) {
            let _ = self.inner.wildcard.send(BusEvent {
                event_type: E::event_type().to_string(),
                payload,
            });
        }
    }

    /// Subscribe to events of type E.
    pub async fn subscribe<E: Event>(&self) -> broadcast::Receiver<E> {
        if let Some(tx) = typed_sender::<E>(&*self.inner.channels.read().await) {
            return tx.subscribe();
        }

        let mut channels = self.inner.channels.write().await;
        // Re-check: the channel may have been created between the two locks
        if let Some(tx) = typed_sender::<E>(&channels) {
            return tx.subscribe();
        }
        let (tx, rx) = broadcast::channel::<E>(DEFAULT_CAPACITY);
        channels.insert(TypeId::of::<E>(), Box::new(tx));
        rx
    }

    /// Subscribe to all events (wildcard).
    pub fn subscribe_all(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.wildcard.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

type ChannelMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

fn typed_sender<E: Event>(channels: &ChannelMap) -> Option<&broadcast::Sender<E>> {
    channels
        .get(&TypeId::of::<E>())
        .and_then(|sender| sender.downcast_ref::<broadcast::Sender<E>>())
}

// ============================================================================
// Action Events
// ============================================================================

/// An action moved to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStatusChanged {
    pub artifact_id: String,
    pub action_id: String,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Event for ActionStatusChanged {
    fn event_type() -> &'static str {
        "action.status"
    }
}

/// Output from a running shell action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutput {
    pub artifact_id: String,
    pub action_id: String,
    pub chunk: String,
}

impl Event for ActionOutput {
    fn event_type() -> &'static str {
        "action.output"
    }
}

/// A file action wrote to the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWritten {
    pub artifact_id: String,
    pub action_id: String,
    /// Sandbox path that was written.
    pub path: String,
    /// Whether this was a preview write while the action was still streaming.
    pub streaming: bool,
}

impl Event for FileWritten {
    fn event_type() -> &'static str {
        "file.written"
    }
}

// ============================================================================
// Artifact Events
// ============================================================================

/// An artifact was added or its title/closed flag changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactUpdated {
    pub message_id: String,
    pub artifact_id: String,
    pub title: String,
    pub closed: bool,
}

impl Event for ArtifactUpdated {
    fn event_type() -> &'static str {
        "artifact.updated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event(status: ActionStatus) -> ActionStatusChanged {
        ActionStatusChanged {
            artifact_id: "a1".to_string(),
            action_id: "msg_1:0".to_string(),
            status,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = Bus::new();
        let mut rx = bus.subscribe::<ActionStatusChanged>().await;

        bus.publish(status_event(ActionStatus::Running)).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.action_id, "msg_1:0");
        assert_eq!(event.status, ActionStatus::Running);
    }

    #[tokio::test]
    async fn test_wildcard_subscribe() {
        let bus = Bus::new();
        let mut rx = bus.subscribe_all();

        bus.publish(status_event(ActionStatus::Complete)).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "action.status");
        assert_eq!(event.payload["status"], "complete");
        assert!(event.payload.get("error").is_none());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = Bus::new();
        let mut rx1 = bus.subscribe::<ActionOutput>().await;
        let mut rx2 = bus.subscribe::<ActionOutput>().await;

        bus.publish(ActionOutput {
            artifact_id: "a1".to_string(),
            action_id: "msg_1:1".to_string(),
            chunk: "added 12 packages\n".to_string(),
        })
        .await;

        assert_eq!(rx1.recv().await.unwrap().chunk, "added 12 packages\n");
        assert_eq!(rx2.recv().await.unwrap().chunk, "added 12 packages\n");
    }

    #[tokio::test]
    async fn test_typed_channels_are_separate() {
        let bus = Bus::new();
        let mut files = bus.subscribe::<FileWritten>().await;

        bus.publish(ArtifactUpdated {
            message_id: "msg_1".to_string(),
            artifact_id: "a1".to_string(),
            title: "Todo".to_string(),
            closed: false,
        })
        .await;
        bus.publish(FileWritten {
            artifact_id: "a1".to_string(),
            action_id: "msg_1:0".to_string(),
            path: "/home/project/index.js".to_string(),
            streaming: false,
        })
        .await;

        let event = files.recv().await.unwrap();
        assert_eq!(event.path, "/home/project/index.js");
        assert!(files.try_recv().is_err());
    }
}

//! Artifact descriptors.

use serde::{Deserialize, Serialize};

/// Key identifying one artifact instance.
///
/// Follow-up messages may reuse an artifact `id`, so an artifact is only
/// unique together with the message it was streamed in.
pub fn artifact_key(message_id: &str, artifact_id: &str) -> String {
    format!("{message_id}/{artifact_id}")
}

/// The attributes of a `<boltArtifact>` open tag.
///
/// Missing attributes are carried as empty strings; the protocol treats them
/// as absent rather than as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    /// Message the artifact was streamed in.
    pub message_id: String,
    /// Artifact id from the `id` attribute.
    pub id: String,
    /// Human readable title from the `title` attribute.
    pub title: String,
}

impl ArtifactDescriptor {
    pub fn new(
        message_id: impl Into<String>,
        id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            id: id.into(),
            title: title.into(),
        }
    }

    /// See [`artifact_key`].
    pub fn key(&self) -> String {
        artifact_key(&self.message_id, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let artifact = ArtifactDescriptor::new("msg_1", "todo-app", "Todo App");
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["messageId"], "msg_1");
        assert_eq!(json["id"], "todo-app");
        assert_eq!(json["title"], "Todo App");
    }

    #[test]
    fn test_key_includes_message() {
        let first = ArtifactDescriptor::new("msg_1", "app", "App");
        let follow_up = ArtifactDescriptor::new("msg_2", "app", "App");
        assert_eq!(first.key(), "msg_1/app");
        assert_ne!(first.key(), follow_up.key());
    }
}

//! Action descriptors.

use crate::error::{DescriptorError, DescriptorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The `type` attribute of a `<boltAction>` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Shell,
    File,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::File => "file",
        }
    }

    /// Parse the attribute value. Matching is exact, like the tag names.
    pub fn parse(value: &str) -> DescriptorResult<Self> {
        match value {
            "shell" => Ok(Self::Shell),
            "file" => Ok(Self::File),
            other => Err(DescriptorError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an action does.
///
/// While the action tag is still streaming the variants hold partial,
/// unnormalized content. [`Action::shell`] and [`Action::file`] build the
/// finalized form that is handed to the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Run `content` in the sandbox shell.
    Shell { content: String },
    /// Write `content` to `file_path`.
    File {
        #[serde(rename = "filePath")]
        file_path: String,
        content: String,
    },
}

impl Action {
    /// Finalize a shell action: the command is trimmed and must not be empty.
    pub fn shell(content: &str) -> DescriptorResult<Self> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DescriptorError::EmptyCommand);
        }
        Ok(Self::Shell {
            content: content.to_string(),
        })
    }

    /// Finalize a file action: content is trimmed and gets exactly one
    /// trailing newline.
    pub fn file(file_path: &str, content: &str) -> DescriptorResult<Self> {
        let file_path = file_path.trim();
        if file_path.is_empty() {
            return Err(DescriptorError::MissingFilePath);
        }
        let mut content = content.trim().to_string();
        content.push('\n');
        Ok(Self::File {
            file_path: file_path.to_string(),
            content,
        })
    }

    /// An action of the given type with no content yet.
    pub fn empty(action_type: ActionType, file_path: Option<&str>) -> DescriptorResult<Self> {
        match action_type {
            ActionType::Shell => Ok(Self::Shell {
                content: String::new(),
            }),
            ActionType::File => match file_path.map(str::trim) {
                Some(path) if !path.is_empty() => Ok(Self::File {
                    file_path: path.to_string(),
                    content: String::new(),
                }),
                _ => Err(DescriptorError::MissingFilePath),
            },
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Shell { .. } => ActionType::Shell,
            Self::File { .. } => ActionType::File,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Shell { content } | Self::File { content, .. } => content,
        }
    }

    /// Append streamed text to the content.
    pub fn push_content(&mut self, text: &str) {
        match self {
            Self::Shell { content } | Self::File { content, .. } => content.push_str(text),
        }
    }

    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::File { file_path, .. } => Some(file_path),
            Self::Shell { .. } => None,
        }
    }
}

/// An action together with the ids that locate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    pub message_id: String,
    pub artifact_id: String,
    pub action_id: String,
    pub action: Action,
}

impl ActionDescriptor {
    pub fn new(
        message_id: impl Into<String>,
        artifact_id: impl Into<String>,
        action_id: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            artifact_id: artifact_id.into(),
            action_id: action_id.into(),
            action,
        }
    }

    /// Key of the owning artifact, see [`crate::artifact_key`].
    pub fn artifact_key(&self) -> String {
        crate::artifact_key(&self.message_id, &self.artifact_id)
    }
}

//! Editor and file models.
//!
//! Two views of file content are kept apart:
//!
//! - [`FileStore`] holds what runners actually wrote to the sandbox.
//! - [`EditorStore`] holds the documents shown in the editor, which may run
//!   ahead of the sandbox (streamed AI edits) or diverge from it (user edits,
//!   flagged as `modified`).
//!
//! Keys are absolute sandbox paths.

use crate::store::{MapStore, StoreMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Panel shown by the workbench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkbenchView {
    #[default]
    Code,
    Preview,
}

/// An editor buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditorDocument {
    pub value: String,
    /// Edited in the editor since the sandbox content was last applied.
    pub modified: bool,
}

/// Documents, file selection and the visible panel.
#[derive(Debug, Clone)]
pub struct EditorStore {
    documents: MapStore<EditorDocument>,
    selected: Arc<watch::Sender<Option<String>>>,
    view: Arc<watch::Sender<WorkbenchView>>,
}

impl Default for EditorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorStore {
    pub fn new() -> Self {
        let (selected, _) = watch::channel(None);
        let (view, _) = watch::channel(WorkbenchView::default());
        Self {
            documents: MapStore::new(),
            selected: Arc::new(selected),
            view: Arc::new(view),
        }
    }

    pub fn documents(&self) -> &MapStore<EditorDocument> {
        &self.documents
    }

    pub fn document(&self, path: &str) -> Option<EditorDocument> {
        self.documents.get(path)
    }

    /// Mirror content coming from an action. The `modified` flag is kept.
    pub fn update_document(&self, path: &str, value: &str) {
        if !self.documents.update(path, |doc| doc.value = value.to_string()) {
            self.documents.insert(
                path,
                EditorDocument {
                    value: value.to_string(),
                    modified: false,
                },
            );
        }
    }

    /// A user edit.
    pub fn edit_document(&self, path: &str, value: &str) {
        self.documents.insert(
            path,
            EditorDocument {
                value: value.to_string(),
                modified: true,
            },
        );
    }

    /// Replace the buffer with applied content and clear `modified`.
    pub fn apply(&self, path: &str, value: &str) {
        self.documents.insert(
            path,
            EditorDocument {
                value: value.to_string(),
                modified: false,
            },
        );
    }

    pub fn selected_file(&self) -> Option<String> {
        self.selected.borrow().clone()
    }

    pub fn set_selected_file(&self, path: Option<String>) {
        self.selected.send_if_modified(|current| {
            if *current == path {
                return false;
            }
            *current = path;
            true
        });
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<String>> {
        self.selected.subscribe()
    }

    pub fn current_view(&self) -> WorkbenchView {
        *self.view.borrow()
    }

    pub fn set_current_view(&self, view: WorkbenchView) {
        self.view.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }

    pub fn subscribe_view(&self) -> watch::Receiver<WorkbenchView> {
        self.view.subscribe()
    }
}

/// Contents the runners applied to the sandbox.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    files: MapStore<String>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: &str, content: &str) {
        self.files.insert(path, content.to_string());
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.files.get(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths = self.files.keys();
        paths.sort();
        paths
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreMap<String>> {
        self.files.subscribe()
    }
}

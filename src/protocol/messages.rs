//! Message payloads exchanged between editor clients and the working copy server.
//!
//! Field names follow the camelCase wire format; owner ids keep their
//! historical `workingCopyOwnerID` spelling.

use serde::{Deserialize, Serialize};

use crate::text::{EditDelta, canonicalize};

/// `track:editor-changes` payload: one captured delta, or a full resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChange {
    pub offset: usize,
    /// Inserted character count (inserts and resyncs).
    #[serde(default)]
    pub length: usize,
    /// Removed character count (removes).
    #[serde(default)]
    pub removed_char_count: usize,
    #[serde(default)]
    pub text: Option<String>,
    pub file_location: String,
    pub project_path: String,
    #[serde(rename = "workingCopyOwnerID", default)]
    pub working_copy_owner_id: String,
    /// When set, `text` is the complete document content.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resync: bool,
}

impl TextChange {
    /// Wire form of a captured delta.
    pub fn from_delta(
        delta: &EditDelta,
        file_location: impl Into<String>,
        project_path: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        let (length, removed_char_count) = match delta {
            EditDelta::Insert { .. } => (delta.len(), 0),
            EditDelta::Remove { .. } => (0, delta.len()),
        };
        Self {
            offset: delta.offset(),
            length,
            removed_char_count,
            text: delta.text().map(str::to_string),
            file_location: file_location.into(),
            project_path: project_path.into(),
            working_copy_owner_id: owner_id.into(),
            resync: false,
        }
    }

    /// Wire form of a full-content replacement.
    pub fn resync(
        content: &str,
        file_location: impl Into<String>,
        project_path: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            offset: 0,
            length: content.chars().count(),
            removed_char_count: 0,
            text: Some(content.to_string()),
            file_location: file_location.into(),
            project_path: project_path.into(),
            working_copy_owner_id: owner_id.into(),
            resync: true,
        }
    }

    /// Canonical deltas carried by this change. Empty for a resync.
    pub fn deltas(&self) -> Vec<EditDelta> {
        if self.resync {
            return Vec::new();
        }
        canonicalize(self.offset, self.removed_char_count, self.text.as_deref())
    }
}

/// Tracking lifecycle operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingOperationType {
    Start,
    Stop,
    Suspend,
    Resume,
    Move,
}

/// `track:file-operation` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTrackingOperation {
    #[serde(rename = "type")]
    pub kind: TrackingOperationType,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
}

impl FileTrackingOperation {
    pub fn new(kind: TrackingOperationType, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            old_path: None,
            project_path: None,
        }
    }

    pub fn moved(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            kind: TrackingOperationType::Move,
            path: new_path.into(),
            old_path: Some(old_path.into()),
            project_path: None,
        }
    }

    pub fn with_project_path(mut self, project_path: impl Into<String>) -> Self {
        self.project_path = Some(project_path.into());
        self
    }
}

/// A diagnostic produced by the reconciliation engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub message: String,
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub warning: bool,
    #[serde(default)]
    pub source_start: usize,
    #[serde(default)]
    pub source_end: usize,
    #[serde(default)]
    pub source_line_number: usize,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub originating_file_name: String,
}

impl Problem {
    pub fn error(message: impl Into<String>, source_start: usize, source_end: usize) -> Self {
        Self {
            message: message.into(),
            error: true,
            source_start,
            source_end,
            ..Self::default()
        }
    }

    pub fn warning(message: impl Into<String>, source_start: usize, source_end: usize) -> Self {
        Self {
            message: message.into(),
            warning: true,
            source_start,
            source_end,
            ..Self::default()
        }
    }
}

/// A semantic highlighting range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightedPosition {
    pub offset: usize,
    pub length: usize,
    pub kind: String,
}

/// `event:reconcile-state-changed` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    #[serde(default)]
    pub problems: Vec<Problem>,
    #[serde(default)]
    pub highlighted_positions: Vec<HighlightedPosition>,
    #[serde(rename = "workingCopyOwnerID")]
    pub working_copy_owner_id: String,
}

/// `event:working-copy-resync-required` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncRequest {
    pub file_location: String,
    pub project_path: String,
    pub reason: String,
}

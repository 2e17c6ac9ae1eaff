//! Client-side view of an open document.

use crate::error::{SyncError, SyncResult};
use crate::text::{apply_delta, canonicalize, EditDelta};

/// A raw change as reported by the editor widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChangeEvent {
    pub offset: usize,
    /// Number of characters replaced.
    pub removed_char_count: usize,
    /// Inserted text, if any.
    pub text: Option<String>,
}

impl DocumentChangeEvent {
    pub fn new(offset: usize, removed_char_count: usize, text: Option<&str>) -> Self {
        Self {
            offset,
            removed_char_count,
            text: text.map(str::to_string),
        }
    }

    pub fn insert(offset: usize, text: &str) -> Self {
        Self::new(offset, 0, Some(text))
    }

    pub fn remove(offset: usize, removed_char_count: usize) -> Self {
        Self::new(offset, removed_char_count, None)
    }

    pub fn replace(offset: usize, removed_char_count: usize, text: &str) -> Self {
        Self::new(offset, removed_char_count, Some(text))
    }

    /// Canonical deltas of this event, in application order.
    pub fn deltas(&self) -> Vec<EditDelta> {
        canonicalize(self.offset, self.removed_char_count, self.text.as_deref())
    }
}

/// Live content of one open editor plus its identity.
///
/// `location` is the canonical location string the server echoes back as
/// the owner id of reconcile results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    location: String,
    project_path: String,
    contents: String,
    dirty: bool,
}

impl Document {
    pub fn new(
        location: impl Into<String>,
        project_path: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            project_path: project_path.into(),
            contents: contents.into(),
            dirty: false,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Length in characters, the unit every offset uses.
    pub fn char_len(&self) -> usize {
        self.contents.chars().count()
    }

    /// Unsaved changes exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    /// Apply an editor change. All-or-nothing: on error nothing changes.
    pub fn apply_change(&mut self, event: &DocumentChangeEvent) -> SyncResult<()> {
        let mut next = self.contents.clone();
        for delta in event.deltas() {
            apply_delta(&mut next, &delta).map_err(|e| SyncError::OutOfRangeEdit {
                path: self.location.clone(),
                offset: e.offset,
                length: e.length,
                content_length: e.content_length,
            })?;
        }
        self.contents = next;
        self.dirty = true;
        Ok(())
    }
}

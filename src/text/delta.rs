//! Canonical edit deltas.
//!
//! Editors report a change as `(offset, removed_char_count, inserted_text)`.
//! Both the client-side reconciler and the server-side working copy classify
//! that triple through [`canonicalize`], so the two sides cannot disagree on
//! how a replace is split.

use std::fmt;

/// Kind of a canonical delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Insert,
    Remove,
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaKind::Insert => f.write_str("insert"),
            DeltaKind::Remove => f.write_str("remove"),
        }
    }
}

/// A single canonical edit. Offsets and lengths count characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditDelta {
    /// Splice `text` in at `offset`.
    Insert { offset: usize, text: String },
    /// Delete `[offset, offset + removed_char_count)`.
    Remove {
        offset: usize,
        removed_char_count: usize,
    },
}

impl EditDelta {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        EditDelta::Insert {
            offset,
            text: text.into(),
        }
    }

    pub fn remove(offset: usize, removed_char_count: usize) -> Self {
        EditDelta::Remove {
            offset,
            removed_char_count,
        }
    }

    pub fn kind(&self) -> DeltaKind {
        match self {
            EditDelta::Insert { .. } => DeltaKind::Insert,
            EditDelta::Remove { .. } => DeltaKind::Remove,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            EditDelta::Insert { offset, .. } | EditDelta::Remove { offset, .. } => *offset,
        }
    }

    /// Inserted character count for inserts, removed character count for removes.
    pub fn len(&self) -> usize {
        match self {
            EditDelta::Insert { text, .. } => text.chars().count(),
            EditDelta::Remove {
                removed_char_count,
                ..
            } => *removed_char_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            EditDelta::Insert { text, .. } => Some(text),
            EditDelta::Remove { .. } => None,
        }
    }
}

/// Split a raw edit into its ordered canonical deltas.
///
/// Rules, first match wins:
/// 1. nothing removed and text present: one insert
/// 2. no text: one remove (a zero-count remove is kept as a no-op delta)
/// 3. otherwise: remove then insert at the same offset
pub fn canonicalize(offset: usize, removed_char_count: usize, text: Option<&str>) -> Vec<EditDelta> {
    let text = text.filter(|t| !t.is_empty());
    match text {
        Some(text) if removed_char_count == 0 => vec![EditDelta::insert(offset, text)],
        None => vec![EditDelta::remove(offset, removed_char_count)],
        Some(text) => vec![
            EditDelta::remove(offset, removed_char_count),
            EditDelta::insert(offset, text),
        ],
    }
}

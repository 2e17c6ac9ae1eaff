//! One server-side mirror of an edited file.

use crate::error::{SyncError, SyncResult};
use crate::text::{EditDelta, apply_delta};

/// Tracking lifecycle of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// No mirror exists.
    Stopped,
    Started,
    /// Recorded only; deltas are still applied.
    Suspended,
}

#[derive(Debug, Clone)]
pub struct WorkingCopy {
    /// Location as last sent by the client; echoed as the owner id of results.
    file_location: String,
    project_path: String,
    content: String,
    synchronized: bool,
    revision: u64,
    state: TrackingState,
    owner_id: Option<String>,
    endpoint_id: Option<String>,
}

impl WorkingCopy {
    pub fn new(file_location: impl Into<String>, project_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_location: file_location.into(),
            project_path: project_path.into(),
            content: content.into(),
            synchronized: true,
            revision: 0,
            state: TrackingState::Started,
            owner_id: None,
            endpoint_id: None,
        }
    }

    /// An empty mirror that rejects deltas until a resync arrives.
    pub fn desynchronized(file_location: impl Into<String>, project_path: impl Into<String>) -> Self {
        let mut copy = Self::new(file_location, project_path, String::new());
        copy.synchronized = false;
        copy
    }

    pub fn file_location(&self) -> &str {
        &self.file_location
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Bumped on every applied delta or resync.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn set_state(&mut self, state: TrackingState) {
        self.state = state;
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn endpoint_id(&self) -> Option<&str> {
        self.endpoint_id.as_deref()
    }

    /// Remember who last changed this copy.
    pub fn note_sender(&mut self, endpoint_id: &str, owner_id: &str) {
        self.endpoint_id = Some(endpoint_id.to_string());
        if !owner_id.is_empty() {
            self.owner_id = Some(owner_id.to_string());
        }
    }

    pub fn relocate(&mut self, file_location: impl Into<String>) {
        self.file_location = file_location.into();
    }

    pub fn set_project_path(&mut self, project_path: impl Into<String>) {
        self.project_path = project_path.into();
    }

    /// Splice one delta into the content.
    ///
    /// An out-of-range delta leaves the content untouched but marks the copy
    /// desynchronized; every later delta fails until [`Self::resync`].
    pub fn apply(&mut self, delta: &EditDelta) -> SyncResult<u64> {
        if !self.synchronized {
            return Err(SyncError::desynchronized(&self.file_location));
        }
        if let Err(e) = apply_delta(&mut self.content, delta) {
            self.synchronized = false;
            return Err(SyncError::OutOfRangeEdit {
                path: self.file_location.clone(),
                offset: e.offset,
                length: e.length,
                content_length: e.content_length,
            });
        }
        self.revision += 1;
        Ok(self.revision)
    }

    /// Replace the whole content and accept deltas again.
    pub fn resync(&mut self, content: impl Into<String>) -> u64 {
        self.content = content.into();
        self.synchronized = true;
        self.revision += 1;
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_delta_desynchronizes_until_resync() {
        let mut copy = WorkingCopy::new("/proj/a.txt", "/proj", "0123456789");

        let err = copy.apply(&EditDelta::remove(100, 5)).unwrap_err();
        assert!(matches!(
            err,
            SyncError::OutOfRangeEdit {
                offset: 100,
                length: 5,
                content_length: 10,
                ..
            }
        ));
        assert_eq!(copy.content(), "0123456789");
        assert!(!copy.is_synchronized());

        let err = copy.apply(&EditDelta::insert(0, "x")).unwrap_err();
        assert!(matches!(err, SyncError::Desynchronized { .. }));

        copy.resync("fresh");
        assert!(copy.is_synchronized());
        copy.apply(&EditDelta::insert(5, "!")).unwrap();
        assert_eq!(copy.content(), "fresh!");
    }

    #[test]
    fn revision_counts_applied_changes() {
        let mut copy = WorkingCopy::new("/proj/a.txt", "/proj", "abc");
        assert_eq!(copy.apply(&EditDelta::insert(1, "XY")).unwrap(), 1);
        assert_eq!(copy.apply(&EditDelta::remove(1, 2)).unwrap(), 2);
        assert_eq!(copy.content(), "abc");
    }

    #[test]
    fn empty_owner_id_does_not_overwrite_known_owner() {
        let mut copy = WorkingCopy::new("/proj/a.txt", "/proj", "");
        copy.note_sender("client-1", "01HZX");
        copy.note_sender("client-2", "");
        assert_eq!(copy.owner_id(), Some("01HZX"));
        assert_eq!(copy.endpoint_id(), Some("client-2"));
    }
}

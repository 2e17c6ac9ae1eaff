//! Outbound half of working copy mirroring.

use std::sync::Arc;

use super::dirty_region::DirtyRegion;
use super::document::Document;
use super::reconciler::DeltaSink;
use crate::protocol::{
    FileTrackingOperation, TRACK_EDITOR_CHANGES, TRACK_FILE_OPERATION, TextChange, TrackingOperationType,
};
use crate::transport::{Transport, transmit};

const LOG_TARGET: &str = "tandem::client";

/// Sends each drained delta of one editor to the server.
///
/// After a resync request, deltas are withheld and the whole document is
/// sent once the flush completes.
pub struct WorkingCopyTracker {
    transport: Arc<dyn Transport>,
    server_endpoint: String,
    owner_id: String,
    needs_resync: bool,
}

impl WorkingCopyTracker {
    pub fn new(transport: Arc<dyn Transport>, server_endpoint: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            transport,
            server_endpoint: server_endpoint.into(),
            owner_id: owner_id.into(),
            needs_resync: false,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Replace the next flush's deltas with a full-content resync.
    pub fn request_resync(&mut self) {
        self.needs_resync = true;
    }

    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Send the complete document content now.
    pub fn send_resync(&mut self, document: &Document) {
        let change = TextChange::resync(
            document.contents(),
            document.location(),
            document.project_path(),
            &self.owner_id,
        );
        log::debug!(target: LOG_TARGET, "Resyncing {}", document.location());
        transmit(self.transport.as_ref(), &self.server_endpoint, TRACK_EDITOR_CHANGES, &change);
        self.needs_resync = false;
    }

    pub fn start_tracking(&self, document: &Document) {
        let operation = FileTrackingOperation::new(TrackingOperationType::Start, document.location())
            .with_project_path(document.project_path());
        self.send_operation(&operation);
    }

    pub fn stop_tracking(&self, location: &str) {
        self.send_operation(&FileTrackingOperation::new(TrackingOperationType::Stop, location));
    }

    pub fn suspend_tracking(&self, location: &str) {
        self.send_operation(&FileTrackingOperation::new(TrackingOperationType::Suspend, location));
    }

    pub fn resume_tracking(&self, location: &str) {
        self.send_operation(&FileTrackingOperation::new(TrackingOperationType::Resume, location));
    }

    pub fn moved(&self, old_location: &str, document: &Document) {
        let operation = FileTrackingOperation::moved(old_location, document.location())
            .with_project_path(document.project_path());
        self.send_operation(&operation);
    }

    fn send_operation(&self, operation: &FileTrackingOperation) {
        log::debug!(target: LOG_TARGET, "{:?} {}", operation.kind, operation.path);
        transmit(self.transport.as_ref(), &self.server_endpoint, TRACK_FILE_OPERATION, operation);
    }
}

impl DeltaSink for WorkingCopyTracker {
    fn on_dirty_region(&mut self, document: &Document, region: &DirtyRegion) {
        if self.needs_resync {
            return;
        }
        let change = TextChange::from_delta(
            region.delta(),
            document.location(),
            document.project_path(),
            &self.owner_id,
        );
        transmit(self.transport.as_ref(), &self.server_endpoint, TRACK_EDITOR_CHANGES, &change);
    }

    fn on_flush_complete(&mut self, document: &Document, _whole_document: bool) {
        if self.needs_resync {
            self.send_resync(document);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncResult;
    use crate::text::EditDelta;
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String, Value)>>);

    impl Transport for Outbox {
        fn send(&self, endpoint_id: &str, method: &str, params: Value) -> SyncResult<()> {
            self.0
                .lock()
                .unwrap()
                .push((endpoint_id.to_string(), method.to_string(), params));
            Ok(())
        }
    }

    #[test]
    fn each_region_becomes_one_text_change() {
        let outbox = Arc::new(Outbox::default());
        let mut tracker = WorkingCopyTracker::new(outbox.clone(), "ws-agent", "owner-1");
        let doc = Document::new("/proj/a.txt", "/proj", "aXYbc");

        tracker.on_dirty_region(&doc, &DirtyRegion::new(EditDelta::insert(1, "XY")));
        tracker.on_flush_complete(&doc, false);

        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (endpoint, method, params) = &sent[0];
        assert_eq!(endpoint, "ws-agent");
        assert_eq!(method, TRACK_EDITOR_CHANGES);
        assert_eq!(params["text"], "XY");
        assert_eq!(params["workingCopyOwnerID"], "owner-1");
    }

    #[test]
    fn pending_resync_replaces_deltas_with_full_content() {
        let outbox = Arc::new(Outbox::default());
        let mut tracker = WorkingCopyTracker::new(outbox.clone(), "ws-agent", "owner-1");
        let doc = Document::new("/proj/a.txt", "/proj", "hello");

        tracker.request_resync();
        tracker.on_dirty_region(&doc, &DirtyRegion::new(EditDelta::insert(0, "h")));
        tracker.on_flush_complete(&doc, false);
        assert!(!tracker.needs_resync());

        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2["resync"], true);
        assert_eq!(sent[0].2["text"], "hello");
    }

    #[test]
    fn start_tracking_carries_project_path() {
        let outbox = Arc::new(Outbox::default());
        let tracker = WorkingCopyTracker::new(outbox.clone(), "ws-agent", "owner-1");
        tracker.start_tracking(&Document::new("/proj/a.txt", "/proj", ""));

        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent[0].1, TRACK_FILE_OPERATION);
        assert_eq!(sent[0].2["type"], "START");
        assert_eq!(sent[0].2["projectPath"], "/proj");
    }
}

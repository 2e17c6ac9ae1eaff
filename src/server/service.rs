//! Message handlers of the working copy server.
//!
//! Deltas and tracking operations are applied synchronously on the dispatch
//! loop of the connection they arrived on. Analysis runs afterwards on a
//! blocking thread and its result goes back to the endpoint that sent the
//! change.

use std::sync::Arc;

use super::engine::ReconciliationEngine;
use super::in_progress::InProgressSet;
use super::registry::{WorkingCopyRegistry, normalize_path};
use super::working_copy::TrackingState;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    FileTrackingOperation, RECONCILE_STATE_CHANGED, ReconcileResult, ResyncRequest, TRACK_EDITOR_CHANGES,
    TRACK_FILE_OPERATION, TextChange, TrackingOperationType, WORKING_COPY_RESYNC_REQUIRED,
};
use crate::transport::{MessageHandlers, Transport, transmit};

const LOG_TARGET: &str = "tandem::service";

pub struct WorkingCopyService {
    registry: Arc<WorkingCopyRegistry>,
    engine: Arc<dyn ReconciliationEngine>,
    transport: Arc<dyn Transport>,
    queued: InProgressSet<String>,
}

impl WorkingCopyService {
    pub fn new(
        registry: Arc<WorkingCopyRegistry>,
        engine: Arc<dyn ReconciliationEngine>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            engine,
            transport,
            queued: InProgressSet::new(),
        })
    }

    pub fn registry(&self) -> &Arc<WorkingCopyRegistry> {
        &self.registry
    }

    /// Handlers for one inbound connection.
    pub fn handlers(self: &Arc<Self>) -> MessageHandlers {
        let mut handlers = MessageHandlers::new();

        let service = Arc::clone(self);
        handlers.on_notification(TRACK_EDITOR_CHANGES, move |endpoint_id, change: TextChange| {
            service.on_text_change(endpoint_id, &change)
        });

        let service = Arc::clone(self);
        handlers.on_notification(
            TRACK_FILE_OPERATION,
            move |endpoint_id, operation: FileTrackingOperation| service.on_file_operation(endpoint_id, &operation),
        );

        handlers
    }

    /// Apply one change. A desynchronizing failure asks the sender for a resync.
    pub fn on_text_change(self: &Arc<Self>, endpoint_id: &str, change: &TextChange) -> SyncResult<()> {
        match self.registry.apply_change(change, endpoint_id) {
            Ok(_) => {
                self.schedule_reconcile(&change.file_location, endpoint_id);
                Ok(())
            }
            Err(e) if e.requires_resync() => {
                self.request_resync(endpoint_id, &change.file_location, &change.project_path, &e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn on_file_operation(self: &Arc<Self>, endpoint_id: &str, operation: &FileTrackingOperation) -> SyncResult<()> {
        let path = operation.path.as_str();
        match operation.kind {
            TrackingOperationType::Start => {
                self.registry.start(path, operation.project_path.as_deref())?;
                self.schedule_reconcile(path, endpoint_id);
            }
            TrackingOperationType::Stop => {
                self.registry.stop(path);
            }
            TrackingOperationType::Suspend => {
                self.registry.set_tracking_state(path, TrackingState::Suspended)?;
            }
            TrackingOperationType::Resume => {
                self.registry.set_tracking_state(path, TrackingState::Started)?;
            }
            TrackingOperationType::Move => {
                let old_path = operation
                    .old_path
                    .as_deref()
                    .ok_or_else(|| SyncError::protocol(TRACK_FILE_OPERATION, "MOVE without oldPath"))?;
                self.registry
                    .move_path(old_path, path, operation.project_path.as_deref())?;
                self.schedule_reconcile(path, endpoint_id);
            }
        }
        Ok(())
    }

    fn request_resync(&self, endpoint_id: &str, file_location: &str, project_path: &str, reason: &SyncError) {
        log::warn!(
            target: LOG_TARGET,
            "Working copy {} lost sync, asking {} for a resync: {}",
            file_location,
            endpoint_id,
            reason
        );
        let request = ResyncRequest {
            file_location: file_location.to_string(),
            project_path: project_path.to_string(),
            reason: reason.to_string(),
        };
        transmit(self.transport.as_ref(), endpoint_id, WORKING_COPY_RESYNC_REQUIRED, &request);
    }

    /// Queue an analysis of `path` unless one is already queued.
    ///
    /// A started analysis is never cancelled. Its result is dropped if the
    /// mirror changed meanwhile, since that change queued a newer analysis.
    pub fn schedule_reconcile(self: &Arc<Self>, path: &str, endpoint_id: &str) {
        let key = normalize_path(path);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!(target: LOG_TARGET, "No runtime to reconcile {} on", key);
            return;
        };
        if !self.queued.try_start(&key) {
            log::trace!(target: LOG_TARGET, "Reconcile of {} already queued", key);
            return;
        }

        let service = Arc::clone(self);
        let fallback_endpoint = endpoint_id.to_string();
        runtime.spawn(async move {
            // Let deltas already in flight land before taking the snapshot.
            tokio::task::yield_now().await;
            service.queued.finish(&key);
            service.reconcile_now(&key, &fallback_endpoint).await;
        });
    }

    async fn reconcile_now(&self, key: &str, fallback_endpoint: &str) {
        let Some(snapshot) = self.registry.snapshot(key) else {
            log::debug!(target: LOG_TARGET, "{} stopped before reconcile", key);
            return;
        };
        if !snapshot.synchronized {
            log::debug!(target: LOG_TARGET, "Skipping reconcile of desynchronized {}", key);
            return;
        }

        let engine = Arc::clone(&self.engine);
        let path = snapshot.path.clone();
        let content = snapshot.content;
        let analysis = match tokio::task::spawn_blocking(move || engine.reconcile(&path, &content)).await {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => {
                log::warn!(target: LOG_TARGET, "Reconcile of {} failed: {}", key, e);
                return;
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Reconcile task for {} panicked: {}", key, e);
                return;
            }
        };

        let current = self.registry.revision(key);
        if current != Some(snapshot.revision) {
            log::debug!(
                target: LOG_TARGET,
                "Dropping result for {} at revision {} (now {:?})",
                key,
                snapshot.revision,
                current
            );
            return;
        }

        let endpoint_id = snapshot.endpoint_id.as_deref().unwrap_or(fallback_endpoint);
        let result = ReconcileResult {
            problems: analysis.problems,
            highlighted_positions: analysis.highlighted_positions,
            working_copy_owner_id: snapshot.file_location,
        };
        log::debug!(
            target: LOG_TARGET,
            "Reconciled {} at revision {} ({} problems) for {}",
            key,
            snapshot.revision,
            result.problems.len(),
            endpoint_id
        );
        transmit(self.transport.as_ref(), endpoint_id, RECONCILE_STATE_CHANGED, &result);
    }
}

//! Message contracts of the working copy protocol.

mod messages;

pub use messages::{
    FileTrackingOperation, HighlightedPosition, Problem, ReconcileResult, ResyncRequest,
    TextChange, TrackingOperationType,
};

/// Client → server: a captured delta or a full-content resync.
pub const TRACK_EDITOR_CHANGES: &str = "track:editor-changes";

/// Client → server: tracking lifecycle operation.
pub const TRACK_FILE_OPERATION: &str = "track:file-operation";

/// Server → client: reconciliation result for a working copy.
pub const RECONCILE_STATE_CHANGED: &str = "event:reconcile-state-changed";

/// Server → client: the mirror lost sync and needs the full content.
pub const WORKING_COPY_RESYNC_REQUIRED: &str = "event:working-copy-resync-required";

/// Endpoint id clients use to address the working copy server.
pub const DEFAULT_SERVER_ENDPOINT: &str = "ws-agent";

//! Workspace-side half: mirrors edited files and reconciles them.

pub mod content_source;
pub mod engine;
pub mod in_progress;
pub mod registry;
pub mod service;
pub mod working_copy;

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

pub use content_source::{ContentSource, FsContentSource, MemoryContentSource};
pub use engine::{Analysis, NoopEngine, ReconciliationEngine};
pub use in_progress::InProgressSet;
pub use registry::{WorkingCopyRegistry, WorkingCopySnapshot, normalize_path};
pub use service::WorkingCopyService;
pub use working_copy::{TrackingState, WorkingCopy};

use crate::transport::{FramedTransport, run_dispatch_loop, spawn_framed_reader};

const LOG_TARGET: &str = "tandem::service";

/// Serve one client over a byte stream pair until EOF or `cancel`.
///
/// `peer_id` is the endpoint id results are addressed to.
pub async fn serve_stream<R, W>(
    reader: R,
    writer: W,
    peer_id: &str,
    source: Arc<dyn ContentSource>,
    engine: Arc<dyn ReconciliationEngine>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (transport, writer_task) = FramedTransport::spawn(writer, peer_id, cancel.clone());
    let (inbound, reader_task) = spawn_framed_reader(reader, peer_id, cancel.clone());

    let registry = Arc::new(WorkingCopyRegistry::new(source));
    let service = WorkingCopyService::new(registry, engine, Arc::new(transport));

    log::info!(target: LOG_TARGET, "Serving working copies for {}", peer_id);
    run_dispatch_loop(inbound, service.handlers(), cancel.clone()).await;

    // Inbound is done; release the writer so queued results drain.
    cancel.cancel();
    drop(service);
    let _ = reader_task.await;
    let _ = writer_task.await;
    log::info!(target: LOG_TARGET, "Connection to {} closed", peer_id);
}

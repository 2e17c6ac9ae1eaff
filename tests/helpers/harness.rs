//! A client loop and a working copy server wired over an in-process hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use tandem::client::{ClientLoop, ClientOptions, FlushReport};
use tandem::protocol::{Problem, TRACK_EDITOR_CHANGES};
use tandem::server::{
    Analysis, MemoryContentSource, ReconciliationEngine, WorkingCopyRegistry, WorkingCopyService,
};
use tandem::transport::{Envelope, LocalEndpoint, LocalHub, Transport, run_dispatch_loop};
use tandem::{SyncError, SyncResult};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const SERVER: &str = "ws-agent";
pub const CLIENT: &str = "client-1";
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Client transport that silently loses a number of edit messages.
pub struct LossyTransport {
    inner: LocalEndpoint,
    edits_to_drop: Arc<AtomicUsize>,
}

impl Transport for LossyTransport {
    fn send(&self, endpoint_id: &str, method: &str, params: Value) -> SyncResult<()> {
        if method == TRACK_EDITOR_CHANGES
            && self
                .edits_to_drop
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Ok(());
        }
        self.inner.send(endpoint_id, method, params)
    }
}

pub struct Harness {
    pub client: ClientLoop,
    pub client_inbox: mpsc::UnboundedReceiver<Envelope>,
    pub registry: Arc<WorkingCopyRegistry>,
    pub source: Arc<MemoryContentSource>,
    edits_to_drop: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl Harness {
    /// Must be called inside a tokio runtime: the server loop is spawned.
    pub fn new(files: &[(&str, &str)], engine: Arc<dyn ReconciliationEngine>, quiet_period: Duration) -> Self {
        let hub = LocalHub::new();
        let (server_endpoint, server_inbox) = hub.connect(SERVER);
        let (client_endpoint, client_inbox) = hub.connect(CLIENT);

        let source = Arc::new(MemoryContentSource::new());
        for (path, content) in files {
            source.insert(*path, *content);
        }
        let registry = Arc::new(WorkingCopyRegistry::new(source.clone()));
        let service = WorkingCopyService::new(Arc::clone(&registry), engine, Arc::new(server_endpoint));

        let cancel = CancellationToken::new();
        tokio::spawn(run_dispatch_loop(server_inbox, service.handlers(), cancel.clone()));

        let edits_to_drop = Arc::new(AtomicUsize::new(0));
        let transport = LossyTransport {
            inner: client_endpoint,
            edits_to_drop: Arc::clone(&edits_to_drop),
        };
        let options = ClientOptions {
            quiet_period,
            ..ClientOptions::default()
        };

        Self {
            client: ClientLoop::new(Arc::new(transport), options),
            client_inbox,
            registry,
            source,
            edits_to_drop,
            cancel,
        }
    }

    pub fn drop_next_edits(&self, count: usize) {
        self.edits_to_drop.store(count, Ordering::SeqCst);
    }

    /// Wait for the next debounce tick and flush it.
    pub async fn flush(&mut self) -> FlushReport {
        loop {
            let tick = tokio::time::timeout(TIMEOUT, self.client.next_tick())
                .await
                .expect("tick within timeout")
                .expect("scheduler alive");
            if let Some(report) = self.client.handle_tick(&tick) {
                return report;
            }
        }
    }

    /// Feed server messages to the client until one with `method` arrives.
    pub async fn pump_until(&mut self, method: &str) -> Envelope {
        loop {
            let envelope = tokio::time::timeout(TIMEOUT, self.client_inbox.recv())
                .await
                .unwrap_or_else(|_| panic!("no {} within timeout", method))
                .expect("client inbox open");
            if let Err(e) = self.client.handle_inbound(envelope.clone()) {
                panic!("client rejected {}: {}", envelope.method, e);
            }
            if envelope.method == method {
                return envelope;
            }
        }
    }

    /// Poll until the server mirror of `path` equals `expected`.
    pub async fn wait_for_mirror(&self, path: &str, expected: &str) {
        let polled = tokio::time::timeout(TIMEOUT, async {
            loop {
                if self.registry.content(path).as_deref() == Some(expected) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        if polled.is_err() {
            panic!(
                "mirror of {} is {:?}, expected {:?}",
                path,
                self.registry.content(path),
                expected
            );
        }
    }

    pub fn is_desynchronized(&self, path: &str) -> bool {
        self.registry
            .snapshot(path)
            .map(|snapshot| !snapshot.synchronized)
            .unwrap_or(false)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Engine reporting an error per `ERROR` marker and a warning per `WARN` marker.
pub fn marker_engine() -> Arc<dyn ReconciliationEngine> {
    Arc::new(|_path: &str, content: &str| -> SyncResult<Analysis> {
        if content.contains("PANIC") {
            return Err(SyncError::engine("marker", "refusing to analyze"));
        }
        let mut problems = Vec::new();
        for (at, _) in content.match_indices("ERROR") {
            problems.push(Problem::error("error marker", at, at + 5));
        }
        for (at, _) in content.match_indices("WARN") {
            problems.push(Problem::warning("warning marker", at, at + 4));
        }
        Ok(Analysis {
            problems,
            highlighted_positions: Vec::new(),
        })
    })
}

//! In-process transport hub.
//!
//! Every connected endpoint owns an unbounded FIFO; `send` pushes an
//! [`Envelope`] stamped with the sender's id onto the destination's FIFO.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{Envelope, Transport};
use crate::error::{SyncError, SyncResult};

/// Routing table shared by all endpoints of one in-process network.
#[derive(Default)]
pub struct LocalHub {
    endpoints: DashMap<String, mpsc::UnboundedSender<Envelope>>,
}

impl LocalHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `endpoint_id` and return its sending handle and inbox.
    ///
    /// Connecting an id twice replaces the previous inbox.
    pub fn connect(
        self: &Arc<Self>,
        endpoint_id: impl Into<String>,
    ) -> (LocalEndpoint, mpsc::UnboundedReceiver<Envelope>) {
        let endpoint_id = endpoint_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints.insert(endpoint_id.clone(), tx);
        (
            LocalEndpoint {
                hub: Arc::clone(self),
                endpoint_id,
            },
            rx,
        )
    }

    /// Remove an endpoint; later sends to it fail.
    pub fn disconnect(&self, endpoint_id: &str) {
        self.endpoints.remove(endpoint_id);
    }

    pub fn is_connected(&self, endpoint_id: &str) -> bool {
        self.endpoints.contains_key(endpoint_id)
    }

    fn route(&self, to: &str, envelope: Envelope) -> SyncResult<()> {
        let Some(inbox) = self.endpoints.get(to) else {
            return Err(SyncError::transport(to, "endpoint not connected"));
        };
        inbox
            .send(envelope)
            .map_err(|_| SyncError::transport(to, "endpoint inbox closed"))
    }
}

/// Sending handle of one endpoint on a [`LocalHub`].
#[derive(Clone)]
pub struct LocalEndpoint {
    hub: Arc<LocalHub>,
    endpoint_id: String,
}

impl LocalEndpoint {
    pub fn id(&self) -> &str {
        &self.endpoint_id
    }
}

impl Transport for LocalEndpoint {
    fn send(&self, endpoint_id: &str, method: &str, params: Value) -> SyncResult<()> {
        log::trace!(
            target: "tandem::transport",
            "{} -> {}: {}",
            self.endpoint_id,
            endpoint_id,
            method
        );
        self.hub.route(
            endpoint_id,
            Envelope::new(self.endpoint_id.clone(), method, params),
        )
    }
}

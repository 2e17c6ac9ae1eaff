//! One-way, addressed, fire-and-forget messaging between endpoints.
//!
//! # Components
//!
//! - [`Transport`]: outbound `send(endpoint, method, params)`
//! - [`MessageHandlers`]: inbound `on_message(method, handler)` registry
//! - [`local`]: in-process hub used for embedding and tests
//! - [`framed`]: `Content-Length` framed JSON-RPC notifications over a byte stream
//!
//! No acknowledgment and no retry: a failed send is logged and dropped.

pub mod framed;
pub mod local;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{SyncError, SyncResult};

pub use framed::{FramedTransport, read_message, spawn_framed_reader, write_message};
pub use local::{LocalEndpoint, LocalHub};

const LOG_TARGET: &str = "tandem::transport";

/// Outbound half of a transport.
///
/// `send` must not block on the peer. Ordering is preserved per destination.
pub trait Transport: Send + Sync {
    fn send(&self, endpoint_id: &str, method: &str, params: Value) -> SyncResult<()>;
}

/// An inbound message together with the endpoint that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub endpoint_id: String,
    pub method: String,
    pub params: Value,
}

impl Envelope {
    pub fn new(endpoint_id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            method: method.into(),
            params,
        }
    }

    /// Deserialize the params as the payload of `self.method`.
    pub fn parse<T: DeserializeOwned>(&self) -> SyncResult<T> {
        serde_json::from_value(self.params.clone())
            .map_err(|e| SyncError::protocol(&self.method, e.to_string()))
    }
}

/// Serialize and send, logging instead of propagating failures.
pub fn transmit<T: Serialize>(transport: &dyn Transport, endpoint_id: &str, method: &str, payload: &T) {
    let params = match serde_json::to_value(payload) {
        Ok(params) => params,
        Err(e) => {
            log::warn!(
                target: LOG_TARGET,
                "Dropping {} to {}: serialization failed: {}",
                method,
                endpoint_id,
                e
            );
            return;
        }
    };

    if let Err(e) = transport.send(endpoint_id, method, params) {
        log::warn!(target: LOG_TARGET, "Dropping {}: {}", method, e);
    }
}

type Handler = Box<dyn Fn(&str, Value) -> SyncResult<()> + Send + Sync>;

/// Inbound method → handler table.
#[derive(Default)]
pub struct MessageHandlers {
    handlers: HashMap<String, Handler>,
}

impl fmt::Debug for MessageHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandlers")
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MessageHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw handler for `method`, replacing any previous one.
    pub fn on_message<F>(&mut self, method: impl Into<String>, handler: F)
    where
        F: Fn(&str, Value) -> SyncResult<()> + Send + Sync + 'static,
    {
        self.handlers.insert(method.into(), Box::new(handler));
    }

    /// Register a handler whose params are deserialized into `P` first.
    pub fn on_notification<P, F>(&mut self, method: &'static str, handler: F)
    where
        P: DeserializeOwned,
        F: Fn(&str, P) -> SyncResult<()> + Send + Sync + 'static,
    {
        self.on_message(method, move |endpoint_id, params| {
            let payload = serde_json::from_value(params)
                .map_err(|e| SyncError::protocol(method, e.to_string()))?;
            handler(endpoint_id, payload)
        });
    }

    pub fn handles(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Run the handler for one envelope. Returns false for unknown methods.
    ///
    /// Handler errors are logged here; they never reach the transport.
    pub fn dispatch(&self, envelope: Envelope) -> bool {
        let Some(handler) = self.handlers.get(&envelope.method) else {
            log::debug!(
                target: LOG_TARGET,
                "No handler for {} from {}",
                envelope.method,
                envelope.endpoint_id
            );
            return false;
        };

        if let Err(e) = handler(&envelope.endpoint_id, envelope.params) {
            log::warn!(
                target: LOG_TARGET,
                "Handler for {} from {} failed: {}",
                envelope.method,
                envelope.endpoint_id,
                e
            );
        }
        true
    }
}

/// Consume an inbound channel in order until it closes or `cancel` fires.
///
/// Messages from one channel are dispatched strictly sequentially, which is
/// what keeps per-connection arrival order equal to apply order.
pub async fn run_dispatch_loop(
    mut inbound: mpsc::UnboundedReceiver<Envelope>,
    handlers: MessageHandlers,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log::debug!(target: LOG_TARGET, "Dispatch loop cancelled");
                return;
            }

            envelope = inbound.recv() => {
                let Some(envelope) = envelope else {
                    log::debug!(target: LOG_TARGET, "Inbound channel closed");
                    return;
                };
                handlers.dispatch(envelope);
            }
        }
    }
}

//! `Content-Length` framed JSON-RPC notifications over a byte stream.
//!
//! Format: `Content-Length: N\r\n\r\n{json}`. Only notifications are used:
//! the protocol is one-way, so frames never carry an `id`.
//!
//! A stream connects exactly one peer, so the endpoint id passed to `send`
//! must name that peer.

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Envelope, Transport};
use crate::error::{SyncError, SyncResult};

const LOG_TARGET: &str = "tandem::transport::framed";

/// Largest accepted frame body, in bytes.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Write one framed message and flush.
pub async fn write_message<W>(writer: &mut W, message: &Value) -> SyncResult<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_string(message)
        .map_err(|e| SyncError::protocol("frame", format!("serialization failed: {}", e)))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());

    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message. `Ok(None)` means clean EOF before a header.
pub async fn read_message<R>(reader: &mut R) -> SyncResult<Option<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            if saw_header {
                return Err(SyncError::protocol("frame", "EOF inside header block"));
            }
            return Ok(None);
        }
        saw_header = true;

        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some(len) = line.strip_prefix("Content-Length:") {
            let len = len
                .trim()
                .parse()
                .map_err(|e| SyncError::protocol("frame", format!("invalid Content-Length: {}", e)))?;
            content_length = Some(len);
        }
        // Other headers (Content-Type) are ignored.
    }

    let content_length =
        content_length.ok_or_else(|| SyncError::protocol("frame", "missing Content-Length header"))?;

    if content_length > MAX_FRAME_SIZE {
        return Err(SyncError::protocol(
            "frame",
            format!("Content-Length {} exceeds {} bytes", content_length, MAX_FRAME_SIZE),
        ));
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| SyncError::protocol("frame", format!("invalid JSON body: {}", e)))
}

/// Outbound side of a framed stream, backed by a single writer task.
#[derive(Clone)]
pub struct FramedTransport {
    peer_id: String,
    outbound: mpsc::UnboundedSender<Value>,
}

impl FramedTransport {
    /// Spawn the writer task for `writer`. The task exits when every
    /// `FramedTransport` clone is dropped or `cancel` fires.
    pub fn spawn<W>(writer: W, peer_id: impl Into<String>, cancel: CancellationToken) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(writer_loop(writer, rx, cancel));
        (
            Self {
                peer_id: peer_id.into(),
                outbound: tx,
            },
            handle,
        )
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

impl Transport for FramedTransport {
    fn send(&self, endpoint_id: &str, method: &str, params: Value) -> SyncResult<()> {
        if endpoint_id != self.peer_id {
            return Err(SyncError::transport(
                endpoint_id,
                format!("stream is connected to {}", self.peer_id),
            ));
        }
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.outbound
            .send(notification)
            .map_err(|_| SyncError::transport(endpoint_id, "writer task stopped"))
    }
}

async fn writer_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>, cancel: CancellationToken)
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                // Best-effort drain of what was already queued.
                while let Ok(message) = rx.try_recv() {
                    if let Err(e) = write_message(&mut writer, &message).await {
                        log::warn!(target: LOG_TARGET, "Write error during drain: {}", e);
                        break;
                    }
                }
                log::debug!(target: LOG_TARGET, "Writer task cancelled");
                return;
            }

            message = rx.recv() => {
                let Some(message) = message else {
                    log::debug!(target: LOG_TARGET, "All senders dropped, writer exiting");
                    return;
                };
                if let Err(e) = write_message(&mut writer, &message).await {
                    // The peer is gone; later messages are dropped with the channel.
                    log::warn!(target: LOG_TARGET, "Write error, stopping writer: {}", e);
                    return;
                }
            }
        }
    }
}

/// Spawn a reader task turning frames into [`Envelope`]s from `peer_id`.
///
/// The returned receiver closes on EOF, on a framing error, or on `cancel`.
pub fn spawn_framed_reader<R>(
    reader: R,
    peer_id: impl Into<String>,
    cancel: CancellationToken,
) -> (mpsc::UnboundedReceiver<Envelope>, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let peer_id = peer_id.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                message = read_message(&mut reader) => message,
            };

            match message {
                Ok(Some(message)) => {
                    let Some(method) = message.get("method").and_then(Value::as_str) else {
                        log::warn!(target: LOG_TARGET, "Ignoring frame without method from {}", peer_id);
                        continue;
                    };
                    let params = message.get("params").cloned().unwrap_or(Value::Null);
                    if tx.send(Envelope::new(peer_id.clone(), method, params)).is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    log::debug!(target: LOG_TARGET, "EOF from {}", peer_id);
                    return;
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Stopping reader for {}: {}", peer_id, e);
                    return;
                }
            }
        }
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_single_frame() {
        let mut buffer = Vec::new();
        let message = json!({"jsonrpc": "2.0", "method": "track:file-operation", "params": {"type": "STOP", "path": "/p/ä.txt"}});
        write_message(&mut buffer, &message).await.unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("Content-Length: "));

        let mut reader = BufReader::new(buffer.as_slice());
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(message));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_length_header_is_a_protocol_error() {
        let raw = b"Content-Type: application/json\r\n\r\n{}".to_vec();
        let mut reader = BufReader::new(raw.as_slice());
        assert!(matches!(
            read_message(&mut reader).await,
            Err(SyncError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_allocating() {
        let raw = b"Content-Length: 99999999999999\r\n\r\n{}".to_vec();
        let mut reader = BufReader::new(raw.as_slice());
        assert!(matches!(
            read_message(&mut reader).await,
            Err(SyncError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn transport_and_reader_talk_over_a_duplex_pipe() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let cancel = CancellationToken::new();

        let (transport, _writer) = FramedTransport::spawn(client_io, "ws-agent", cancel.clone());
        let (mut inbound, _reader) = spawn_framed_reader(server_io, "client", cancel.clone());

        transport
            .send("ws-agent", "track:editor-changes", json!({"offset": 0}))
            .unwrap();
        assert!(transport.send("elsewhere", "x", Value::Null).is_err());

        let envelope = inbound.recv().await.unwrap();
        assert_eq!(envelope.endpoint_id, "client");
        assert_eq!(envelope.method, "track:editor-changes");
        assert_eq!(envelope.params, json!({"offset": 0}));

        cancel.cancel();
    }
}

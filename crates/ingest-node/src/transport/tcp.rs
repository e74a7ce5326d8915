//! # TCP Line Bridge
//!
//! Lets field gateways and dashboards reach the in-process broker over TCP.
//! Each line a client sends is one JSON frame:
//!
//! ```text
//! {"op":"publish","topic":"cesi/cafet","payload":{"temperature":21.95,"seq":0,"hmac":"..."}}
//! {"op":"subscribe","topic":"ledger/blocks"}
//! ```
//!
//! Messages on subscribed topics come back one per line as
//! `{"topic":"...","payload":...}`.
//!
//! A client that sends more than `MAX_FRAME_BYTES` without a newline is
//! disconnected.

use super::{PubSubTransport, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Per-connection outbound queue depth.
const OUTBOUND_QUEUE: usize = 256;

/// Longest accepted client frame, newline excluded.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, PartialEq, Eq)]
enum FrameRead {
    /// `buf` holds one frame.
    Frame,
    Closed,
    TooLong,
}

/// Read one newline-terminated frame into `buf`, never buffering more than
/// `MAX_FRAME_BYTES + 1` bytes. A final unterminated frame counts as a frame.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<FrameRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_FRAME_BYTES as u64 + 1;
    if reader.take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(FrameRead::Closed);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        return Ok(FrameRead::Frame);
    }
    if buf.len() > MAX_FRAME_BYTES {
        return Ok(FrameRead::TooLong);
    }
    Ok(FrameRead::Frame)
}

/// Frame sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientFrame {
    Publish { topic: String, payload: Value },
    Subscribe { topic: String },
}

/// Frame delivered to a subscribed client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryFrame {
    pub topic: String,
    pub payload: Value,
}

impl DeliveryFrame {
    /// JSON payloads are embedded as-is, anything else as a string.
    fn from_bytes(topic: String, payload: &[u8]) -> Self {
        let payload = serde_json::from_slice(payload)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()));
        Self { topic, payload }
    }
}

pub struct TcpBridge<T: PubSubTransport> {
    listener: TcpListener,
    transport: Arc<T>,
}

impl<T: PubSubTransport + 'static> TcpBridge<T> {
    pub async fn bind(addr: SocketAddr, transport: Arc<T>) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "TCP bridge listening");
        Ok(Self { listener, transport })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Bridge client connected");
                        let transport = Arc::clone(&self.transport);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, transport, shutdown).await {
                                warn!(%peer, error = %e, "Bridge connection failed");
                            }
                            debug!(%peer, "Bridge client disconnected");
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept bridge connection");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                },
                _ = shutdown.changed() => {
                    info!("TCP bridge shutting down");
                    return;
                }
            }
        }
    }
}

async fn handle_connection<T: PubSubTransport + 'static>(
    stream: TcpStream,
    transport: Arc<T>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let (read_half, mut write_half) = stream.into_split();
    let (outbound, mut queue) = mpsc::channel::<Vec<u8>>(OUTBOUND_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(line) = queue.recv().await {
            if write_half.write_all(&line).await.is_err() {
                break;
            }
        }
    });

    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();

    let result = loop {
        line.clear();
        let read = tokio::select! {
            read = read_frame(&mut reader, &mut line) => read,
            _ = shutdown.changed() => break Ok(()),
        };
        match read {
            Ok(FrameRead::Frame) => {}
            Ok(FrameRead::Closed) => break Ok(()),
            Ok(FrameRead::TooLong) => {
                warn!(limit = MAX_FRAME_BYTES, "Bridge frame too long, closing connection");
                break Ok(());
            }
            Err(e) => break Err(TransportError::from(e)),
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<ClientFrame>(&line) {
            Ok(ClientFrame::Publish { topic, payload }) => {
                let bytes = match serde_json::to_vec(&payload) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(error = %e, "Ignoring unencodable bridge payload");
                        continue;
                    }
                };
                if let Err(e) = transport.publish(&topic, bytes).await {
                    break Err(e);
                }
            }
            Ok(ClientFrame::Subscribe { topic }) => {
                let mut subscription = match transport.subscribe(&topic).await {
                    Ok(subscription) => subscription,
                    Err(e) => break Err(e),
                };
                let outbound = outbound.clone();
                debug!(%topic, "Bridge client subscribed");
                forwarders.push(tokio::spawn(async move {
                    while let Some(message) = subscription.recv().await {
                        let frame = DeliveryFrame::from_bytes(message.topic, &message.payload);
                        let Ok(mut line) = serde_json::to_vec(&frame) else {
                            continue;
                        };
                        line.push(b'\n');
                        if outbound.send(line).await.is_err() {
                            break;
                        }
                    }
                }));
            }
            Err(e) => {
                warn!(error = %e, "Ignoring invalid bridge frame");
            }
        }
    };

    for forwarder in forwarders {
        forwarder.abort();
    }
    drop(outbound);
    let _ = writer.await;
    result
}

//! # Pub/Sub Transport
//!
//! The narrow interface the node consumes from its message broker:
//! subscribe to an exact topic, publish bytes to a topic. Delivery is
//! at-most-once; a subscriber that falls behind skips messages.

pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

pub use memory::InMemoryBroker;
pub use tcp::{ClientFrame, DeliveryFrame, TcpBridge};

/// One message as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport I/O error: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io {
            message: err.to_string(),
        }
    }
}

/// Receiving end of one topic subscription.
pub struct TopicSubscription {
    topic: String,
    receiver: broadcast::Receiver<TransportMessage>,
}

impl TopicSubscription {
    pub(crate) fn new(topic: impl Into<String>, receiver: broadcast::Receiver<TransportMessage>) -> Self {
        Self {
            topic: topic.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<TransportMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(topic = %self.topic, missed, "Transport subscriber lagged, messages skipped");
                }
            }
        }
    }
}

/// Message broker port.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Subscribe to exactly `topic`.
    async fn subscribe(&self, topic: &str) -> Result<TopicSubscription, TransportError>;

    /// Publish `payload` on `topic`. Returns the number of receivers.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, TransportError>;
}

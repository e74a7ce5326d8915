//! Handshake listener: answers sequence resynchronization requests
//! arriving on the transport.

use crate::transport::{PubSubTransport, TopicSubscription};
use shared_types::{handshake_response_topic, HandshakeRequest, HandshakeResponse};
use std::sync::Arc;
use tl_01_authentication::HandshakeApi;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct HandshakeListener<T, H> {
    transport: Arc<T>,
    responder: Arc<H>,
    topic: String,
}

impl<T: PubSubTransport, H: HandshakeApi> HandshakeListener<T, H> {
    pub fn new(transport: Arc<T>, responder: Arc<H>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            responder,
            topic: topic.into(),
        }
    }

    /// Answer one request. Returns the response that was published.
    pub async fn handle(&self, payload: &[u8]) -> Option<HandshakeResponse> {
        let request: HandshakeRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Malformed handshake request");
                return None;
            }
        };

        let response = self.responder.respond(&request)?;
        let reply_topic = handshake_response_topic(&self.topic, &response.id);
        let bytes = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode handshake response");
                return None;
            }
        };

        match self.transport.publish(&reply_topic, bytes).await {
            Ok(receivers) => {
                debug!(topic = %reply_topic, receivers, "Handshake response published");
                Some(response)
            }
            Err(e) => {
                warn!(topic = %reply_topic, error = %e, "Failed to publish handshake response");
                None
            }
        }
    }

    pub async fn run(self, mut subscription: TopicSubscription, mut shutdown: watch::Receiver<bool>) {
        info!(topic = %self.topic, "Handshake listener started");
        loop {
            let message = tokio::select! {
                message = subscription.recv() => message,
                _ = shutdown.changed() => break,
            };
            match message {
                Some(message) => {
                    self.handle(&message.payload).await;
                }
                None => break,
            }
        }
        info!(topic = %self.topic, "Handshake listener stopped");
    }
}

use super::{PubSubTransport, TopicSubscription, TransportError, TransportMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::trace;

/// In-process broker: one broadcast channel per topic.
///
/// Messages published on a topic nobody subscribes to are dropped.
pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, broadcast::Sender<TransportMessage>>>,
    capacity: usize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<TransportMessage> {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSubTransport for InMemoryBroker {
    async fn subscribe(&self, topic: &str) -> Result<TopicSubscription, TransportError> {
        Ok(TopicSubscription::new(topic, self.sender(topic).subscribe()))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, TransportError> {
        let sender = self.topics.lock().get(topic).cloned();
        let receivers = match sender {
            Some(sender) => sender
                .send(TransportMessage {
                    topic: topic.to_string(),
                    payload,
                })
                .unwrap_or(0),
            None => 0,
        };
        trace!(topic, receivers, "Message published");
        Ok(receivers)
    }
}

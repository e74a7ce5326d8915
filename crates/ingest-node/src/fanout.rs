//! Re-publishes every committed block, verbatim, on the fan-out topic.

use crate::transport::PubSubTransport;
use shared_bus::{LedgerEvent, Subscription};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, trace, warn};

pub struct FanoutForwarder<T> {
    transport: Arc<T>,
    topic: String,
}

impl<T: PubSubTransport> FanoutForwarder<T> {
    pub fn new(transport: Arc<T>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    /// Forward one bus event to the transport.
    pub async fn forward(&self, event: &LedgerEvent) {
        let LedgerEvent::BlockCommitted(block) = event;
        let bytes = match serde_json::to_vec(block) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(index = block.index, error = %e, "Failed to encode block for fan-out");
                return;
            }
        };
        match self.transport.publish(&self.topic, bytes).await {
            Ok(receivers) => trace!(index = block.index, receivers, "Block forwarded"),
            Err(e) => warn!(index = block.index, error = %e, "Fan-out publish failed"),
        }
    }

    /// Forward until shutdown or the bus is dropped.
    pub async fn run(self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!(topic = %self.topic, "Fan-out forwarder started");
        loop {
            let event = tokio::select! {
                event = subscription.recv() => event,
                _ = shutdown.changed() => break,
            };
            match event {
                Some(event) => self.forward(&event).await,
                None => break,
            }
        }
        // Deliver what was committed before shutdown.
        while let Ok(Some(event)) = subscription.try_recv() {
            self.forward(&event).await;
        }
        info!(topic = %self.topic, "Fan-out forwarder stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryBroker;
    use shared_types::{now_millis, Block, DeviceId, DeviceState, TrustTier, GENESIS_HASH};

    #[tokio::test]
    async fn test_block_forwarded_verbatim() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut listener = broker.subscribe("ledger/blocks").await.unwrap();
        let forwarder = FanoutForwarder::new(broker.clone(), "ledger/blocks");

        let block = Block {
            index: 0,
            timestamp: now_millis(),
            location: DeviceId::from("cafet"),
            trust: TrustTier::Authenticated,
            data: DeviceState {
                remote_temp: Some(22.0),
                ..Default::default()
            },
            previous_hash: GENESIS_HASH.into(),
            hash: "ab".repeat(32),
        };
        forwarder.forward(&LedgerEvent::BlockCommitted(block.clone())).await;

        let message = listener.recv().await.unwrap();
        let received: Block = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(received, block);
    }
}

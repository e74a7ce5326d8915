//! # Ledger Bus Adapter
//!
//! Connects the ledger writer to the shared event bus: every committed
//! block is published as `LedgerEvent::BlockCommitted`, in commit order.

use crate::ports::outbound::CommitObserver;
use async_trait::async_trait;
use shared_bus::{EventPublisher, LedgerEvent};
use shared_types::Block;
use std::sync::Arc;
use tracing::trace;

/// Publishes committed blocks to an `EventPublisher`.
///
/// ## Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// let observer = EventBusObserver::new(bus.clone());
/// let deps = LedgerDependencies { store, observer, time_source: SystemTimeSource };
/// let ledger = LedgerService::start(deps, LedgerConfig::default()).await?;
/// ```
pub struct EventBusObserver<P: EventPublisher> {
    publisher: Arc<P>,
}

impl<P: EventPublisher> EventBusObserver<P> {
    pub fn new(publisher: Arc<P>) -> Self {
        Self { publisher }
    }

    pub fn publisher(&self) -> &Arc<P> {
        &self.publisher
    }
}

impl<P: EventPublisher> Clone for EventBusObserver<P> {
    fn clone(&self) -> Self {
        Self {
            publisher: Arc::clone(&self.publisher),
        }
    }
}

#[async_trait]
impl<P: EventPublisher> CommitObserver for EventBusObserver<P> {
    async fn on_commit(&self, block: &Block) {
        let receivers = self
            .publisher
            .publish(LedgerEvent::BlockCommitted(block.clone()))
            .await;
        trace!(index = block.index, receivers, "Block fanned out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::{EventFilter, InMemoryEventBus};
    use shared_types::{now_millis, DeviceId, DeviceState, TrustTier, GENESIS_HASH};

    #[tokio::test]
    async fn test_commit_is_published() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());
        let observer = EventBusObserver::new(bus.clone());

        let block = Block {
            index: 0,
            timestamp: now_millis(),
            location: DeviceId::from("cafet"),
            trust: TrustTier::Authenticated,
            data: DeviceState::default(),
            previous_hash: GENESIS_HASH.into(),
            hash: "ab".repeat(32),
        };
        observer.on_commit(&block).await;

        let event = sub.recv().await.unwrap();
        assert_eq!(event.block(), Some(&block));
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn test_commit_without_subscribers() {
        let bus = Arc::new(InMemoryEventBus::new());
        let observer = EventBusObserver::new(bus.clone());

        let block = Block {
            index: 0,
            timestamp: now_millis(),
            location: DeviceId::from("fablab"),
            trust: TrustTier::Unauthenticated,
            data: DeviceState::default(),
            previous_hash: GENESIS_HASH.into(),
            hash: "cd".repeat(32),
        };
        observer.on_commit(&block).await;
        assert_eq!(bus.published(), 1);
    }
}

//! # Event Publisher
//!
//! The ledger writer is the only producer. It publishes after the block is
//! durable, so anything a subscriber sees can also be read back from the
//! ledger.

use crate::events::{EventFilter, LedgerEvent};
use crate::subscriber::{EventStream, EventSubscriber, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Sentinel for "nothing published yet" in `InMemoryEventBus::last_index`.
const NONE_PUBLISHED: u64 = u64::MAX;

/// Publishing side of the fan-out.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand `event` to every live subscriber.
    ///
    /// Returns how many subscribers were reached. Zero is not an error.
    async fn publish(&self, event: LedgerEvent) -> usize;

    /// Total events published since creation.
    fn published(&self) -> u64;
}

/// Fan-out bus over `tokio::sync::broadcast`.
///
/// Every subscriber has its own bounded window of `capacity` events; a
/// subscriber further behind than that loses the oldest ones (see
/// `Subscription::missed`).
pub struct InMemoryEventBus {
    sender: broadcast::Sender<LedgerEvent>,
    published: AtomicU64,
    last_index: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus with a per-subscriber window of `capacity` events (at least 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: AtomicU64::new(0),
            last_index: AtomicU64::new(NONE_PUBLISHED),
            capacity,
        }
    }

    /// Subscribe to events matching `filter`, starting with the next one
    /// published.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let subscription = Subscription::new(self.sender.subscribe(), filter);
        debug!(
            subscribers = self.sender.receiver_count(),
            resume_after = ?self.last_index(),
            "Fan-out subscriber joined"
        );
        subscription
    }

    /// Same as `subscribe`, as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Live subscriptions, filtered or not.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Ledger index of the most recent event, if any. A subscriber joining
    /// now receives everything after it and finds the rest in the ledger.
    #[must_use]
    pub fn last_index(&self) -> Option<u64> {
        match self.last_index.load(Ordering::Acquire) {
            NONE_PUBLISHED => None,
            index => Some(index),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, filter: EventFilter) -> Subscription {
        InMemoryEventBus::subscribe(self, filter)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: LedgerEvent) -> usize {
        let index = event.index();
        self.published.fetch_add(1, Ordering::Relaxed);
        self.last_index.store(index, Ordering::Release);

        // Err only means nobody is subscribed right now
        let reached = self.sender.send(event).unwrap_or(0);
        trace!(index, reached, "Block fanned out");
        reached
    }

    fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

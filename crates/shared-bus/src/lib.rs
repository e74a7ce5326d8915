//! # Shared Bus - Fan-out of Committed Blocks
//!
//! Delivers every block committed by the ledger to all live subscribers.
//!
//! ## Delivery Rules
//!
//! - **Best effort, at most once** per subscriber per block. A subscriber
//!   that is not connected when a block is published misses it and must
//!   recover through the ledger's historical read paths.
//! - **Per-subscriber order matches commit order.** The ledger publishes
//!   from its single writer and `tokio::sync::broadcast` keeps send order.
//! - A subscriber that falls more than the channel capacity behind skips
//!   the overwritten blocks, keeps receiving from the oldest retained and
//!   counts the gap in `Subscription::missed`.
//!
//! ```text
//! ┌──────────────┐  publish()   ┌──────────────┐  recv()   ┌────────────┐
//! │ Ledger writer│ ───────────▶ │  Event Bus   │ ────────▶ │ Subscriber │
//! └──────────────┘              └──────────────┘ ────────▶ │ Subscriber │
//!                                                          └────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, LedgerEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

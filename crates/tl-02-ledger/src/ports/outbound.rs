//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the ledger requires from the host application.

use crate::domain::errors::LedgerStoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{Block, DeviceId};
use std::ops::ControlFlow;

/// Append-only block persistence.
///
/// Production: `JsonLinesLedgerStore`
/// Testing: `InMemoryLedgerStore`
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Block with the highest index, if any.
    async fn fetch_tail(&self) -> Result<Option<Block>, LedgerStoreError>;

    /// Durably append one block.
    ///
    /// Must refuse with `IndexConflict` unless `block.index` is exactly one
    /// past the current tail (0 on an empty store).
    async fn append(&self, block: &Block) -> Result<(), LedgerStoreError>;

    /// Blocks for `location` with `from <= timestamp <= to`, ordered by
    /// timestamp then index. Open bounds when `None`.
    async fn range_by_location(
        &self,
        location: &DeviceId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Block>, LedgerStoreError>;

    /// Every block, ordered by index.
    async fn all(&self) -> Result<Vec<Block>, LedgerStoreError>;

    /// Visit every block in index order until `visit` breaks.
    ///
    /// Stores that do not keep the chain in memory override this to read
    /// one block at a time.
    async fn scan(
        &self,
        visit: &mut (dyn for<'b> FnMut(&'b Block) -> ControlFlow<()> + Send),
    ) -> Result<(), LedgerStoreError> {
        for block in self.all().await? {
            if visit(&block).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Number of stored blocks.
    async fn count(&self) -> Result<u64, LedgerStoreError>;
}

/// Notified, in commit order, after every durable append.
#[async_trait]
pub trait CommitObserver: Send + Sync {
    async fn on_commit(&self, block: &Block);
}

/// Observer that ignores commits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl CommitObserver for NoopObserver {
    async fn on_commit(&self, _block: &Block) {}
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current instant, millisecond precision.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        shared_types::now_millis()
    }
}

/// Filter helper shared by store adapters.
pub(crate) fn in_range(
    block: &Block,
    location: &DeviceId,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> bool {
    &block.location == location
        && from.map_or(true, |f| block.timestamp >= f)
        && to.map_or(true, |t| block.timestamp <= t)
}

//! # Inbound Ports (Driving Ports)
//!
//! The ledger API used by the ingest pipeline and by read-side consumers.

use crate::domain::chain::ChainSummary;
use crate::domain::errors::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{Block, DeviceId, DeviceState, Reading, TrustTier};

#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Merge `reading` into the device's sticky state and append the
    /// resulting block. Appends are serialized across all devices.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Persistence` - the store failed; nothing committed
    /// - `LedgerError::ChainInconsistency` - the tail kept moving
    async fn append(&self, device: &DeviceId, trust: TrustTier, reading: Reading) -> Result<Block, LedgerError>;

    /// Highest-index block.
    async fn fetch_tail(&self) -> Result<Option<Block>, LedgerError>;

    /// Historical read path for one device.
    async fn range_by_location(
        &self,
        location: &DeviceId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Block>, LedgerError>;

    async fn block_count(&self) -> Result<u64, LedgerError>;

    /// Re-verify every stored block.
    async fn verify_chain(&self) -> Result<ChainSummary, LedgerError>;

    /// Last committed snapshot for `device`.
    fn device_state(&self, device: &DeviceId) -> DeviceState;
}

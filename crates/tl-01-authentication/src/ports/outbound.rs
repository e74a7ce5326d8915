//! # Outbound Ports (Driven Ports)
//!
//! Durable storage for the sequence record.

use crate::domain::errors::SequenceStoreError;
use async_trait::async_trait;
use shared_types::SequenceRecord;

/// Whole-record sequence persistence.
///
/// The record is small and written at the reading rate, so it is
/// overwritten wholesale on every update rather than patched per device.
///
/// Production: `FileSequencePersistence`
/// Testing: `InMemorySequencePersistence`
#[async_trait]
pub trait SequencePersistence: Send + Sync {
    /// Load the record. A store that was never written yields an empty one.
    async fn load(&self) -> Result<SequenceRecord, SequenceStoreError>;

    /// Durably replace the record. Must not return before the data is on
    /// stable storage.
    async fn save(&self, record: &SequenceRecord) -> Result<(), SequenceStoreError>;
}

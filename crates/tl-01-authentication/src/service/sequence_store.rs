//! # Sequence Store
//!
//! In-memory `SequenceRecord` backed by a `SequencePersistence` adapter.
//! Loaded once at startup; every advance is written through before it is
//! visible as a success.

use crate::domain::errors::SequenceStoreError;
use crate::ports::outbound::SequencePersistence;
use parking_lot::{Mutex, RwLock};
use shared_types::{DeviceId, SequenceRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

pub struct SequenceStore<P: SequencePersistence> {
    record: RwLock<SequenceRecord>,
    persistence: P,
    /// Serializes whole-record writes so a stale snapshot never overwrites
    /// a newer one.
    write_lock: tokio::sync::Mutex<()>,
    /// One lock per device for the check, verify and advance window.
    device_locks: Mutex<HashMap<DeviceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<P: SequencePersistence> SequenceStore<P> {
    /// Load the persisted record.
    ///
    /// # Errors
    ///
    /// Propagates load failures. A corrupt record is never replaced by an
    /// empty one.
    pub async fn load(persistence: P) -> Result<Self, SequenceStoreError> {
        let record = persistence.load().await?;
        info!(devices = record.len(), "Sequence store loaded");
        Ok(Self {
            record: RwLock::new(record),
            persistence,
            write_lock: tokio::sync::Mutex::new(()),
            device_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Next expected sequence number for `device` (0 if never seen).
    pub fn expected(&self, device: &DeviceId) -> u64 {
        self.record.read().expected(device)
    }

    /// Whether `device` has ever had a reading accepted.
    pub fn contains(&self, device: &DeviceId) -> bool {
        self.record.read().contains(device)
    }

    pub fn snapshot(&self) -> SequenceRecord {
        self.record.read().clone()
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Lock guarding the verification window of one device.
    pub(crate) fn device_lock(&self, device: &DeviceId) -> Arc<tokio::sync::Mutex<()>> {
        self.device_locks
            .lock()
            .entry(device.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Record `seq` as accepted for `device` and persist the whole record.
    ///
    /// Returns the new expected value. On a failed write the in-memory entry
    /// is restored and the error is returned.
    pub async fn advance(&self, device: &DeviceId, seq: u64) -> Result<u64, SequenceStoreError> {
        let _write = self.write_lock.lock().await;

        let (previous, snapshot, next) = {
            let mut record = self.record.write();
            let previous = record.advance(device, seq);
            (previous, record.clone(), record.expected(device))
        };

        if let Err(e) = self.persistence.save(&snapshot).await {
            self.record.write().restore(device, previous);
            error!(device = %device, seq, error = %e, "Failed to persist sequence record");
            return Err(e);
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySequencePersistence;

    #[tokio::test]
    async fn test_load_existing_record() {
        let mut record = SequenceRecord::new();
        record.advance(&DeviceId::from("cafet"), 7);

        let store = SequenceStore::load(InMemorySequencePersistence::with_record(record))
            .await
            .unwrap();
        assert_eq!(store.expected(&DeviceId::from("cafet")), 8);
        assert_eq!(store.expected(&DeviceId::from("fablab")), 0);
    }

    #[tokio::test]
    async fn test_advance_persists_every_time() {
        let persistence = InMemorySequencePersistence::new();
        let store = SequenceStore::load(persistence.clone()).await.unwrap();
        let device = DeviceId::from("cafet");

        assert_eq!(store.advance(&device, 0).await.unwrap(), 1);
        assert_eq!(store.advance(&device, 4).await.unwrap(), 5);

        assert_eq!(persistence.save_count(), 2);
        assert_eq!(persistence.persisted().expected(&device), 5);
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back() {
        let persistence = InMemorySequencePersistence::new();
        let store = SequenceStore::load(persistence.clone()).await.unwrap();
        let device = DeviceId::from("cafet");

        store.advance(&device, 2).await.unwrap();
        persistence.set_fail_writes(true);

        assert!(store.advance(&device, 9).await.is_err());
        assert_eq!(store.expected(&device), 3);

        let fresh = DeviceId::from("fablab");
        assert!(store.advance(&fresh, 0).await.is_err());
        assert!(!store.contains(&fresh));
    }

    #[tokio::test]
    async fn test_device_lock_is_shared_per_device() {
        let store = SequenceStore::load(InMemorySequencePersistence::new())
            .await
            .unwrap();
        let a = store.device_lock(&DeviceId::from("cafet"));
        let b = store.device_lock(&DeviceId::from("cafet"));
        let c = store.device_lock(&DeviceId::from("fablab"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}

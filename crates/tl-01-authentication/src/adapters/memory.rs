use crate::domain::errors::SequenceStoreError;
use crate::ports::outbound::SequencePersistence;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::SequenceRecord;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory sequence persistence for testing.
///
/// Clones share the same backing record, so a test can keep a handle and
/// inspect what the store wrote or simulate a restart by loading again.
#[derive(Clone, Default)]
pub struct InMemorySequencePersistence {
    record: Arc<Mutex<SequenceRecord>>,
    fail_writes: Arc<AtomicBool>,
    saves: Arc<AtomicU64>,
}

impl InMemorySequencePersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already persisted record.
    pub fn with_record(record: SequenceRecord) -> Self {
        Self {
            record: Arc::new(Mutex::new(record)),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// What is currently "on disk".
    pub fn persisted(&self) -> SequenceRecord {
        self.record.lock().clone()
    }

    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SequencePersistence for InMemorySequencePersistence {
    async fn load(&self) -> Result<SequenceRecord, SequenceStoreError> {
        Ok(self.record.lock().clone())
    }

    async fn save(&self, record: &SequenceRecord) -> Result<(), SequenceStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SequenceStoreError::Io {
                message: "simulated write failure".into(),
            });
        }
        *self.record.lock() = record.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

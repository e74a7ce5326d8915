use crate::domain::errors::LedgerStoreError;
use crate::ports::outbound::{in_range, LedgerStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared_types::{Block, DeviceId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory ledger store for testing.
///
/// Clones share the same blocks.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    blocks: Arc<RwLock<Vec<Block>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing blocks, taken as-is (no validation).
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Arc::new(RwLock::new(blocks)),
            ..Self::default()
        }
    }

    /// Make subsequent appends fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Direct mutable access, for simulating tampering.
    pub fn with_blocks_mut<R>(&self, f: impl FnOnce(&mut Vec<Block>) -> R) -> R {
        f(&mut self.blocks.write())
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.read().clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn fetch_tail(&self) -> Result<Option<Block>, LedgerStoreError> {
        Ok(self.blocks.read().last().cloned())
    }

    async fn append(&self, block: &Block) -> Result<(), LedgerStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerStoreError::Io {
                message: "simulated write failure".into(),
            });
        }

        let mut blocks = self.blocks.write();
        let expected = blocks.last().map_or(0, |b| b.index + 1);
        if block.index != expected {
            return Err(LedgerStoreError::IndexConflict {
                expected,
                got: block.index,
            });
        }
        blocks.push(block.clone());
        Ok(())
    }

    async fn range_by_location(
        &self,
        location: &DeviceId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Block>, LedgerStoreError> {
        let mut matching: Vec<Block> = self
            .blocks
            .read()
            .iter()
            .filter(|b| in_range(b, location, from, to))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.index.cmp(&b.index)));
        Ok(matching)
    }

    async fn all(&self) -> Result<Vec<Block>, LedgerStoreError> {
        Ok(self.snapshot())
    }

    async fn count(&self) -> Result<u64, LedgerStoreError> {
        Ok(self.blocks.read().len() as u64)
    }
}

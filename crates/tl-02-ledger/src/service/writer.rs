//! The single writer behind `LedgerService::append`.

use crate::domain::block::build_next;
use crate::domain::errors::{LedgerError, LedgerStoreError};
use crate::domain::state::DeviceStates;
use crate::ports::outbound::{CommitObserver, LedgerStore, TimeSource};
use parking_lot::RwLock;
use shared_types::{Block, CanonicalEncoder, DeviceId, Reading, TrustTier};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub(super) struct AppendCommand {
    pub device: DeviceId,
    pub trust: TrustTier,
    pub reading: Reading,
    pub reply: oneshot::Sender<Result<Block, LedgerError>>,
}

pub(super) struct Writer<S, O, T> {
    pub store: Arc<S>,
    pub observer: O,
    pub time_source: T,
    pub encoder: CanonicalEncoder,
    pub max_attempts: u32,
    pub states: Arc<RwLock<DeviceStates>>,
}

/// Identity of a tail for the moved-tail check.
fn link(tail: Option<&Block>) -> Option<(u64, &str)> {
    tail.map(|b| (b.index, b.hash.as_str()))
}

impl<S, O, T> Writer<S, O, T>
where
    S: LedgerStore,
    O: CommitObserver,
    T: TimeSource,
{
    /// Process appends until every sender is gone.
    pub async fn run(self, mut commands: mpsc::Receiver<AppendCommand>) {
        debug!("Ledger writer started");
        while let Some(command) = commands.recv().await {
            let result = self
                .append(&command.device, command.trust, &command.reading)
                .await;
            // The caller may have given up waiting; the outcome stands either way.
            let _ = command.reply.send(result);
        }
        info!("Ledger writer stopped");
    }

    async fn append(&self, device: &DeviceId, trust: TrustTier, reading: &Reading) -> Result<Block, LedgerError> {
        for attempt in 1..=self.max_attempts {
            let tail = self.store.fetch_tail().await?;

            let now = self.time_source.now();
            let snapshot = self.states.read().get(device).merge(&self.encoder, reading, now)?;
            let block = build_next(&self.encoder, tail.as_ref(), device, trust, snapshot, now)?;

            let current = self.store.fetch_tail().await?;
            if link(current.as_ref()) != link(tail.as_ref()) {
                warn!(
                    attempt,
                    location = %device,
                    "Ledger tail moved while building block, retrying"
                );
                continue;
            }

            match self.store.append(&block).await {
                Ok(()) => {
                    self.states.write().commit(device, block.data.clone());
                    info!(
                        index = block.index,
                        location = %block.location,
                        trust = %block.trust,
                        hash = %block.hash,
                        "Block committed"
                    );
                    self.observer.on_commit(&block).await;
                    return Ok(block);
                }
                Err(LedgerStoreError::IndexConflict { expected, got }) => {
                    warn!(attempt, expected, got, location = %device, "Ledger index conflict, retrying");
                }
                Err(e) => {
                    error!(error = %e, location = %device, "Ledger append failed, reading not committed");
                    return Err(e.into());
                }
            }
        }

        error!(
            attempts = self.max_attempts,
            location = %device,
            "Ledger tail kept moving, append abandoned"
        );
        Err(LedgerError::ChainInconsistency {
            attempts: self.max_attempts,
        })
    }
}

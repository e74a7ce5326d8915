//! # Ledger Service
//!
//! The main service implementing the `LedgerApi`.
//!
//! ## Architecture
//!
//! Appends from every device go through one queue into one writer task,
//! so reading the tail, merging the snapshot, hashing and writing happen
//! as a single step with respect to all other appends. Reads go straight
//! to the store.
//!
//! ```text
//! append(device, trust, reading) ──► mpsc queue ──► Writer ──► LedgerStore
//!                     ▲                               │
//!                     └──────── oneshot reply ◄───────┤
//!                                                     ▼
//!                                             CommitObserver (fan-out)
//! ```

mod writer;

use crate::domain::chain::{ChainSummary, ChainVerifier};
use crate::domain::config::LedgerConfig;
use crate::domain::errors::LedgerError;
use crate::domain::state::{DeviceStates, Recovery};
use crate::ports::inbound::LedgerApi;
use crate::ports::outbound::{CommitObserver, LedgerStore, TimeSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use shared_types::{Block, DeviceId, DeviceState, Reading, TrustTier};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use writer::{AppendCommand, Writer};

/// Dependencies for `LedgerService`.
pub struct LedgerDependencies<S, O, T> {
    pub store: Arc<S>,
    pub observer: O,
    pub time_source: T,
}

/// The ledger service.
///
/// Cheap to share behind an `Arc`. Call [`LedgerService::shutdown`] to
/// drain queued appends before exit.
pub struct LedgerService<S: LedgerStore> {
    store: Arc<S>,
    config: LedgerConfig,
    states: Arc<RwLock<DeviceStates>>,
    commands: Mutex<Option<mpsc::Sender<AppendCommand>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl<S: LedgerStore + 'static> LedgerService<S> {
    /// Load the stored chain, verify it, rebuild device snapshots and
    /// start the writer.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Persistence` - the store could not be read
    /// - `LedgerError::Violation` - the stored chain is broken
    pub async fn start<O, T>(
        deps: LedgerDependencies<S, O, T>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError>
    where
        O: CommitObserver + 'static,
        T: TimeSource + 'static,
    {
        let mut verifier = ChainVerifier::new(&config.encoder);
        let mut violation = None;
        let mut recovery = Recovery::default();
        let mut blocks = 0u64;
        deps.store
            .scan(&mut |block| {
                if config.verify_on_start {
                    if let Err(e) = verifier.push(block) {
                        violation = Some(e);
                        return ControlFlow::Break(());
                    }
                }
                recovery.observe(block);
                blocks += 1;
                ControlFlow::Continue(())
            })
            .await?;

        if let Some(violation) = violation {
            return Err(violation.into());
        }
        if config.verify_on_start {
            info!(length = verifier.finish().length, "Stored chain verified");
        }

        let states = Arc::new(RwLock::new(recovery.finish()));
        info!(blocks, devices = states.read().len(), "Device snapshots recovered");

        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let writer = Writer {
            store: Arc::clone(&deps.store),
            observer: deps.observer,
            time_source: deps.time_source,
            encoder: config.encoder.clone(),
            max_attempts: config.max_append_attempts.max(1),
            states: Arc::clone(&states),
        };
        let handle = tokio::spawn(writer.run(receiver));

        Ok(Self {
            store: deps.store,
            config,
            states,
            commands: Mutex::new(Some(sender)),
            writer: Mutex::new(Some(handle)),
        })
    }
}

impl<S: LedgerStore> LedgerService<S> {
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Stop accepting appends, let the writer finish what is queued, and
    /// wait for it.
    pub async fn shutdown(&self) {
        drop(self.commands.lock().take());
        let handle = self.writer.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Ledger writer task ended abnormally");
            }
        }
    }
}

#[async_trait]
impl<S: LedgerStore> LedgerApi for LedgerService<S> {
    async fn append(&self, device: &DeviceId, trust: TrustTier, reading: Reading) -> Result<Block, LedgerError> {
        let sender = self
            .commands
            .lock()
            .clone()
            .ok_or(LedgerError::WriterStopped)?;

        let (reply, response) = oneshot::channel();
        sender
            .send(AppendCommand {
                device: device.clone(),
                trust,
                reading,
                reply,
            })
            .await
            .map_err(|_| LedgerError::WriterStopped)?;

        response.await.map_err(|_| LedgerError::WriterStopped)?
    }

    async fn fetch_tail(&self) -> Result<Option<Block>, LedgerError> {
        Ok(self.store.fetch_tail().await?)
    }

    async fn range_by_location(
        &self,
        location: &DeviceId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Block>, LedgerError> {
        Ok(self.store.range_by_location(location, from, to).await?)
    }

    async fn block_count(&self) -> Result<u64, LedgerError> {
        Ok(self.store.count().await?)
    }

    async fn verify_chain(&self) -> Result<ChainSummary, LedgerError> {
        let mut verifier = ChainVerifier::new(&self.config.encoder);
        let mut violation = None;
        self.store
            .scan(&mut |block| match verifier.push(block) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    violation = Some(e);
                    ControlFlow::Break(())
                }
            })
            .await?;

        match violation {
            Some(violation) => Err(violation.into()),
            None => Ok(verifier.finish()),
        }
    }

    fn device_state(&self, device: &DeviceId) -> DeviceState {
        self.states.read().get(device)
    }
}

//! # Node Runtime
//!
//! Builds every subsystem from a `NodeConfig` and runs the long-lived
//! tasks.
//!
//! ## Startup Sequence
//!
//! 1. Lock the data directory
//! 2. Load the sequence record
//! 3. Open, verify and recover the ledger; start its writer
//! 4. Subscribe channel workers, the handshake listener and the fan-out
//!    forwarder (before any of them runs, so nothing published after
//!    `start` returns is missed)
//! 5. Bind the TCP bridge, if configured
//!
//! ## Shutdown Sequence
//!
//! 1. Signal every task through the `watch` channel and wait for it
//! 2. Drain the ledger writer

use crate::config::NodeConfig;
use crate::fanout::FanoutForwarder;
use crate::handshake::HandshakeListener;
use crate::pipeline::IngestPipeline;
use crate::transport::{InMemoryBroker, PubSubTransport, TcpBridge};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use shared_bus::{EventFilter, EventSubscriber, InMemoryEventBus};
use std::net::SocketAddr;
use std::sync::Arc;
use tl_01_authentication::adapters::FileSequencePersistence;
use tl_01_authentication::{AuthConfig, AuthenticationService, HandshakeResponder, SequenceStore};
use tl_02_ledger::adapters::{DataDirLock, EventBusObserver, JsonLinesLedgerStore};
use tl_02_ledger::{LedgerConfig, LedgerDependencies, LedgerService, SystemTimeSource};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub type NodeSequences = SequenceStore<FileSequencePersistence>;
pub type NodeAuthenticator = AuthenticationService<FileSequencePersistence>;
pub type NodeLedger = LedgerService<JsonLinesLedgerStore>;

/// The running node.
pub struct NodeRuntime {
    config: NodeConfig,
    broker: Arc<InMemoryBroker>,
    bus: Arc<InMemoryEventBus>,
    sequences: Arc<NodeSequences>,
    pipeline: IngestPipeline<NodeAuthenticator, NodeLedger>,
    handshake: Arc<HandshakeResponder<FileSequencePersistence>>,
    ledger: Arc<NodeLedger>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    bridge_addr: Mutex<Option<SocketAddr>>,
    // Dropped last: released only after everything above is torn down.
    _lock: DataDirLock,
}

impl NodeRuntime {
    /// Open storage and build every subsystem. Nothing runs until `start`.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        info!("Creating telemetry ledger node runtime");

        let lock = DataDirLock::acquire(&config.storage.data_dir)
            .context("Failed to lock data directory")?;

        let sequences = Arc::new(
            SequenceStore::load(FileSequencePersistence::new(config.storage.sequence_path()))
                .await
                .context("Failed to load sequence record")?,
        );

        let auth_config = AuthConfig::new(config.security.hmac_secret.clone())
            .with_provisioned(config.authenticated_devices().cloned());
        let handshake = Arc::new(HandshakeResponder::new(
            Arc::clone(&sequences),
            auth_config.provisioned.clone(),
        ));
        let authenticator = Arc::new(AuthenticationService::new(auth_config, Arc::clone(&sequences)));

        let store = JsonLinesLedgerStore::open(config.storage.ledger_path())
            .await
            .context("Failed to open ledger")?;
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.transport.event_capacity));
        let ledger = Arc::new(
            LedgerService::start(
                LedgerDependencies {
                    store: Arc::new(store),
                    observer: EventBusObserver::new(Arc::clone(&bus)),
                    time_source: SystemTimeSource,
                },
                LedgerConfig {
                    verify_on_start: config.storage.verify_on_start,
                    ..LedgerConfig::default()
                },
            )
            .await
            .context("Failed to start ledger")?,
        );

        let broker = Arc::new(InMemoryBroker::with_capacity(config.transport.broker_capacity));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            pipeline: IngestPipeline::new(authenticator, Arc::clone(&ledger)),
            config,
            broker,
            bus,
            sequences,
            handshake,
            ledger,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            bridge_addr: Mutex::new(None),
            _lock: lock,
        })
    }

    /// Subscribe and spawn every long-lived task.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Telemetry Ledger Ingest Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let mut tasks = Vec::new();

        for channel in &self.config.channels {
            let subscription = self
                .broker
                .subscribe(&channel.topic)
                .await
                .with_context(|| format!("Failed to subscribe to {}", channel.topic))?;
            tasks.push(tokio::spawn(self.pipeline.clone().run_channel(
                channel.clone(),
                subscription,
                self.shutdown_tx.subscribe(),
            )));
        }

        let handshake_topic = &self.config.transport.handshake_topic;
        let subscription = self
            .broker
            .subscribe(handshake_topic)
            .await
            .context("Failed to subscribe to handshake topic")?;
        let listener = HandshakeListener::new(
            Arc::clone(&self.broker),
            Arc::clone(&self.handshake),
            handshake_topic.clone(),
        );
        tasks.push(tokio::spawn(listener.run(subscription, self.shutdown_tx.subscribe())));

        let forwarder = FanoutForwarder::new(Arc::clone(&self.broker), self.config.transport.fanout_topic.clone());
        let committed = self.bus.subscribe(EventFilter::all());
        tasks.push(tokio::spawn(forwarder.run(committed, self.shutdown_tx.subscribe())));

        if let Some(addr) = self.config.transport.bind_addr {
            let bridge = TcpBridge::bind(addr, Arc::clone(&self.broker))
                .await
                .with_context(|| format!("Failed to bind TCP bridge on {}", addr))?;
            *self.bridge_addr.lock() = Some(bridge.local_addr()?);
            tasks.push(tokio::spawn(bridge.run(self.shutdown_tx.subscribe())));
        }

        self.tasks.lock().extend(tasks);

        info!(
            channels = self.config.channels.len(),
            known_devices = self.sequences.snapshot().len(),
            data_dir = %self.config.storage.data_dir.display(),
            "All subsystems running"
        );
        Ok(())
    }

    /// Stop every task, then drain the ledger writer.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            warn!(error = %e, "No task was listening for shutdown");
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Task ended abnormally");
            }
        }

        self.ledger.shutdown().await;
        info!("Shutdown complete");
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn broker(&self) -> &Arc<InMemoryBroker> {
        &self.broker
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    pub fn ledger(&self) -> &Arc<NodeLedger> {
        &self.ledger
    }

    pub fn sequences(&self) -> &Arc<NodeSequences> {
        &self.sequences
    }

    /// Address the TCP bridge is bound to, once started.
    pub fn bridge_addr(&self) -> Option<SocketAddr> {
        *self.bridge_addr.lock()
    }
}

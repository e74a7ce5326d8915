//! Test harness: the full ingest pipeline over in-memory adapters.

use ingest_node::{ChannelConfig, IngestPipeline, PipelineError};
use serde_json::{Map, Value};
use shared_bus::InMemoryEventBus;
use shared_types::{attach_tag, Block, CanonicalEncoder, DeviceId, TrustTier};
use std::sync::Arc;
use tl_01_authentication::adapters::InMemorySequencePersistence;
use tl_01_authentication::{AuthConfig, AuthenticationService, HandshakeResponder, SequenceStore};
use tl_02_ledger::adapters::{EventBusObserver, InMemoryLedgerStore};
use tl_02_ledger::{LedgerConfig, LedgerDependencies, LedgerService, SystemTimeSource};

pub const SECRET: &[u8] = b"IoT-shared-secret-for-tests";

pub type Authenticator = AuthenticationService<InMemorySequencePersistence>;
pub type Ledger = LedgerService<InMemoryLedgerStore>;

/// Everything a node wires together, minus the transport.
pub struct Harness {
    pub sequences: Arc<SequenceStore<InMemorySequencePersistence>>,
    pub persistence: InMemorySequencePersistence,
    pub authenticator: Arc<Authenticator>,
    pub handshake: HandshakeResponder<InMemorySequencePersistence>,
    pub store: Arc<InMemoryLedgerStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub ledger: Arc<Ledger>,
    pub pipeline: IngestPipeline<Authenticator, Ledger>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_state(InMemorySequencePersistence::new(), Arc::new(InMemoryLedgerStore::new())).await
    }

    /// Start over existing sequence and ledger state, as after a restart.
    pub async fn with_state(persistence: InMemorySequencePersistence, store: Arc<InMemoryLedgerStore>) -> Self {
        let sequences = Arc::new(
            SequenceStore::load(persistence.clone())
                .await
                .expect("load sequences"),
        );
        let config = AuthConfig::new(SECRET).with_provisioned([cafeteria(), fablab()]);
        let handshake = HandshakeResponder::new(Arc::clone(&sequences), config.provisioned.clone());
        let authenticator = Arc::new(AuthenticationService::new(config, Arc::clone(&sequences)));

        let bus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(
            LedgerService::start(
                LedgerDependencies {
                    store: Arc::clone(&store),
                    observer: EventBusObserver::new(Arc::clone(&bus)),
                    time_source: SystemTimeSource,
                },
                LedgerConfig::default(),
            )
            .await
            .expect("start ledger"),
        );

        Self {
            pipeline: IngestPipeline::new(Arc::clone(&authenticator), Arc::clone(&ledger)),
            sequences,
            persistence,
            authenticator,
            handshake,
            store,
            bus,
            ledger,
        }
    }

    /// Submit raw bytes as if received on `device`'s authenticated channel.
    pub async fn submit(&self, device: &DeviceId, payload: &[u8]) -> Result<Block, PipelineError> {
        self.pipeline.process(&channel(device), payload).await
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.store.snapshot()
    }
}

pub fn cafeteria() -> DeviceId {
    DeviceId::from("cafeteria")
}

pub fn fablab() -> DeviceId {
    DeviceId::from("fablab")
}

pub fn channel(device: &DeviceId) -> ChannelConfig {
    ChannelConfig::new(format!("cesi/{}", device), device.clone(), TrustTier::Authenticated)
}

/// Payload object with the device-side tag attached.
pub fn signed_object(fields: Value) -> Map<String, Value> {
    let Value::Object(map) = fields else {
        panic!("fields must be a JSON object");
    };
    attach_tag(&CanonicalEncoder::telemetry(), SECRET, map).expect("sign reading")
}

/// Transmittable bytes of a signed reading.
pub fn signed(fields: Value) -> Vec<u8> {
    serde_json::to_vec(&signed_object(fields)).expect("encode reading")
}

//! # Ingest Pipeline
//!
//! One reading, start to finish:
//!
//! ```text
//! bytes ──▶ parse ──▶ (authenticated channel?) verify ──▶ ledger.append ──▶ Block
//!             │                      │                        │
//!        Malformed               Rejected              Persistence / Chain
//! ```
//!
//! Nothing past the first failing stage runs, so a rejected reading never
//! reaches the ledger or the fan-out.

use crate::config::ChannelConfig;
use crate::transport::TopicSubscription;
use shared_types::{Block, EncodingError, Reading, TrustTier};
use std::sync::Arc;
use thiserror::Error;
use tl_01_authentication::{AuthError, AuthenticatorApi};
use tl_02_ledger::{LedgerApi, LedgerError};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Why a reading did not make it into the ledger.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] EncodingError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl PipelineError {
    /// Stable reason tag for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::Malformed(_) => "MalformedMessage",
            PipelineError::Auth(e) => e.reason(),
            PipelineError::Ledger(LedgerError::Encoding(_)) => "MalformedMessage",
            PipelineError::Ledger(LedgerError::Persistence(_)) => "PersistenceFailure",
            PipelineError::Ledger(LedgerError::ChainInconsistency { .. })
            | PipelineError::Ledger(LedgerError::Violation(_)) => "ChainInconsistency",
            PipelineError::Ledger(LedgerError::WriterStopped) => "WriterStopped",
        }
    }

    /// Dropped for cause (bad input), as opposed to an internal failure.
    pub fn is_rejection(&self) -> bool {
        match self {
            PipelineError::Malformed(_) => true,
            PipelineError::Auth(AuthError::PersistenceFailure(_)) => false,
            PipelineError::Auth(_) => true,
            PipelineError::Ledger(LedgerError::Encoding(_)) => true,
            PipelineError::Ledger(_) => false,
        }
    }
}

pub struct IngestPipeline<A, L> {
    authenticator: Arc<A>,
    ledger: Arc<L>,
}

impl<A, L> Clone for IngestPipeline<A, L> {
    fn clone(&self) -> Self {
        Self {
            authenticator: Arc::clone(&self.authenticator),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<A: AuthenticatorApi, L: LedgerApi> IngestPipeline<A, L> {
    pub fn new(authenticator: Arc<A>, ledger: Arc<L>) -> Self {
        Self { authenticator, ledger }
    }

    /// Run one payload received on `channel` through the pipeline.
    pub async fn process(&self, channel: &ChannelConfig, payload: &[u8]) -> Result<Block, PipelineError> {
        let object = Reading::parse_payload(payload)?;
        let reading = Reading::from_payload(&object)?;

        if channel.trust == TrustTier::Authenticated {
            let accepted = self.authenticator.verify(&channel.device, &object).await?;
            debug!(
                seq = accepted.seq,
                next_expected = accepted.next_expected,
                "Reading authenticated"
            );
        }

        Ok(self.ledger.append(&channel.device, channel.trust, reading).await?)
    }

    /// `process`, with every outcome logged at its severity.
    pub async fn handle(&self, channel: &ChannelConfig, payload: &[u8]) -> Option<Block> {
        match self.process(channel, payload).await {
            Ok(block) => {
                debug!(index = block.index, "Reading committed");
                Some(block)
            }
            Err(e) if e.is_rejection() => {
                warn!(reason = e.reason(), error = %e, "Reading rejected");
                None
            }
            Err(e) => {
                error!(reason = e.reason(), error = %e, "Reading not committed");
                None
            }
        }
    }

    /// Process every message on `subscription` in arrival order until
    /// shutdown or the transport goes away.
    pub async fn run_channel(
        self,
        channel: ChannelConfig,
        mut subscription: TopicSubscription,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(topic = %channel.topic, device = %channel.device, trust = %channel.trust, "Channel worker started");
        loop {
            let message = tokio::select! {
                message = subscription.recv() => message,
                _ = shutdown.changed() => break,
            };
            let Some(message) = message else {
                warn!(topic = %channel.topic, "Transport closed the channel");
                break;
            };

            let span = info_span!(
                "reading",
                message_id = %Uuid::new_v4(),
                topic = %channel.topic,
                device = %channel.device,
            );
            self.handle(&channel, &message.payload).instrument(span).await;
        }
        info!(topic = %channel.topic, "Channel worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use shared_types::{attach_tag, CanonicalEncoder, DeviceId, GENESIS_HASH};
    use tl_01_authentication::adapters::InMemorySequencePersistence;
    use tl_01_authentication::{AuthConfig, AuthRejection, AuthenticationService, SequenceStore};
    use tl_02_ledger::adapters::InMemoryLedgerStore;
    use tl_02_ledger::{LedgerConfig, LedgerDependencies, LedgerService, NoopObserver, SystemTimeSource};

    const SECRET: &[u8] = b"test-secret";

    type TestPipeline = IngestPipeline<
        AuthenticationService<InMemorySequencePersistence>,
        LedgerService<InMemoryLedgerStore>,
    >;

    async fn make_pipeline() -> (TestPipeline, Arc<InMemoryLedgerStore>) {
        let sequences = Arc::new(
            SequenceStore::load(InMemorySequencePersistence::new())
                .await
                .unwrap(),
        );
        let authenticator = Arc::new(AuthenticationService::new(AuthConfig::new(SECRET), sequences));

        let store = Arc::new(InMemoryLedgerStore::new());
        let ledger = LedgerService::start(
            LedgerDependencies {
                store: store.clone(),
                observer: NoopObserver,
                time_source: SystemTimeSource,
            },
            LedgerConfig::default(),
        )
        .await
        .unwrap();

        (IngestPipeline::new(authenticator, Arc::new(ledger)), store)
    }

    fn cafet() -> ChannelConfig {
        ChannelConfig::new("cesi/cafet", "cafet", TrustTier::Authenticated)
    }

    fn signed(fields: Value) -> Vec<u8> {
        let Value::Object(map) = fields else {
            panic!("fields must be an object");
        };
        let tagged: Map<String, Value> = attach_tag(&CanonicalEncoder::telemetry(), SECRET, map).unwrap();
        serde_json::to_vec(&tagged).unwrap()
    }

    #[tokio::test]
    async fn test_authenticated_reading_committed() {
        let (pipeline, store) = make_pipeline().await;

        let block = pipeline
            .process(&cafet(), &signed(json!({"temperature": 21.95, "seq": 0})))
            .await
            .unwrap();

        assert_eq!(block.index, 0);
        assert_eq!(block.previous_hash, GENESIS_HASH);
        assert_eq!(block.location, DeviceId::from("cafet"));
        assert_eq!(block.data.remote_temp, Some(22.0));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_replay_never_reaches_ledger() {
        let (pipeline, store) = make_pipeline().await;
        let message = signed(json!({"temperature": 20.0, "seq": 0}));

        pipeline.process(&cafet(), &message).await.unwrap();
        let err = pipeline.process(&cafet(), &message).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Auth(AuthError::Rejected(AuthRejection::ReplaySuspected { .. }))
        ));
        assert_eq!(err.reason(), "ReplaySuspected");
        assert!(err.is_rejection());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let (pipeline, store) = make_pipeline().await;

        let err = pipeline
            .process(&cafet(), br#"{"temperature":20.0}"#)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "MissingCredentials");
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unauthenticated_channel_labelled() {
        let (pipeline, _store) = make_pipeline().await;
        let legacy = ChannelConfig::new("legacy/fablab", "fablab", TrustTier::Unauthenticated);

        let block = pipeline
            .process(&legacy, br#"{"temperature":18.44,"dhtStatus":true}"#)
            .await
            .unwrap();

        assert_eq!(block.trust, TrustTier::Unauthenticated);
        assert_eq!(block.data.remote_temp, Some(18.4));
        assert_eq!(block.data.dht_status, Some(true));
    }

    #[tokio::test]
    async fn test_malformed_payloads() {
        let (pipeline, store) = make_pipeline().await;

        let payloads: [&[u8]; 3] = [
            b"not json",
            b"[1,2,3]",
            br#"{"temperature":"warm","seq":0,"hmac":"00"}"#,
        ];
        for payload in payloads {
            let err = pipeline.process(&cafet(), payload).await.unwrap_err();
            assert_eq!(err.reason(), "MalformedMessage", "payload {:?}", payload);
            assert!(err.is_rejection());
        }
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_field_in_payload_rejected_before_seq() {
        let (pipeline, store) = make_pipeline().await;

        let err = pipeline
            .process(&cafet(), &signed(json!({"temperature": 20.0, "remoteTemp": 99.04, "seq": 0})))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "MalformedMessage");
        assert!(store.snapshot().is_empty());

        // seq 0 is still unused
        let block = pipeline
            .process(&cafet(), &signed(json!({"temperature": 20.0, "seq": 0})))
            .await
            .unwrap();
        assert_eq!(block.index, 0);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_not_a_rejection() {
        let (pipeline, store) = make_pipeline().await;
        store.set_fail_writes(true);

        let err = pipeline
            .process(&cafet(), &signed(json!({"temperature": 20.0, "seq": 0})))
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "PersistenceFailure");
        assert!(!err.is_rejection());
        assert!(pipeline.handle(&cafet(), &signed(json!({"seq": 1}))).await.is_none());
    }
}

//! # Authentication Service
//!
//! Implements `AuthenticatorApi` on top of a `SequenceStore`.

use crate::domain::config::AuthConfig;
use crate::domain::credentials::Credentials;
use crate::domain::errors::{AuthError, AuthRejection};
use crate::ports::inbound::{Accepted, AuthenticatorApi};
use crate::ports::outbound::SequencePersistence;
use crate::service::sequence_store::SequenceStore;
use async_trait::async_trait;
use serde_json::{Map, Value};
use shared_types::{verify_tag, DeviceId};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct AuthenticationService<P: SequencePersistence> {
    config: AuthConfig,
    store: Arc<SequenceStore<P>>,
}

impl<P: SequencePersistence> AuthenticationService<P> {
    pub fn new(config: AuthConfig, store: Arc<SequenceStore<P>>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &Arc<SequenceStore<P>> {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn verify_locked(
        &self,
        device: &DeviceId,
        payload: &Map<String, Value>,
        credentials: Credentials,
    ) -> Result<Accepted, AuthError> {
        let expected = self.store.expected(device);
        if credentials.seq < expected {
            return Err(AuthRejection::ReplaySuspected {
                expected,
                received: credentials.seq,
            }
            .into());
        }

        let valid = verify_tag(
            &self.config.encoder,
            self.config.secret(),
            payload,
            &credentials.tag,
        )?;
        if !valid {
            return Err(AuthRejection::SignatureInvalid.into());
        }

        let next_expected = self.store.advance(device, credentials.seq).await?;

        Ok(Accepted {
            device: device.clone(),
            seq: credentials.seq,
            next_expected,
        })
    }
}

#[async_trait]
impl<P: SequencePersistence> AuthenticatorApi for AuthenticationService<P> {
    async fn verify(&self, device: &DeviceId, payload: &Map<String, Value>) -> Result<Accepted, AuthError> {
        let result = match Credentials::extract(payload) {
            Ok(credentials) => {
                let lock = self.store.device_lock(device);
                let _guard = lock.lock().await;
                self.verify_locked(device, payload, credentials).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(accepted) => debug!(
                device = %device,
                seq = accepted.seq,
                next_expected = accepted.next_expected,
                "Reading authenticated"
            ),
            Err(e) if e.is_rejection() => {
                warn!(device = %device, reason = e.reason(), detail = %e, "Reading rejected")
            }
            // Faults are logged by whoever owns the failure
            Err(_) => {}
        }
        result
    }

    fn expected(&self, device: &DeviceId) -> u64 {
        self.store.expected(device)
    }
}

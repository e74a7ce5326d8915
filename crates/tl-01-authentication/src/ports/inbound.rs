//! # Inbound Ports (Driving Ports)
//!
//! The API the ingest pipeline calls.

use crate::domain::errors::AuthError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use shared_types::{DeviceId, HandshakeRequest, HandshakeResponse};

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub device: DeviceId,
    /// The accepted sequence number.
    pub seq: u64,
    /// Expected sequence number after acceptance, already persisted.
    pub next_expected: u64,
}

/// Reading authenticator.
#[async_trait]
pub trait AuthenticatorApi: Send + Sync {
    /// Verify a raw reading payload from `device`.
    ///
    /// On success the device's expected sequence number has been advanced
    /// and durably persisted. On any error nothing was changed.
    async fn verify(&self, device: &DeviceId, payload: &Map<String, Value>) -> Result<Accepted, AuthError>;

    /// Current next expected sequence number for `device`.
    fn expected(&self, device: &DeviceId) -> u64;
}

/// Sequence resynchronization for rebooted devices.
pub trait HandshakeApi: Send + Sync {
    /// Answer a handshake, or `None` for an unknown identity.
    fn respond(&self, request: &HandshakeRequest) -> Option<HandshakeResponse>;
}

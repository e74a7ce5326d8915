//! # Wire Payloads
//!
//! Payloads exchanged with devices outside of readings.
//!
//! ## Handshake
//!
//! A rebooted device publishes `HandshakeRequest` on the handshake topic and
//! listens on `<handshake-topic>/<id>` for its `HandshakeResponse`.

use crate::entities::DeviceId;
use serde::{Deserialize, Serialize};

/// Request for the next expected sequence number.
/// Sender: device | Receiver: Handshake Responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub id: DeviceId,
}

/// Resynchronization answer.
/// Sender: Handshake Responder | Receiver: device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub id: DeviceId,
    /// Next sequence number the node will accept from `id`.
    pub seq: u64,
}

/// Topic a handshake response for `device` is published on.
pub fn handshake_response_topic(handshake_topic: &str, device: &DeviceId) -> String {
    format!("{}/{}", handshake_topic.trim_end_matches('/'), device)
}

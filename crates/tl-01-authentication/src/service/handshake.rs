//! # Handshake Responder
//!
//! Tells a rebooted device where to resume its sequence numbers. The
//! request is unauthenticated: the answer is a non-secret counter and is
//! only given for identities that are provisioned or already known.

use crate::ports::inbound::HandshakeApi;
use crate::ports::outbound::SequencePersistence;
use crate::service::sequence_store::SequenceStore;
use shared_types::{DeviceId, HandshakeRequest, HandshakeResponse};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct HandshakeResponder<P: SequencePersistence> {
    store: Arc<SequenceStore<P>>,
    provisioned: BTreeSet<DeviceId>,
}

impl<P: SequencePersistence> HandshakeResponder<P> {
    pub fn new(store: Arc<SequenceStore<P>>, provisioned: BTreeSet<DeviceId>) -> Self {
        Self { store, provisioned }
    }

    pub fn is_known(&self, device: &DeviceId) -> bool {
        self.provisioned.contains(device) || self.store.contains(device)
    }
}

impl<P: SequencePersistence> HandshakeApi for HandshakeResponder<P> {
    fn respond(&self, request: &HandshakeRequest) -> Option<HandshakeResponse> {
        if !self.is_known(&request.id) {
            debug!(device = %request.id, "Handshake for unknown device ignored");
            return None;
        }

        let seq = self.store.expected(&request.id);
        info!(device = %request.id, seq, "Handshake answered");
        Some(HandshakeResponse {
            id: request.id.clone(),
            seq,
        })
    }
}

//! Authenticator configuration.

use shared_types::{CanonicalEncoder, DeviceId};
use std::collections::BTreeSet;
use std::fmt;

/// Shared secret, encoder and the identities provisioned out of band.
#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    /// Encoder shared with device-side signing.
    pub encoder: CanonicalEncoder,
    /// Devices a handshake is answered for even before their first reading.
    pub provisioned: BTreeSet<DeviceId>,
}

impl AuthConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            encoder: CanonicalEncoder::telemetry(),
            provisioned: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_provisioned<I>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = DeviceId>,
    {
        self.provisioned.extend(devices);
        self
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: CanonicalEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("encoder", &self.encoder)
            .field("provisioned", &self.provisioned)
            .finish()
    }
}

//! Anti-replay credentials carried inside a reading.

use crate::domain::errors::{AuthError, AuthRejection};
use serde_json::{Map, Value};
use shared_types::{EncodingError, TAG_FIELD};

/// Field carrying the sequence number.
pub const SEQ_FIELD: &str = "seq";

/// Highest acceptable `seq`. Accepting `u64::MAX` would leave no next
/// expected value above it, so the same message would verify forever.
pub const MAX_SEQ: u64 = u64::MAX - 1;

/// `seq` and hex tag pulled from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub seq: u64,
    pub tag: String,
}

impl Credentials {
    /// Extract credentials. `null` counts as absent.
    ///
    /// # Errors
    ///
    /// - `AuthRejection::MissingCredentials` if either field is absent
    /// - `AuthError::Malformed` if present with the wrong type, or `seq`
    ///   is above `MAX_SEQ`
    pub fn extract(payload: &Map<String, Value>) -> Result<Self, AuthError> {
        let seq = payload.get(SEQ_FIELD).filter(|v| !v.is_null());
        let tag = payload.get(TAG_FIELD).filter(|v| !v.is_null());

        let (seq, tag) = match (seq, tag) {
            (Some(seq), Some(tag)) => (seq, tag),
            (None, None) => {
                return Err(AuthRejection::MissingCredentials {
                    missing: "seq and hmac",
                }
                .into())
            }
            (None, Some(_)) => return Err(AuthRejection::MissingCredentials { missing: "seq" }.into()),
            (Some(_), None) => return Err(AuthRejection::MissingCredentials { missing: "hmac" }.into()),
        };

        let seq = seq.as_u64().ok_or_else(|| {
            EncodingError::InvalidPayload(format!("seq must be a non-negative integer, got {}", seq))
        })?;
        if seq > MAX_SEQ {
            return Err(EncodingError::InvalidPayload(format!(
                "seq {} exhausts the sequence space",
                seq
            ))
            .into());
        }
        let tag = tag
            .as_str()
            .ok_or_else(|| EncodingError::InvalidPayload("hmac must be a hex string".into()))?
            .to_string();

        Ok(Self { seq, tag })
    }
}

//! # Reading Authentication Helpers
//!
//! The single implementation of the device HMAC tag and the ledger content
//! hash. Devices (or test publishers) sign with `sign_reading`; the ingest
//! node verifies with `verify_tag`. Both run the payload through the same
//! `CanonicalEncoder`.
//!
//! ## Security Properties
//!
//! - **HMAC-SHA256** over the canonical encoding of the payload minus its
//!   `hmac` field. `seq` and unknown status flags are covered.
//! - **Constant-time comparison** via `Mac::verify_slice`.
//! - **Normalized measurements**, so float noise on the device side does not
//!   break verification.
//!
//! The device identity is not part of the tagged payload; it is bound by the
//! channel the reading arrives on.

use crate::canonical::CanonicalEncoder;
use crate::errors::EncodingError;
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Name of the field carrying the hex tag inside a reading.
pub const TAG_FIELD: &str = "hmac";

/// Copy of `payload` without its tag field.
pub fn strip_tag(payload: &Map<String, Value>) -> Map<String, Value> {
    let mut stripped = payload.clone();
    stripped.remove(TAG_FIELD);
    stripped
}

/// Raw HMAC-SHA256 of the canonical encoding of `payload` minus its tag.
pub fn compute_tag(
    encoder: &CanonicalEncoder,
    secret: &[u8],
    payload: &Map<String, Value>,
) -> Result<Vec<u8>, EncodingError> {
    let message = encoder.encode_object(&strip_tag(payload))?;
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| EncodingError::InvalidPayload(e.to_string()))?;
    mac.update(&message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hex tag a device attaches as the `hmac` field.
pub fn sign_reading(
    encoder: &CanonicalEncoder,
    secret: &[u8],
    payload: &Map<String, Value>,
) -> Result<String, EncodingError> {
    Ok(hex::encode(compute_tag(encoder, secret, payload)?))
}

/// Sign `payload` and insert the tag, returning the transmittable object.
pub fn attach_tag(
    encoder: &CanonicalEncoder,
    secret: &[u8],
    mut payload: Map<String, Value>,
) -> Result<Map<String, Value>, EncodingError> {
    let tag = sign_reading(encoder, secret, &payload)?;
    payload.insert(TAG_FIELD.to_string(), Value::String(tag));
    Ok(payload)
}

/// Verify a hex tag against `payload` in constant time.
///
/// A tag that is not valid hex, or has the wrong length, is simply a
/// mismatch.
pub fn verify_tag(
    encoder: &CanonicalEncoder,
    secret: &[u8],
    payload: &Map<String, Value>,
    tag_hex: &str,
) -> Result<bool, EncodingError> {
    let Ok(supplied) = hex::decode(tag_hex) else {
        return Ok(false);
    };

    let message = encoder.encode_object(&strip_tag(payload))?;
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| EncodingError::InvalidPayload(e.to_string()))?;
    mac.update(&message);
    Ok(mac.verify_slice(&supplied).is_ok())
}

/// Hex SHA-256 of already-encoded bytes.
pub fn content_hash(encoded: &[u8]) -> String {
    hex::encode(Sha256::digest(encoded))
}

//! # Block Construction
//!
//! Pure functions computing the content hash and the next block. No I/O.
//!
//! The content hash is SHA-256 over the canonical encoding of
//!
//! ```text
//! { "data": <snapshot>, "index": n, "location": "...", "previousHash": "...",
//!   "timestamp": "YYYY-MM-DDTHH:MM:SS.mmmZ", "trust": "authenticated" }
//! ```
//!
//! with keys sorted and measurements normalized like every other encoding.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use shared_types::{
    content_hash, format_timestamp, Block, CanonicalEncoder, DeviceId, DeviceState,
    EncodingError, TrustTier, GENESIS_HASH,
};

/// Content hash of a block's fields.
pub fn compute_hash(
    encoder: &CanonicalEncoder,
    index: u64,
    previous_hash: &str,
    timestamp: &DateTime<Utc>,
    location: &DeviceId,
    trust: TrustTier,
    data: &DeviceState,
) -> Result<String, EncodingError> {
    let mut fields = Map::new();
    fields.insert("index".into(), Value::from(index));
    fields.insert("previousHash".into(), Value::from(previous_hash));
    fields.insert("timestamp".into(), Value::from(format_timestamp(timestamp)));
    fields.insert("location".into(), Value::from(location.as_str()));
    fields.insert("trust".into(), Value::from(trust.as_str()));
    fields.insert("data".into(), Value::Object(data.to_object()?));

    Ok(content_hash(&encoder.encode_object(&fields)?))
}

/// Recompute the hash a stored block should carry.
pub fn recompute_hash(encoder: &CanonicalEncoder, block: &Block) -> Result<String, EncodingError> {
    compute_hash(
        encoder,
        block.index,
        &block.previous_hash,
        &block.timestamp,
        &block.location,
        block.trust,
        &block.data,
    )
}

/// Index and `previousHash` of the block that follows `tail`.
pub fn next_link(tail: Option<&Block>) -> (u64, String) {
    match tail {
        Some(tail) => (tail.index + 1, tail.hash.clone()),
        None => (0, GENESIS_HASH.to_string()),
    }
}

/// Build the block that extends `tail` with `data`.
pub fn build_next(
    encoder: &CanonicalEncoder,
    tail: Option<&Block>,
    location: &DeviceId,
    trust: TrustTier,
    data: DeviceState,
    timestamp: DateTime<Utc>,
) -> Result<Block, EncodingError> {
    let (index, previous_hash) = next_link(tail);
    let hash = compute_hash(
        encoder,
        index,
        &previous_hash,
        &timestamp,
        location,
        trust,
        &data,
    )?;

    Ok(Block {
        index,
        timestamp,
        location: location.clone(),
        trust,
        data,
        previous_hash,
        hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::now_millis;

    fn snapshot(temp: f64) -> DeviceState {
        DeviceState {
            remote_temp: Some(temp),
            ..Default::default()
        }
    }

    #[test]
    fn test_genesis_link() {
        let encoder = CanonicalEncoder::telemetry();
        let block = build_next(
            &encoder,
            None,
            &DeviceId::from("cafet"),
            TrustTier::Authenticated,
            snapshot(22.0),
            now_millis(),
        )
        .unwrap();

        assert_eq!(block.index, 0);
        assert_eq!(block.previous_hash, GENESIS_HASH);
        assert_eq!(block.hash.len(), 64);
        assert_ne!(block.hash, GENESIS_HASH);
        assert_eq!(recompute_hash(&encoder, &block).unwrap(), block.hash);
    }

    #[test]
    fn test_links_to_tail() {
        let encoder = CanonicalEncoder::telemetry();
        let at = now_millis();
        let genesis = build_next(
            &encoder,
            None,
            &DeviceId::from("cafet"),
            TrustTier::Authenticated,
            snapshot(22.0),
            at,
        )
        .unwrap();
        let next = build_next(
            &encoder,
            Some(&genesis),
            &DeviceId::from("fablab"),
            TrustTier::Authenticated,
            snapshot(19.5),
            at,
        )
        .unwrap();

        assert_eq!(next.index, 1);
        assert_eq!(next.previous_hash, genesis.hash);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let encoder = CanonicalEncoder::telemetry();
        let at = now_millis();
        let device = DeviceId::from("cafet");

        let a = compute_hash(&encoder, 4, GENESIS_HASH, &at, &device, TrustTier::Authenticated, &snapshot(22.0)).unwrap();
        let b = compute_hash(&encoder, 4, GENESIS_HASH, &at, &device, TrustTier::Authenticated, &snapshot(22.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_field_covered() {
        let encoder = CanonicalEncoder::telemetry();
        let at = now_millis();
        let later = at + chrono::Duration::milliseconds(1);
        let device = DeviceId::from("cafet");
        let base = compute_hash(&encoder, 4, GENESIS_HASH, &at, &device, TrustTier::Authenticated, &snapshot(22.0)).unwrap();

        let variants = [
            compute_hash(&encoder, 5, GENESIS_HASH, &at, &device, TrustTier::Authenticated, &snapshot(22.0)),
            compute_hash(&encoder, 4, &"1".repeat(64), &at, &device, TrustTier::Authenticated, &snapshot(22.0)),
            compute_hash(&encoder, 4, GENESIS_HASH, &later, &device, TrustTier::Authenticated, &snapshot(22.0)),
            compute_hash(&encoder, 4, GENESIS_HASH, &at, &DeviceId::from("fablab"), TrustTier::Authenticated, &snapshot(22.0)),
            compute_hash(&encoder, 4, GENESIS_HASH, &at, &device, TrustTier::Unauthenticated, &snapshot(22.0)),
            compute_hash(&encoder, 4, GENESIS_HASH, &at, &device, TrustTier::Authenticated, &snapshot(22.1)),
        ];
        for variant in variants {
            assert_ne!(variant.unwrap(), base);
        }
    }
}

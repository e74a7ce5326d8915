//! # Randomized Checks
//!
//! Seeded random inputs against the guarantees the pipeline makes:
//! monotonic sequences, contiguous chains, tamper-evident hashes and tags.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ingest_node::PipelineError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::{json, Map, Value};
    use shared_types::{
        sign_reading, verify_tag, CanonicalEncoder, DeviceState, TrustTier, TAG_FIELD,
    };
    use std::sync::Arc;
    use tl_01_authentication::{AuthError, AuthRejection};
    use tl_02_ledger::{compute_hash, LedgerApi};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x7e1e_3e74)
    }

    #[tokio::test]
    async fn test_sequence_gaps_track_highest_accepted() {
        let node = Harness::new().await;
        let mut rng = rng();
        let mut seq = 0u64;

        for _ in 0..40 {
            seq += rng.gen_range(1..10);
            node.submit(&cafeteria(), &signed(json!({"seq": seq, "temperature": 20.0})))
                .await
                .unwrap();
            assert_eq!(node.authenticator.store().expected(&cafeteria()), seq + 1);

            // Anything at or below the last accepted value is a replay
            let stale = rng.gen_range(0..=seq);
            let replay = node
                .submit(&cafeteria(), &signed(json!({"seq": stale, "temperature": 20.0})))
                .await;
            assert!(matches!(
                replay,
                Err(PipelineError::Auth(AuthError::Rejected(AuthRejection::ReplaySuspected { .. })))
            ));
        }

        assert_eq!(node.ledger.block_count().await.unwrap(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_random_interleaving_keeps_chain_contiguous() {
        let node = Arc::new(Harness::new().await);
        let mut rng = rng();

        let mut handles = Vec::new();
        for device in [cafeteria(), fablab()] {
            let node = Arc::clone(&node);
            let readings: Vec<f64> = (0..25).map(|_| rng.gen_range(15.0..30.0)).collect();
            handles.push(tokio::spawn(async move {
                for (seq, temperature) in readings.into_iter().enumerate() {
                    node.submit(&device, &signed(json!({"seq": seq, "temperature": temperature})))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let blocks = node.blocks();
        assert_eq!(blocks.len(), 50);
        for (position, block) in blocks.iter().enumerate() {
            assert_eq!(block.index, position as u64);
            if position > 0 {
                assert_eq!(block.previous_hash, blocks[position - 1].hash);
            }
        }
        assert_eq!(node.ledger.verify_chain().await.unwrap().length, 50);
    }

    #[test]
    fn test_tenth_of_a_degree_changes_hash() {
        let encoder = CanonicalEncoder::telemetry();
        let at = shared_types::now_millis();
        let mut rng = rng();

        for _ in 0..20 {
            let base = (rng.gen_range(100..350) as f64) / 10.0;
            let state = |temp: f64| DeviceState {
                remote_temp: Some(temp),
                ..Default::default()
            };
            let a = compute_hash(&encoder, 0, "00", &at, &cafeteria(), TrustTier::Authenticated, &state(base))
                .unwrap();
            let b = compute_hash(
                &encoder,
                0,
                "00",
                &at,
                &cafeteria(),
                TrustTier::Authenticated,
                &state(base + 0.1),
            )
            .unwrap();
            assert_ne!(a, b, "hash must change between {} and {}", base, base + 0.1);
        }
    }

    #[test]
    fn test_tag_ignores_key_order() {
        let encoder = CanonicalEncoder::telemetry();
        let mut rng = rng();

        for _ in 0..20 {
            let mut entries = vec![
                ("temperature", json!(rng.gen_range(10.0..30.0))),
                ("humidity", json!(rng.gen_range(20.0..80.0))),
                ("loraStatus", json!(rng.gen_bool(0.5))),
                ("seq", json!(rng.gen_range(0u64..1_000))),
            ];
            let forward: Map<String, Value> =
                entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
            entries.reverse();
            let backward: Map<String, Value> =
                entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();

            let tag = sign_reading(&encoder, SECRET, &forward).unwrap();
            assert!(verify_tag(&encoder, SECRET, &backward, &tag).unwrap());
        }
    }

    #[tokio::test]
    async fn test_single_bit_flip_in_tag_is_rejected() {
        let node = Harness::new().await;
        let mut rng = rng();

        for seq in 0..16u64 {
            let mut object = signed_object(json!({"seq": seq, "temperature": 21.0}));
            let Some(Value::String(tag)) = object.get(TAG_FIELD) else {
                panic!("signed reading carries a tag");
            };
            let mut raw = hex::decode(tag).unwrap();
            let bit = rng.gen_range(0..raw.len() * 8);
            raw[bit / 8] ^= 1 << (bit % 8);
            object.insert(TAG_FIELD.into(), Value::String(hex::encode(raw)));

            let result = node
                .submit(&cafeteria(), &serde_json::to_vec(&object).unwrap())
                .await;
            assert!(matches!(
                result,
                Err(PipelineError::Auth(AuthError::Rejected(AuthRejection::SignatureInvalid)))
            ));
        }

        assert!(node.blocks().is_empty());
        assert_eq!(node.authenticator.store().expected(&cafeteria()), 0);
    }

    #[tokio::test]
    async fn test_changed_measurement_is_rejected() {
        let node = Harness::new().await;
        let mut rng = rng();

        for seq in 0..16u64 {
            let temperature = (rng.gen_range(100..350) as f64) / 10.0;
            let mut object = signed_object(json!({"seq": seq, "temperature": temperature}));
            object.insert("temperature".into(), json!(temperature + 0.1));

            let result = node
                .submit(&cafeteria(), &serde_json::to_vec(&object).unwrap())
                .await;
            assert!(matches!(
                result,
                Err(PipelineError::Auth(AuthError::Rejected(AuthRejection::SignatureInvalid)))
            ));
        }
        assert!(node.blocks().is_empty());
    }
}

//! # Field Scenarios
//!
//! Walk-throughs of what happens at the cafeteria and the fablab: first
//! reading, a captured packet replayed, two devices at once, and a device
//! rebooting and resynchronizing.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ingest_node::PipelineError;
    use serde_json::json;
    use shared_types::{HandshakeRequest, GENESIS_HASH};
    use tl_01_authentication::{AuthError, AuthRejection, HandshakeApi};
    use tl_02_ledger::LedgerApi;

    #[tokio::test]
    async fn test_cafeteria_first_reading_is_genesis() {
        let node = Harness::new().await;

        let block = node
            .submit(
                &cafeteria(),
                &signed(json!({"temperature": 21.95, "humidity": 40.04, "seq": 0})),
            )
            .await
            .unwrap();

        assert_eq!(block.index, 0);
        assert_eq!(block.previous_hash, GENESIS_HASH);
        assert_eq!(block.location, cafeteria());
        assert_eq!(block.data.remote_temp, Some(22.0));
        assert_eq!(block.data.remote_hum, Some(40.0));
        assert!(block.data.last_update.is_some());
        assert_eq!(node.authenticator.store().expected(&cafeteria()), 1);
    }

    #[tokio::test]
    async fn test_replayed_packet_leaves_ledger_untouched() {
        let node = Harness::new().await;
        let packet = signed(json!({"temperature": 21.5, "seq": 0}));

        node.submit(&cafeteria(), &packet).await.unwrap();
        let replay = node.submit(&cafeteria(), &packet).await;

        assert!(matches!(
            replay,
            Err(PipelineError::Auth(AuthError::Rejected(AuthRejection::ReplaySuspected {
                expected: 1,
                received: 0
            })))
        ));
        let tail = node.ledger.fetch_tail().await.unwrap().unwrap();
        assert_eq!(tail.index, 0);
        assert_eq!(node.ledger.block_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_two_devices_at_once_share_one_chain() {
        let node = Harness::new().await;
        let cafet_packet = signed(json!({"temperature": 21.0, "seq": 0}));
        let fablab_packet = signed(json!({"temperature": 19.0, "seq": 0}));

        let (cafet_id, fablab_id) = (cafeteria(), fablab());
        let (cafet, fablab) = tokio::join!(
            node.submit(&cafet_id, &cafet_packet),
            node.submit(&fablab_id, &fablab_packet),
        );
        let (cafet, fablab) = (cafet.unwrap(), fablab.unwrap());

        let mut indices = [cafet.index, fablab.index];
        indices.sort_unstable();
        assert_eq!(indices, [0, 1]);

        let blocks = node.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].previous_hash, blocks[0].hash);
        assert_eq!(node.ledger.verify_chain().await.unwrap().length, 2);
    }

    #[tokio::test]
    async fn test_rebooted_device_resynchronizes() {
        let node = Harness::new().await;
        for seq in 0..5 {
            node.submit(&fablab(), &signed(json!({"temperature": 20.0, "seq": seq})))
                .await
                .unwrap();
        }

        // Restart the node over the same state, then the device reboots
        // and asks where to resume.
        node.ledger.shutdown().await;
        let restarted = Harness::with_state(node.persistence.clone(), node.store.clone()).await;
        let answer = restarted
            .handshake
            .respond(&HandshakeRequest { id: fablab() })
            .unwrap();
        assert_eq!(answer.seq, 5);
        assert_eq!(answer.seq, restarted.authenticator.store().expected(&fablab()));

        // Restarting from zero would be a replay
        let stale = restarted
            .submit(&fablab(), &signed(json!({"temperature": 20.0, "seq": 0})))
            .await;
        assert!(matches!(stale, Err(ref e) if e.is_rejection()));

        let resumed = restarted
            .submit(&fablab(), &signed(json!({"temperature": 20.4, "seq": answer.seq})))
            .await
            .unwrap();
        assert_eq!(resumed.index, 5);
        assert_eq!(resumed.data.remote_temp, Some(20.4));
    }

    #[tokio::test]
    async fn test_forged_reading_is_dropped() {
        let node = Harness::new().await;
        let mut forged = signed_object(json!({"temperature": 21.0, "seq": 0}));
        forged.insert("temperature".into(), json!(35.0));

        let result = node
            .submit(&cafeteria(), &serde_json::to_vec(&forged).unwrap())
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::Auth(AuthError::Rejected(AuthRejection::SignatureInvalid)))
        ));
        assert!(node.blocks().is_empty());
        assert_eq!(node.authenticator.store().expected(&cafeteria()), 0);
    }
}

//! # Live Fan-Out
//!
//! Subscribers see committed blocks in commit order, filtered by location,
//! and recover anything they missed from the ledger's range reads.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use serde_json::json;
    use shared_bus::{EventFilter, LedgerEvent, Subscription};
    use shared_types::Block;
    use std::time::Duration;
    use tl_02_ledger::LedgerApi;

    async fn next_block(subscription: &mut Subscription) -> Block {
        let event = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
            .await
            .expect("event within timeout")
            .expect("bus open");
        match event {
            LedgerEvent::BlockCommitted(block) => block,
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_commit_order() {
        let node = Harness::new().await;
        let mut first = node.bus.subscribe(EventFilter::all());
        let mut second = node.bus.subscribe(EventFilter::all());

        let mut committed = Vec::new();
        for seq in 0..6u64 {
            let device = if seq % 2 == 0 { cafeteria() } else { fablab() };
            let block = node
                .submit(&device, &signed(json!({"seq": seq / 2, "temperature": 20.0 + seq as f64})))
                .await
                .unwrap();
            committed.push(block);
        }

        for subscription in [&mut first, &mut second] {
            for expected in &committed {
                assert_eq!(&next_block(subscription).await, expected);
            }
        }
    }

    #[tokio::test]
    async fn test_location_filter() {
        let node = Harness::new().await;
        let mut fablab_only = node.bus.subscribe(EventFilter::locations(vec![fablab()]));

        node.submit(&cafeteria(), &signed(json!({"seq": 0, "temperature": 21.0})))
            .await
            .unwrap();
        let fablab_block = node
            .submit(&fablab(), &signed(json!({"seq": 0, "temperature": 18.5})))
            .await
            .unwrap();

        assert_eq!(next_block(&mut fablab_only).await, fablab_block);
        assert!(fablab_only.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_reading_not_fanned_out() {
        let node = Harness::new().await;
        let mut subscription = node.bus.subscribe(EventFilter::all());
        let packet = signed(json!({"seq": 0, "temperature": 21.0}));

        let block = node.submit(&cafeteria(), &packet).await.unwrap();
        assert!(node.submit(&cafeteria(), &packet).await.is_err());

        assert_eq!(next_block(&mut subscription).await, block);
        assert!(subscription.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_late_subscriber_recovers_history() {
        let node = Harness::new().await;
        for seq in 0..3u64 {
            node.submit(&cafeteria(), &signed(json!({"seq": seq, "temperature": 21.0})))
                .await
                .unwrap();
        }
        node.submit(&fablab(), &signed(json!({"seq": 0, "temperature": 19.0})))
            .await
            .unwrap();

        // Joined after the fact: nothing is replayed live
        let mut late = node.bus.subscribe(EventFilter::all());
        assert!(late.try_recv().unwrap().is_none());

        let history = node
            .ledger
            .range_by_location(&cafeteria(), None, None)
            .await
            .unwrap();
        assert_eq!(history.iter().map(|b| b.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(history.iter().all(|b| b.location == cafeteria()));

        let live = node
            .submit(&cafeteria(), &signed(json!({"seq": 3, "temperature": 21.2})))
            .await
            .unwrap();
        assert_eq!(next_block(&mut late).await, live);
        assert_eq!(live.previous_hash, node.blocks()[3].hash);
    }
}

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use transactional_messaging::store::{OutboxStore, PgOutboxStore};
use transactional_messaging::OutboxDispatcher;

use common::{start_db, FakePublisher};

#[tokio::test]
async fn test_single_row_drain_publishes_and_marks_processed() {
    let db = start_db().await;
    let store: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(db.pool.clone()));
    let publisher = Arc::new(FakePublisher::default());

    let mut dispatcher = OutboxDispatcher::new(store.clone(), publisher.clone(), 1, 10, None);
    dispatcher
        .save("orders.created", Some("order-1"), json!({ "n": 1 }))
        .await
        .expect("save outbox row");

    dispatcher.start();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    dispatcher.stop().await;

    let published = publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "orders.created");
    assert_eq!(published[0].payload, json!({ "n": 1 }));

    let (pending, _) = store.pending_stats().await.unwrap();
    assert_eq!(pending, 0);
}

#[tokio::test]
async fn test_publish_failure_keeps_row_pending_for_retry() {
    let db = start_db().await;
    let store: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(db.pool.clone()));
    let publisher = Arc::new(FakePublisher::default());
    // Fail all 3 attempts within the chunk retry (max_retries=2 => 3 total attempts).
    *publisher.fail_next.lock().unwrap() = 3;

    let mut dispatcher = OutboxDispatcher::new(store.clone(), publisher.clone(), 1, 10, None);
    dispatcher
        .save("orders.created", Some("order-2"), json!({ "n": 2 }))
        .await
        .expect("save outbox row");

    dispatcher.start();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    dispatcher.stop().await;

    assert!(publisher.published.lock().unwrap().is_empty());
    let (pending, _) = store.pending_stats().await.unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn test_batch_boundary_splits_into_chunks() {
    let db = start_db().await;
    let store: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(db.pool.clone()));
    let publisher = Arc::new(FakePublisher::default());

    let dispatcher = OutboxDispatcher::new(store.clone(), publisher.clone(), 1, 100, None);
    for n in 0..250 {
        dispatcher
            .save("orders.created", Some("order"), json!({ "n": n }))
            .await
            .expect("save outbox row");
    }

    let mut dispatcher = dispatcher;
    dispatcher.start();
    // Three drain passes (batch_size=100 rows/pass) at a 2s tick.
    tokio::time::sleep(Duration::from_millis(7500)).await;
    dispatcher.stop().await;

    assert_eq!(publisher.published.lock().unwrap().len(), 250);
    let (pending, _) = store.pending_stats().await.unwrap();
    assert_eq!(pending, 0);
}

mod common;

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use transactional_messaging::consumer::batch_processor;
use transactional_messaging::model::Message;
use transactional_messaging::store::PgInboxStore;
use transactional_messaging::InboxProcessor;

use common::{start_db, FakeHandler, FakeOffsetTracker};

fn msg(n: i64) -> Message {
    Message {
        topic: "orders.created".to_string(),
        key: None,
        payload: json!({ "n": n }),
        partition: Some(0),
        offset: Some(n),
    }
}

#[tokio::test]
async fn test_offset_stored_only_for_accepted_messages() {
    let db = start_db().await;
    let store = Arc::new(PgInboxStore::new(db.pool.clone()));
    let handler = Arc::new(FakeHandler::failing(|payload| payload["n"] == json!(2)));
    let processor = Arc::new(InboxProcessor::new(store, handler));
    let offsets = Arc::new(FakeOffsetTracker::default());

    let (tx, rx) = mpsc::channel(8);
    let offsets_for_run: Arc<dyn transactional_messaging::consumer::OffsetTracker> = offsets.clone();
    let handle = tokio::spawn(batch_processor::run(rx, processor, offsets_for_run, None));

    tx.send(vec![msg(1), msg(2), msg(3)]).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    let stored = offsets.stored.lock().unwrap();
    let stored_offsets: Vec<i64> = stored.iter().map(|(_, _, offset)| *offset).collect();
    assert_eq!(stored_offsets, vec![1, 3]);
}

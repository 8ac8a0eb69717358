mod common;

use std::sync::Arc;

use serde_json::json;
use sqlx::Row;
use transactional_messaging::model::Message;
use transactional_messaging::store::PgInboxStore;
use transactional_messaging::InboxProcessor;

use common::{start_db, FakeHandler};

async fn inbox_row_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query("SELECT COUNT(*)::BIGINT AS n FROM inbox_entries")
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}

async fn accepted_row_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query("SELECT COUNT(*)::BIGINT AS n FROM inbox_entries WHERE is_accepted = true")
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}

#[tokio::test]
async fn test_handler_success_commits_inbox_row_as_accepted() {
    let db = start_db().await;
    let store = Arc::new(PgInboxStore::new(db.pool.clone()));
    let handler = Arc::new(FakeHandler::always_succeeds());
    let processor = InboxProcessor::new(store, handler.clone());

    let message = Message {
        topic: "orders.created".to_string(),
        key: Some("order-1".to_string()),
        payload: json!({ "n": 1 }),
        partition: Some(0),
        offset: Some(42),
    };

    processor.process_message(&message).await.expect("process succeeds");

    assert_eq!(inbox_row_count(&db.pool).await, 1);
    assert_eq!(accepted_row_count(&db.pool).await, 1);
    assert_eq!(handler.accepted.lock().unwrap().as_slice(), &[json!({ "n": 1 })]);
}

#[tokio::test]
async fn test_handler_failure_rolls_back_inbox_row() {
    let db = start_db().await;
    let store = Arc::new(PgInboxStore::new(db.pool.clone()));
    let handler = Arc::new(FakeHandler::failing(|_| true));
    let processor = InboxProcessor::new(store, handler);

    let message = Message {
        topic: "orders.created".to_string(),
        key: Some("order-2".to_string()),
        payload: json!({ "n": 2 }),
        partition: Some(0),
        offset: Some(43),
    };

    let result = processor.process_message(&message).await;
    assert!(result.is_err());

    // The insert from the failed transaction must not be visible: the
    // whole transaction rolled back, not just the final mark-accepted step.
    assert_eq!(inbox_row_count(&db.pool).await, 0);
}

#[tokio::test]
async fn test_independent_messages_in_a_batch_do_not_block_each_other() {
    let db = start_db().await;
    let store = Arc::new(PgInboxStore::new(db.pool.clone()));
    let handler = Arc::new(FakeHandler::failing(|payload| payload["n"] == json!(2)));
    let processor = InboxProcessor::new(store, handler.clone());

    for n in [1, 2, 3] {
        let message = Message {
            topic: "orders.created".to_string(),
            key: None,
            payload: json!({ "n": n }),
            partition: Some(0),
            offset: Some(n),
        };
        let result = processor.process_message(&message).await;
        if n == 2 {
            assert!(result.is_err());
        } else {
            assert!(result.is_ok());
        }
    }

    assert_eq!(accepted_row_count(&db.pool).await, 2);
    assert_eq!(
        handler.accepted.lock().unwrap().as_slice(),
        &[json!({ "n": 1 }), json!({ "n": 3 })]
    );
}

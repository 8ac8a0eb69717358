//! Row and wire types shared across the store, broker, and processing layers.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A staged outbox row, written in the same transaction as the business
/// change it accompanies (or via the standalone convenience insert).
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub topic: String,
    pub key: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub is_sent: bool,
    pub retry_count: i32,
}

/// An inbox row, written and terminated inside a single handler transaction.
#[derive(Debug, Clone)]
pub struct InboxEntry {
    pub id: Uuid,
    pub topic: String,
    pub key: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub is_accepted: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A broker record independent of its storage form: the unit published by
/// the dispatcher and the unit delivered to the consumer buffer.
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Value,
    /// Partition this message was delivered from. `None` for messages being
    /// published (the broker assigns the partition on send).
    pub partition: Option<i32>,
    /// Offset this message occupies in its partition. `None` for outgoing
    /// messages.
    pub offset: Option<i64>,
}

impl Message {
    pub fn outgoing(topic: impl Into<String>, key: Option<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            key,
            payload,
            partition: None,
            offset: None,
        }
    }
}

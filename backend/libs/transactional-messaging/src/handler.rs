//! Application handler seam for the inbox processor.

use async_trait::async_trait;

use crate::model::Message;

/// Implemented by application code to react to an inbox message.
///
/// Implementations MUST be idempotent: broker redelivery (after a crash
/// between inbox commit and offset store, for example) can cause the same
/// message to reach `dispatch` more than once.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn dispatch(&self, message: &Message) -> anyhow::Result<()>;
}

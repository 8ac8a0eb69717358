//! Broker seam: batch publishing and partition claiming.

mod kafka;

pub use kafka::KafkaBroker;

use async_trait::async_trait;

use crate::error::BrokerError;
use crate::model::Message;

/// Publishes a chunk of outgoing messages to the broker.
///
/// Implementations should report success only once every message in the
/// chunk has been acknowledged by the broker — the outbox dispatcher marks
/// the whole chunk's source rows processed on `Ok`, and rolls back (keeping
/// them pending) on `Err`.
#[async_trait]
pub trait BatchPublisher: Send + Sync {
    async fn publish_batch(&self, messages: &[Message]) -> Result<(), BrokerError>;
}

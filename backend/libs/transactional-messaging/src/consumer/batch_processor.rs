//! Drains flushed buffers into the inbox processor and stores broker offsets.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::inbox::InboxProcessor;
use crate::metrics::MessagingMetrics;
use crate::model::Message;
use crate::store::InboxStore;

/// Anything that can durably remember "this message has been handled" so
/// the broker won't redeliver it. Implemented by the Kafka broker adapter
/// via `store_offset`; kept as a trait so the batch processor's tests don't
/// need a live broker.
pub trait OffsetTracker: Send + Sync {
    fn store_offset(&self, message: &Message) -> Result<(), crate::error::BrokerError>;
}

/// Consumes flushed batches off `rx`, running each message through the
/// inbox processor in order. A message's broker offset is stored only on
/// handler success; a failed message is logged and left for redelivery.
pub async fn run<S, H>(
    mut rx: mpsc::Receiver<Vec<Message>>,
    processor: Arc<InboxProcessor<S, H>>,
    offsets: Arc<dyn OffsetTracker>,
    metrics: Option<Arc<MessagingMetrics>>,
) where
    S: InboxStore + 'static,
    H: crate::handler::MessageHandler + 'static,
{
    while let Some(batch) = rx.recv().await {
        for message in &batch {
            match processor.process_message(message).await {
                Ok(()) => {
                    if let Err(e) = offsets.store_offset(message) {
                        error!(topic = %message.topic, error = %e, "Failed to store offset after accepted message");
                    } else if let Some(m) = &metrics {
                        m.inbox_accepted_total.inc();
                    }
                }
                Err(e) => {
                    warn!(
                        topic = %message.topic,
                        partition = ?message.partition,
                        offset = ?message.offset,
                        error = %e,
                        "Inbox processing failed, message will be redelivered"
                    );
                }
            }
        }
    }
}

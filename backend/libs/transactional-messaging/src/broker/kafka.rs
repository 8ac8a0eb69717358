use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Message as _};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::MessagingConfig;
use crate::consumer::{ConsumerBuffer, OffsetTracker};
use crate::error::BrokerError;
use crate::model::Message;

use super::BatchPublisher;

/// Kafka adapter covering both halves of the broker seam: batch publishing
/// for the outbox dispatcher, and partition claiming for the consumer
/// pipeline.
///
/// Client configuration mirrors the source library's Sarama setup as
/// closely as `rdkafka` allows: producer delivery confirmation is
/// synchronous per send (`FutureProducer::send` awaits the broker ack),
/// the consumer auto-commits on a 1s interval as a backstop while this
/// crate drives offset *storage* manually, the initial offset is the
/// latest available, and the socket/dial timeout is 10s.
pub struct KafkaBroker {
    producer: FutureProducer,
    consumer: Arc<StreamConsumer>,
}

impl KafkaBroker {
    pub fn new(brokers: &str, config: &MessagingConfig) -> Result<Self, BrokerError> {
        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", brokers)
            .set("socket.timeout.ms", "10000")
            .set("message.timeout.ms", "30000")
            .set("acks", "all");
        apply_sasl(&mut producer_config, config);
        let producer: FutureProducer = producer_config.create()?;

        let mut consumer_config = ClientConfig::new();
        consumer_config
            .set("bootstrap.servers", brokers)
            .set("group.id", &config.group_id)
            .set("socket.timeout.ms", "10000")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "1000")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "latest");
        apply_sasl(&mut consumer_config, config);
        let consumer: StreamConsumer = consumer_config.create()?;
        consumer.subscribe(&config.topics.iter().map(String::as_str).collect::<Vec<_>>())?;

        Ok(Self {
            producer,
            consumer: Arc::new(consumer),
        })
    }

    /// Drive the partition-claim loop: read messages off the subscribed
    /// topics, route each into the `ConsumerBuffer` for its
    /// `(topic, partition)`, and forward flushed batches on `tx`. Exits
    /// when `shutdown_rx` is signalled.
    ///
    /// A single `StreamConsumer::stream()` loop is used rather than
    /// rdkafka's per-partition `split_partition_queue` API — the buffers
    /// are keyed by partition internally, which gets the same per-partition
    /// ordering without the extra queue-management complexity.
    pub async fn run_claim_loop(
        &self,
        tx: mpsc::Sender<Vec<Message>>,
        mut shutdown_rx: watch::Receiver<bool>,
        buffer_capacity: usize,
        flush_threshold: usize,
        ticker_interval: Duration,
    ) {
        let buffers: Mutex<HashMap<(String, i32), Arc<ConsumerBuffer>>> = Mutex::new(HashMap::new());
        let mut stream = self.consumer.stream();
        let mut ticker = tokio::time::interval(ticker_interval);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    info!("Claim loop shutting down");
                    return;
                }

                _ = ticker.tick() => {
                    let snapshot: Vec<Arc<ConsumerBuffer>> =
                        buffers.lock().await.values().cloned().collect();
                    for buffer in snapshot {
                        if let Some(batch) = buffer.flush().await {
                            if tx.send(batch).await.is_err() {
                                warn!("Batch channel closed while flushing on ticker");
                                return;
                            }
                        }
                    }
                }

                maybe_msg = stream.next() => {
                    let Some(result) = maybe_msg else {
                        info!("Broker stream ended");
                        return;
                    };
                    match result {
                        Ok(borrowed) => {
                            let message = to_owned_message(&borrowed);
                            let key = (message.topic.clone(), message.partition.unwrap_or(0));
                            let buffer = {
                                let mut guard = buffers.lock().await;
                                guard
                                    .entry(key)
                                    .or_insert_with(|| Arc::new(ConsumerBuffer::new(buffer_capacity, flush_threshold)))
                                    .clone()
                            };
                            if let Some(batch) = buffer.push(message).await {
                                if tx.send(batch).await.is_err() {
                                    warn!("Batch channel closed while flushing on threshold");
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Error polling broker stream");
                        }
                    }
                }
            }
        }
    }
}

fn to_owned_message(borrowed: &rdkafka::message::BorrowedMessage<'_>) -> Message {
    let payload = borrowed
        .payload()
        .and_then(|bytes| serde_json::from_slice(bytes).ok())
        .unwrap_or(serde_json::Value::Null);
    let key = borrowed
        .key()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

    Message {
        topic: borrowed.topic().to_string(),
        key,
        payload,
        partition: Some(borrowed.partition()),
        offset: Some(borrowed.offset()),
    }
}

fn apply_sasl(client_config: &mut ClientConfig, config: &MessagingConfig) {
    if config.sasl {
        client_config
            .set("security.protocol", "sasl_ssl")
            .set("sasl.mechanism", "SCRAM-SHA-512")
            .set("sasl.username", &config.username)
            .set("sasl.password", &config.password);
    }
}

#[async_trait]
impl BatchPublisher for KafkaBroker {
    async fn publish_batch(&self, messages: &[Message]) -> Result<(), BrokerError> {
        for message in messages {
            let payload = serde_json::to_vec(&message.payload)
                .map_err(|e| BrokerError::PublishFailed(e.to_string()))?;
            let mut record = FutureRecord::to(&message.topic).payload(&payload);
            if let Some(key) = &message.key {
                record = record.key(key);
            }

            self.producer
                .send(record, Duration::from_secs(30))
                .await
                .map_err(|(err, _)| BrokerError::PublishFailed(err.to_string()))?;
        }

        debug!(count = messages.len(), "Published message batch");
        Ok(())
    }
}

impl OffsetTracker for KafkaBroker {
    fn store_offset(&self, message: &Message) -> Result<(), BrokerError> {
        let (Some(partition), Some(offset)) = (message.partition, message.offset) else {
            return Ok(());
        };
        self.consumer
            .store_offset(&message.topic, partition, offset)
            .map_err(|e| BrokerError::OffsetStoreFailed(e.to_string()))
    }
}

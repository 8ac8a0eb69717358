//! Outbox dispatcher: drains staged rows into the broker.

use std::sync::Arc;
use std::time::Duration;

use resilience::{with_retry, RetryConfig, RetryError};
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::BatchPublisher;
use crate::error::{BrokerError, MessagingError, StoreError};
use crate::metrics::MessagingMetrics;
use crate::model::Message;
use crate::store::OutboxStore;

const DRAIN_TICK: Duration = Duration::from_secs(2);

/// Chunked-publish retry: 3 attempts total, sleeping 2s then 4s between
/// them, matching the source library's `retry(3, 2*time.Second, fn)`.
fn publish_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_secs(2),
        max_backoff: Duration::from_secs(8),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Drains a `Store`'s outbox table into a `Publisher`, via a pool of
/// worker tasks that each tick every 2 seconds and claim up to
/// `batch_size` rows under `SELECT ... FOR UPDATE SKIP LOCKED`.
pub struct OutboxDispatcher<P: BatchPublisher> {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<P>,
    worker_count: u32,
    batch_size: i64,
    metrics: Option<Arc<MessagingMetrics>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl<P: BatchPublisher + 'static> OutboxDispatcher<P> {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        publisher: Arc<P>,
        worker_count: u32,
        batch_size: u32,
        metrics: Option<Arc<MessagingMetrics>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            publisher,
            worker_count: worker_count.max(1),
            batch_size: batch_size.max(1) as i64,
            metrics,
            shutdown_tx,
            shutdown_rx,
            workers: Vec::new(),
        }
    }

    /// Insert a row via the standalone pool write. Does not compose with
    /// any caller transaction.
    pub async fn save(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: Value,
    ) -> Result<Uuid, MessagingError> {
        Ok(self.store.insert(topic, key, payload).await?)
    }

    /// Insert a row composed with the caller's own open transaction, so
    /// both commit or roll back together with the business write.
    pub async fn save_in_transaction(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        topic: &str,
        key: Option<&str>,
        payload: Value,
    ) -> Result<Uuid, MessagingError> {
        Ok(self.store.insert_in_transaction(tx, topic, key, payload).await?)
    }

    /// Spawn `worker_count` draining workers.
    pub fn start(&mut self) {
        info!(
            worker_count = self.worker_count,
            batch_size = self.batch_size,
            "Outbox dispatcher starting"
        );
        for id in 0..self.worker_count {
            let store = self.store.clone();
            let publisher = self.publisher.clone();
            let batch_size = self.batch_size;
            let metrics = self.metrics.clone();
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(DRAIN_TICK);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {
                            debug!(worker = id, "Outbox worker stopping");
                            return;
                        }
                        _ = ticker.tick() => {
                            match drain_pass(&store, &publisher, batch_size).await {
                                Ok(count) if count > 0 => {
                                    info!(worker = id, published = count, "Drain pass published rows");
                                    if let Some(m) = &metrics {
                                        m.outbox_published_total.inc_by(count as u64);
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    warn!(worker = id, error = %e, "Drain pass failed");
                                    if let Some(m) = &metrics {
                                        m.outbox_publish_failures_total.inc();
                                    }
                                }
                            }
                            if let Some(m) = &metrics {
                                if let Ok((pending, age)) = store.pending_stats().await {
                                    m.outbox_pending.set(pending);
                                    m.outbox_oldest_pending_age_seconds.set(age);
                                }
                            }
                        }
                    }
                }
            });
            self.workers.push(handle);
        }
    }

    /// Signal shutdown and wait for every worker to finish its current
    /// tick boundary. Workers never abort mid-transaction.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
        info!("Outbox dispatcher stopped");
    }
}

/// One draining pass: claim a batch, publish it in `batch_size` chunks with
/// retry, mark the batch processed, commit. On any failure the transaction
/// is rolled back (dropped) and the rows remain pending for the next tick.
async fn drain_pass<P: BatchPublisher>(
    store: &Arc<dyn OutboxStore>,
    publisher: &Arc<P>,
    batch_size: i64,
) -> Result<usize, MessagingError> {
    let mut tx = store.begin().await?;
    let rows = store.claim_batch(&mut tx, batch_size).await?;
    if rows.is_empty() {
        tx.commit().await.map_err(StoreError::from)?;
        return Ok(0);
    }

    let messages: Vec<Message> = rows
        .iter()
        .map(|row| Message::outgoing(row.topic.clone(), row.key.clone(), row.payload.clone()))
        .collect();
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    if let Err(e) = publish_in_chunks(publisher, &messages, batch_size as usize).await {
        // Transaction drops here, rolling back (rows stay pending). The
        // retry counter is bumped outside the rolled-back transaction so
        // it survives.
        store.increment_retry_count(&ids).await?;
        return Err(BrokerError::PublishFailed(e.to_string()).into());
    }

    store.mark_processed(&mut tx, &ids).await?;
    tx.commit().await.map_err(StoreError::from)?;
    Ok(rows.len())
}

async fn publish_in_chunks<P: BatchPublisher>(
    publisher: &Arc<P>,
    messages: &[Message],
    chunk_size: usize,
) -> Result<(), RetryError<BrokerError>> {
    for chunk in messages.chunks(chunk_size.max(1)) {
        with_retry(publish_retry_config(), || async {
            publisher.publish_batch(chunk).await
        })
        .await?;
    }
    Ok(())
}

//! Top-level façade wiring the producer (outbox dispatcher) and consumer
//! (buffer pipeline + inbox processor) together under one lifecycle.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::broker::KafkaBroker;
use crate::config::MessagingConfig;
use crate::consumer::{batch_processor, buffer};
use crate::error::MessagingError;
use crate::handler::MessageHandler;
use crate::inbox::InboxProcessor;
use crate::metrics::MessagingMetrics;
use crate::outbox::OutboxDispatcher;
use crate::store::{PgInboxStore, PgOutboxStore};

const CONSUMER_BATCH_CHANNEL_CAPACITY: usize = 100;
const CONSUMER_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Owns every long-lived collaborator for one messaging pipeline: the
/// outbox dispatcher, the Kafka adapter, and (once `.handler()` is called)
/// the inbox processor and consumer pipeline.
pub struct Messaging {
    config: MessagingConfig,
    broker: Arc<KafkaBroker>,
    dispatcher: OutboxDispatcher<KafkaBroker>,
    inbox_store: Arc<PgInboxStore>,
    metrics: Option<Arc<MessagingMetrics>>,
    consumer_shutdown_tx: watch::Sender<bool>,
    consumer_shutdown_rx: watch::Receiver<bool>,
}

impl Messaging {
    /// Open a pool, run migrations, connect the broker, and build the
    /// outbox dispatcher. The consumer side is wired in once a handler is
    /// registered via [`Messaging::handler`].
    pub async fn open(brokers: &str, config: MessagingConfig) -> Result<Self, MessagingError> {
        let pool = PgPool::connect(&config.database_url())
            .await
            .map_err(crate::error::StoreError::from)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| MessagingError::Other(e.into()))?;

        let broker = Arc::new(KafkaBroker::new(brokers, &config)?);
        let outbox_store: Arc<dyn crate::store::OutboxStore> = Arc::new(PgOutboxStore::new(pool.clone()));
        let inbox_store = Arc::new(PgInboxStore::new(pool));
        let metrics = Some(Arc::new(MessagingMetrics::new(&config.group_id)));

        let dispatcher = OutboxDispatcher::new(
            outbox_store,
            broker.clone(),
            config.worker_count,
            config.batch_size,
            metrics.clone(),
        );

        let (consumer_shutdown_tx, consumer_shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            broker,
            dispatcher,
            inbox_store,
            metrics,
            consumer_shutdown_tx,
            consumer_shutdown_rx,
        })
    }

    /// Stage a message for later publish (standalone pool insert).
    pub async fn save(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<uuid::Uuid, MessagingError> {
        self.dispatcher.save(topic, key, payload).await
    }

    /// Stage a message composed with the caller's own transaction.
    pub async fn save_in_transaction(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        topic: &str,
        key: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<uuid::Uuid, MessagingError> {
        self.dispatcher.save_in_transaction(tx, topic, key, payload).await
    }

    pub fn start_producer(&mut self) {
        self.dispatcher.start();
    }

    pub async fn stop_producer(&mut self) {
        self.dispatcher.stop().await;
    }

    /// Run the consumer side until cancelled by `SIGINT`/`SIGTERM` or a
    /// programmatic `stop_consumer`. Blocks the calling task.
    pub async fn start_consumer<H>(&self, handler: Arc<H>) -> Result<(), MessagingError>
    where
        H: MessageHandler + 'static,
    {
        let processor = Arc::new(InboxProcessor::new(self.inbox_store.clone(), handler));
        let (tx, rx) = mpsc::channel(CONSUMER_BATCH_CHANNEL_CAPACITY);

        let broker = self.broker.clone();
        let shutdown_rx_claim = self.consumer_shutdown_rx.clone();
        let claim_handle = tokio::spawn(async move {
            broker
                .run_claim_loop(
                    tx,
                    shutdown_rx_claim,
                    buffer::DEFAULT_CAPACITY,
                    buffer::DEFAULT_FLUSH_THRESHOLD,
                    Duration::from_secs(buffer::DEFAULT_TICKER_INTERVAL_SECS),
                )
                .await;
        });

        let offsets: Arc<dyn crate::consumer::OffsetTracker> = self.broker.clone();
        let metrics = self.metrics.clone();
        let process_handle = tokio::spawn(batch_processor::run(rx, processor, offsets, metrics));

        info!(group_id = %self.config.group_id, "Consumer started, waiting for shutdown signal");
        wait_for_shutdown_signal(self.consumer_shutdown_rx.clone()).await;

        let _ = self.consumer_shutdown_tx.send(true);

        // Give in-flight inbox transactions a grace period to finish before
        // forcing shutdown, mirroring the source library's 1s timeout.
        let _ = tokio::time::timeout(CONSUMER_SHUTDOWN_GRACE, claim_handle).await;
        process_handle.abort();

        Ok(())
    }

    /// Programmatic equivalent of an external termination signal.
    pub fn stop_consumer(&self) {
        let _ = self.consumer_shutdown_tx.send(true);
    }
}

async fn wait_for_shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
            _ = shutdown_rx.changed() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = shutdown_rx.changed() => {}
        }
    }
}

use prometheus::{IntCounter, IntGauge, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct MessagingMetrics {
    pub outbox_pending: IntGauge,
    pub outbox_oldest_pending_age_seconds: IntGauge,
    pub outbox_published_total: IntCounter,
    pub outbox_publish_failures_total: IntCounter,
    pub inbox_accepted_total: IntCounter,
    pub consumer_buffer_depth: IntGauge,
}

impl MessagingMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let outbox_pending = IntGauge::with_opts(
            Opts::new(
                "messaging_outbox_pending_count",
                "Number of unpublished outbox rows currently pending",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for messaging_outbox_pending_count");

        let outbox_oldest_pending_age_seconds = IntGauge::with_opts(
            Opts::new(
                "messaging_outbox_oldest_pending_age_seconds",
                "Age in seconds of the oldest pending outbox row",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for messaging_outbox_oldest_pending_age_seconds");

        let outbox_published_total = IntCounter::with_opts(
            Opts::new(
                "messaging_outbox_published_total",
                "Total number of outbox rows marked as processed",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for messaging_outbox_published_total");

        let outbox_publish_failures_total = IntCounter::with_opts(
            Opts::new(
                "messaging_outbox_publish_failures_total",
                "Total number of drain passes whose publish exhausted retries",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for messaging_outbox_publish_failures_total");

        let inbox_accepted_total = IntCounter::with_opts(
            Opts::new(
                "messaging_inbox_accepted_total",
                "Total number of inbox rows accepted by the handler",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for messaging_inbox_accepted_total");

        let consumer_buffer_depth = IntGauge::with_opts(
            Opts::new(
                "messaging_consumer_buffer_depth",
                "Current number of buffered messages awaiting flush",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for messaging_consumer_buffer_depth");

        for metric in [
            Box::new(outbox_pending.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(outbox_oldest_pending_age_seconds.clone()),
            Box::new(outbox_published_total.clone()),
            Box::new(outbox_publish_failures_total.clone()),
            Box::new(inbox_accepted_total.clone()),
            Box::new(consumer_buffer_depth.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register messaging metric: {}", e);
            }
        }

        Self {
            outbox_pending,
            outbox_oldest_pending_age_seconds,
            outbox_published_total,
            outbox_publish_failures_total,
            inbox_accepted_total,
            consumer_buffer_depth,
        }
    }
}

//! # Transactional Messaging
//!
//! Bridges a relational database and a partitioned broker using the outbox
//! and inbox patterns, so that staging a message and the business write it
//! accompanies commit or roll back together, and so that handling a broker
//! message and recording its acceptance do too.
//!
//! ## Producer side (outbox)
//!
//! 1. Business code calls [`supervisor::Messaging::save_in_transaction`]
//!    (or the standalone [`supervisor::Messaging::save`]) to stage a row.
//! 2. A pool of [`outbox::OutboxDispatcher`] workers periodically claims
//!    unprocessed rows under `SELECT ... FOR UPDATE SKIP LOCKED`, publishes
//!    them to the broker with retry, and marks them processed — all inside
//!    one transaction per drain pass.
//!
//! ## Consumer side (inbox)
//!
//! 1. [`broker::KafkaBroker`] claims partitions and routes messages into
//!    per-partition [`consumer::ConsumerBuffer`]s.
//! 2. Flushed batches are handed to [`consumer::batch_processor`], which
//!    runs each message through [`inbox::InboxProcessor`]: insert a pending
//!    row, invoke the application [`handler::MessageHandler`], mark the row
//!    accepted — one transaction per message.
//! 3. Only after that transaction commits is the message's broker offset
//!    stored, so a crash before acceptance results in redelivery rather
//!    than silent loss. Handlers must be idempotent.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use transactional_messaging::config::MessagingConfig;
//! use transactional_messaging::supervisor::Messaging;
//! use std::sync::Arc;
//!
//! struct EchoHandler;
//!
//! #[async_trait::async_trait]
//! impl transactional_messaging::handler::MessageHandler for EchoHandler {
//!     async fn dispatch(&self, message: &transactional_messaging::model::Message) -> anyhow::Result<()> {
//!         println!("received {:?}", message.payload);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MessagingConfig::from_env()?;
//! let mut messaging = Messaging::open("localhost:9092", config).await?;
//!
//! messaging.start_producer();
//! messaging.save("orders.created", Some("order-123"), serde_json::json!({ "total": 42 })).await?;
//!
//! messaging.start_consumer(Arc::new(EchoHandler)).await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod handler;
pub mod inbox;
pub mod metrics;
pub mod model;
pub mod outbox;
pub mod store;
pub mod supervisor;

pub use broker::{BatchPublisher, KafkaBroker};
pub use config::MessagingConfig;
pub use error::{BrokerError, ConfigError, HandlerError, MessagingError, StoreError};
pub use handler::MessageHandler;
pub use inbox::InboxProcessor;
pub use model::{InboxEntry, Message, OutboxEntry};
pub use outbox::OutboxDispatcher;
pub use store::{InboxStore, OutboxStore, PgInboxStore, PgOutboxStore};
pub use supervisor::Messaging;

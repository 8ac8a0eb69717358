//! Error types for the transactional messaging library.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Errors raised while loading and validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Errors raised by the outbox/inbox stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("outbox row not found: {0}")]
    RowNotFound(Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the broker adapter.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("poll failed: {0}")]
    PollFailed(String),

    #[error("offset store failed: {0}")]
    OffsetStoreFailed(String),

    #[error("broker client error: {0}")]
    Client(#[from] rdkafka::error::KafkaError),
}

/// Errors raised by application message handlers.
///
/// Handlers return `anyhow::Error` (see [`crate::handler::MessageHandler`]); the
/// inbox processor only needs to know the attempt failed, not why, to decide
/// whether to roll back.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// Top-level error type uniting every subsystem.
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("messaging error: {0}")]
    Other(#[from] anyhow::Error),
}

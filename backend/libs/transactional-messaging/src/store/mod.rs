//! Storage seam: outbox and inbox persistence, plus the postgres implementation.

mod postgres;

pub use postgres::{PgInboxStore, PgOutboxStore};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{InboxEntry, OutboxEntry};

type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for outbox rows.
///
/// `insert`/`insert_in_transaction` are kept separate because the caller may
/// either want a fire-and-forget staging write (`insert`) or to compose the
/// outbox write with its own business transaction
/// (`insert_in_transaction`) so both commit or roll back together.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Begin a transaction against the same pool this store writes through,
    /// for callers (the dispatcher, or business code composing its own
    /// write) that need to drive `claim_batch`/`mark_processed` or
    /// `insert_in_transaction` themselves.
    async fn begin(&self) -> StoreResult<Transaction<'_, Postgres>>;

    async fn insert(&self, topic: &str, key: Option<&str>, payload: Value) -> StoreResult<Uuid>;

    async fn insert_in_transaction(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        topic: &str,
        key: Option<&str>,
        payload: Value,
    ) -> StoreResult<Uuid>;

    /// Claim up to `limit` unprocessed rows (oldest first) for the duration
    /// of `tx`, using `SELECT ... FOR UPDATE SKIP LOCKED` so concurrent
    /// workers never claim the same row.
    async fn claim_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> StoreResult<Vec<OutboxEntry>>;

    /// Mark the given rows processed within `tx`. Caller commits afterward.
    async fn mark_processed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> StoreResult<()>;

    /// Increment `retry_count` for the given rows, outside any transaction
    /// that might be rolled back, so the counter survives a failed drain
    /// pass.
    async fn increment_retry_count(&self, ids: &[Uuid]) -> StoreResult<()>;

    /// `(pending_count, oldest_pending_age_seconds)`.
    async fn pending_stats(&self) -> StoreResult<(i64, i64)>;

    /// Reset `processed_at`/`retry_count` for rows created at or after `ts`.
    async fn replay_since(&self, ts: chrono::DateTime<chrono::Utc>) -> StoreResult<u64>;

    /// Reset `processed_at`/`retry_count` for rows whose id falls in
    /// `[from_id, to_id]`.
    async fn replay_range(&self, from_id: Uuid, to_id: Uuid) -> StoreResult<u64>;
}

/// Persistence seam for inbox rows. A single method because the insert,
/// handler dispatch, and mark-accepted all happen inside one transaction
/// owned by [`crate::inbox::InboxProcessor`] — the store only needs to
/// expose the two halves of that transaction.
#[async_trait]
pub trait InboxStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Transaction<'_, Postgres>>;

    async fn insert_pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        topic: &str,
        key: Option<&str>,
        payload: Value,
    ) -> StoreResult<InboxEntry>;

    async fn mark_accepted(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> StoreResult<()>;
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{InboxStore, OutboxStore};
use crate::error::StoreError;
use crate::model::{InboxEntry, OutboxEntry};

type StoreResult<T> = Result<T, StoreError>;

/// Postgres-backed outbox store.
///
/// Mirrors the shape of the source library's repository: raw `sqlx::query`
/// with positional binds and `try_get`, no query builder.
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_outbox_entry(row: &sqlx::postgres::PgRow) -> Result<OutboxEntry, sqlx::Error> {
    Ok(OutboxEntry {
        id: row.try_get("id")?,
        topic: row.try_get("topic")?,
        key: row.try_get("key")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
        is_sent: row.try_get("is_sent")?,
        retry_count: row.try_get("retry_count")?,
    })
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn begin(&self) -> StoreResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    async fn insert(&self, topic: &str, key: Option<&str>, payload: Value) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO outbox_entries (id, topic, key, payload, created_at, processed_at, is_sent, retry_count)
            VALUES ($1, $2, $3, $4, NOW(), NULL, false, 0)
            "#,
        )
        .bind(id)
        .bind(topic)
        .bind(key)
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        debug!(event_id = %id, topic = %topic, "Outbox row inserted");
        Ok(id)
    }

    async fn insert_in_transaction(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        topic: &str,
        key: Option<&str>,
        payload: Value,
    ) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO outbox_entries (id, topic, key, payload, created_at, processed_at, is_sent, retry_count)
            VALUES ($1, $2, $3, $4, NOW(), NULL, false, 0)
            "#,
        )
        .bind(id)
        .bind(topic)
        .bind(key)
        .bind(&payload)
        .execute(&mut **tx)
        .await?;

        debug!(event_id = %id, topic = %topic, "Outbox row inserted within caller transaction");
        Ok(id)
    }

    async fn claim_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> StoreResult<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, topic, key, payload, created_at, processed_at, is_sent, retry_count
            FROM outbox_entries
            WHERE processed_at IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&mut **tx)
        .await?;

        let entries = rows
            .iter()
            .map(row_to_outbox_entry)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!(count = entries.len(), "Claimed outbox rows for drain pass");
        Ok(entries)
    }

    async fn mark_processed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE outbox_entries
            SET processed_at = NOW(), is_sent = true
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn increment_retry_count(&self, ids: &[Uuid]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE outbox_entries
            SET retry_count = retry_count + 1
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        warn!(count = ids.len(), "Incremented retry_count after exhausted publish retries");
        Ok(())
    }

    async fn pending_stats(&self) -> StoreResult<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                COALESCE(EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT, 0) AS age_seconds
            FROM outbox_entries
            WHERE processed_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let pending: i64 = row.try_get("pending").unwrap_or(0);
        let age: i64 = row.try_get("age_seconds").unwrap_or(0);
        Ok((pending, age))
    }

    async fn replay_since(&self, ts: DateTime<Utc>) -> StoreResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_entries
            SET processed_at = NULL, is_sent = false, retry_count = 0
            WHERE created_at >= $1
            "#,
        )
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn replay_range(&self, from_id: Uuid, to_id: Uuid) -> StoreResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_entries
            SET processed_at = NULL, is_sent = false, retry_count = 0
            WHERE id BETWEEN $1 AND $2
            "#,
        )
        .bind(from_id)
        .bind(to_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}

/// Postgres-backed inbox store.
pub struct PgInboxStore {
    pool: PgPool,
}

impl PgInboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InboxStore for PgInboxStore {
    async fn begin(&self) -> StoreResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    async fn insert_pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        topic: &str,
        key: Option<&str>,
        payload: Value,
    ) -> StoreResult<InboxEntry> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
            INSERT INTO inbox_entries (id, topic, key, payload, created_at, is_accepted, processed_at)
            VALUES ($1, $2, $3, $4, NOW(), false, NULL)
            RETURNING id, topic, key, payload, created_at, is_accepted, processed_at
            "#,
        )
        .bind(id)
        .bind(topic)
        .bind(key)
        .bind(&payload)
        .fetch_one(&mut **tx)
        .await?;

        Ok(InboxEntry {
            id: row.try_get("id")?,
            topic: row.try_get("topic")?,
            key: row.try_get("key")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            is_accepted: row.try_get("is_accepted")?,
            processed_at: row.try_get("processed_at")?,
        })
    }

    async fn mark_accepted(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inbox_entries
            SET is_accepted = true, processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(id));
        }
        Ok(())
    }
}

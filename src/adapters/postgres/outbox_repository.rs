//! PostgreSQL implementation of the OutboxWriter port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{StoreError, Timestamp};
use crate::domain::payment::PaymentEvent;
use crate::ports::{OutboxWriter, PublishTask, PublishTaskStatus};

/// PostgreSQL-backed publish outbox.
pub struct PostgresOutbox {
    pool: PgPool,
}

impl PostgresOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a publish task.
#[derive(Debug, sqlx::FromRow)]
struct PublishOutboxRow {
    id: Uuid,
    event: serde_json::Value,
    partition_key: String,
    status: String,
    created_at: DateTime<Utc>,
    next_attempt_at: DateTime<Utc>,
    attempts: i32,
    last_error: Option<String>,
}

impl TryFrom<PublishOutboxRow> for PublishTask {
    type Error = StoreError;

    fn try_from(row: PublishOutboxRow) -> Result<Self, Self::Error> {
        let event: PaymentEvent =
            serde_json::from_value(row.event).map_err(StoreError::corrupt)?;

        Ok(PublishTask {
            id: row.id,
            event,
            partition_key: row.partition_key,
            status: PublishTaskStatus::parse(&row.status)?,
            created_at: Timestamp::from_datetime(row.created_at),
            next_attempt_at: Timestamp::from_datetime(row.next_attempt_at),
            attempts: row.attempts.max(0) as u32,
            last_error: row.last_error,
        })
    }
}

#[async_trait]
impl OutboxWriter for PostgresOutbox {
    async fn enqueue(&self, task: PublishTask) -> Result<(), StoreError> {
        let event = serde_json::to_value(&task.event).map_err(StoreError::corrupt)?;

        sqlx::query(
            r#"
            INSERT INTO publish_outbox
                (id, event, partition_key, status, created_at, next_attempt_at, attempts, last_error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(task.id)
        .bind(event)
        .bind(&task.partition_key)
        .bind(task.status.as_str())
        .bind(task.created_at.as_datetime())
        .bind(task.next_attempt_at.as_datetime())
        .bind(task.attempts as i32)
        .bind(&task.last_error)
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(())
    }

    async fn get_unpublished(&self, limit: u32) -> Result<Vec<PublishTask>, StoreError> {
        let rows: Vec<PublishOutboxRow> = sqlx::query_as(
            r#"
            SELECT id, event, partition_key, status, created_at, next_attempt_at, attempts, last_error
            FROM publish_outbox
            WHERE status IN ('pending', 'failed')
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        rows.into_iter().map(PublishTask::try_from).collect()
    }

    async fn has_unpublished_for_key(&self, partition_key: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1::bigint
            FROM publish_outbox
            WHERE partition_key = $1 AND status IN ('pending', 'failed')
            LIMIT 1
            "#,
        )
        .bind(partition_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(row.is_some())
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE publish_outbox
            SET status = 'published', attempts = attempts + 1, last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE publish_outbox
            SET status = 'failed', attempts = attempts + 1, last_error = $2, next_attempt_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(())
    }

    async fn mark_dead_letter(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE publish_outbox
            SET status = 'dead_letter', attempts = attempts + 1, last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(())
    }

    async fn dead_letters(&self, limit: u32) -> Result<Vec<PublishTask>, StoreError> {
        let rows: Vec<PublishOutboxRow> = sqlx::query_as(
            r#"
            SELECT id, event, partition_key, status, created_at, next_attempt_at, attempts, last_error
            FROM publish_outbox
            WHERE status = 'dead_letter'
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        rows.into_iter().map(PublishTask::try_from).collect()
    }

    async fn cleanup_published(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM publish_outbox
            WHERE status = 'published' AND created_at < $1
            "#,
        )
        .bind(cutoff.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(deleted.rows_affected())
    }
}

//! PostgreSQL implementation of the IdempotencyStore port.
//!
//! Admission is a unique-constraint insert: the `webhook_events` primary key
//! on `event_id` makes `begin` safe against concurrent redeliveries without
//! any application-level lock. First insert wins; everyone else reads the
//! winner's record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{StoreError, Timestamp};
use crate::ports::{
    Admission, IdempotencyRecord, IdempotencyStore, ProcessingOutcome, ProcessingStatus,
};

/// PostgreSQL-backed idempotency store.
pub struct PostgresIdempotencyStore {
    pool: PgPool,
    max_failed_attempts: u32,
}

impl PostgresIdempotencyStore {
    /// Creates a store with the given pool and reprocessing cap.
    pub fn new(pool: PgPool, max_failed_attempts: u32) -> Self {
        Self {
            pool,
            max_failed_attempts,
        }
    }
}

/// Database row representation of an idempotency record.
#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_id: String,
    status: String,
    attempts: i32,
    last_attempt_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for IdempotencyRecord {
    type Error = StoreError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(IdempotencyRecord {
            event_id: row.event_id,
            status: ProcessingStatus::parse(&row.status)?,
            attempts: row.attempts.max(0) as u32,
            last_attempt_at: Timestamp::from_datetime(row.last_attempt_at),
        })
    }
}

impl PostgresIdempotencyStore {
    async fn fetch(&self, event_id: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, status, attempts, last_attempt_at
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        row.map(IdempotencyRecord::try_from).transpose()
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    async fn begin(&self, event_id: &str) -> Result<Admission, StoreError> {
        // First sighting wins the insert.
        let inserted = sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, status, attempts, last_attempt_at)
            VALUES ($1, 'pending', 1, now())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        if inserted.rows_affected() == 1 {
            return Ok(Admission::Admitted);
        }

        let record = self.fetch(event_id).await?.ok_or_else(|| {
            StoreError::corrupt(format!("record for '{}' vanished after conflict", event_id))
        })?;

        match record.status {
            ProcessingStatus::Pending => Ok(Admission::InProgress),
            ProcessingStatus::Completed => Ok(Admission::AlreadyCompleted),
            ProcessingStatus::Failed => {
                // Conditional update is the CAS for re-admission of a failed
                // record: only one concurrent caller flips it back to pending.
                let readmitted = sqlx::query(
                    r#"
                    UPDATE webhook_events
                    SET status = 'pending', attempts = attempts + 1, last_attempt_at = now()
                    WHERE event_id = $1 AND status = 'failed' AND attempts < $2
                    "#,
                )
                .bind(event_id)
                .bind(self.max_failed_attempts as i32)
                .execute(&self.pool)
                .await
                .map_err(StoreError::database)?;

                if readmitted.rows_affected() == 1 {
                    return Ok(Admission::Admitted);
                }

                // Lost the CAS: either the cap is reached or a concurrent
                // caller was re-admitted first.
                let current = self.fetch(event_id).await?.ok_or_else(|| {
                    StoreError::corrupt(format!("record for '{}' vanished mid-begin", event_id))
                })?;
                match current.status {
                    ProcessingStatus::Pending => Ok(Admission::InProgress),
                    ProcessingStatus::Completed => Ok(Admission::AlreadyCompleted),
                    ProcessingStatus::Failed => Ok(Admission::AlreadyFailed {
                        attempts: current.attempts,
                    }),
                }
            }
        }
    }

    async fn commit(
        &self,
        event_id: &str,
        outcome: ProcessingOutcome,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = $2, last_attempt_at = now()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(outcome.as_status().as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::corrupt(format!(
                "commit for unknown event id '{}'",
                event_id
            )));
        }
        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        self.fetch(event_id).await
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM webhook_events
            WHERE last_attempt_at < $1
            "#,
        )
        .bind(cutoff.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(deleted.rows_affected())
    }
}

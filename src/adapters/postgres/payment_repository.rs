//! PostgreSQL implementation of the PaymentStore port.
//!
//! Upserts one row per provider transaction reference. Re-applying the same
//! event is a no-op state-wise, which keeps the call idempotent under
//! webhook redelivery.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::StoreError;
use crate::domain::payment::PaymentEvent;
use crate::ports::PaymentStore;

/// PostgreSQL-backed payment record store.
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn payment_status(event: &PaymentEvent) -> &'static str {
    match event {
        PaymentEvent::PaymentSucceeded { .. } | PaymentEvent::CheckoutCompleted { .. } => {
            "succeeded"
        }
        PaymentEvent::PaymentFailed { .. } => "failed",
        PaymentEvent::PaymentRefunded { .. } => "refunded",
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn record_payment_event(&self, event: &PaymentEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, user_id, transaction_ref, amount, currency, status, last_event_type, occurred_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (transaction_ref) DO UPDATE
            SET status = EXCLUDED.status,
                amount = EXCLUDED.amount,
                last_event_type = EXCLUDED.last_event_type,
                occurred_at = EXCLUDED.occurred_at,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.user_id().as_str())
        .bind(event.transaction_ref())
        .bind(event.amount().value())
        .bind(event.currency().as_str())
        .bind(payment_status(event))
        .bind(event.event_type())
        .bind(event.occurred_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(())
    }
}

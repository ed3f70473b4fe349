//! PaymentStore port - persistence collaborator for payment records.
//!
//! The relational payment store is an external collaborator; this pipeline
//! only depends on one call and its failure propagation. Each call is
//! assumed transactional on the implementation side.

use async_trait::async_trait;

use crate::domain::foundation::StoreError;
use crate::domain::payment::PaymentEvent;

/// Port for applying payment-state changes.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Records the payment-state change implied by a domain event.
    ///
    /// Must be idempotent per (transaction reference, event type): the
    /// pipeline may re-run this call when a webhook is redelivered after a
    /// partial failure.
    async fn record_payment_event(&self, event: &PaymentEvent) -> Result<(), StoreError>;
}

//! PostgreSQL adapter implementations of the store ports.

mod idempotency_repository;
mod outbox_repository;
mod payment_repository;

pub use idempotency_repository::PostgresIdempotencyStore;
pub use outbox_repository::PostgresOutbox;
pub use payment_repository::PostgresPaymentStore;

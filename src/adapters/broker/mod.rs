//! Broker adapters - delivery to the message broker and around it.
//!
//! - `RetryPolicy` - exponential backoff with jitter, shared by both paths
//! - `RetryingPublisher` - the synchronous publish portion of the pipeline
//! - `OutboxRelay` - background drain of the durable outbox
//! - `KafkaBrokerPublisher` - rskafka producer implementing `BrokerPublisher`
//! - `InMemoryBroker` - recording broker for tests

mod in_memory;
mod kafka;
mod outbox_relay;
mod retry;
mod retrying;

pub use in_memory::InMemoryBroker;
pub use kafka::KafkaBrokerPublisher;
pub use outbox_relay::{OutboxRelay, OutboxRelayConfig};
pub use retry::RetryPolicy;
pub use retrying::RetryingPublisher;

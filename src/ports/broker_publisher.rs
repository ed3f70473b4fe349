//! BrokerPublisher port - message broker delivery.
//!
//! One send, one record. Retry, backoff, and outbox fallback live above this
//! port in the retrying publisher; implementations report failures honestly
//! and classify them so the caller can tell transient from fatal.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by broker implementations.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Could not reach the broker (connection refused, DNS, TLS).
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// The broker did not acknowledge within the transport deadline.
    #[error("Broker timeout: {0}")]
    Timeout(String),

    /// The broker signalled backpressure (queue full, throttled).
    #[error("Broker backpressure: {0}")]
    Backpressure(String),

    /// The broker rejected the record (message too large, invalid topic).
    #[error("Broker rejected record: {0}")]
    Rejected(String),
}

impl BrokerError {
    /// Returns true if a retry of the same send may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, BrokerError::Rejected(_))
    }
}

/// Port for publishing serialized events to the message broker.
///
/// Implementations must preserve per-key ordering: records sent sequentially
/// with the same key are observable in that order by consumers.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// Sends one record to the broker and waits for acknowledgment.
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_and_timeout_errors_are_transient() {
        assert!(BrokerError::Connection("refused".into()).is_transient());
        assert!(BrokerError::Timeout("5s elapsed".into()).is_transient());
        assert!(BrokerError::Backpressure("queue full".into()).is_transient());
    }

    #[test]
    fn rejection_is_not_transient() {
        assert!(!BrokerError::Rejected("message too large".into()).is_transient());
    }
}

//! EventPublisher port - synchronous publish attempt with bounded retry.
//!
//! The orchestrator publishes through this port without knowing about the
//! broker transport or retry mechanics. The call is infallible: a delivery
//! failure is an outcome the caller routes to the outbox, not an error.

use async_trait::async_trait;

use crate::domain::payment::PaymentEvent;

/// Outcome of the synchronous publish portion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishAttempt {
    /// The broker acknowledged the event.
    Delivered {
        /// Send attempts used, including the successful one.
        attempts: u32,
    },

    /// The in-pipeline retry budget or deadline was exhausted.
    Exhausted {
        /// Send attempts used.
        attempts: u32,
        /// The last broker error observed.
        last_error: String,
    },
}

impl PublishAttempt {
    /// True if the broker acknowledged the event.
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishAttempt::Delivered { .. })
    }
}

/// Port for publishing a domain event with in-pipeline retry.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Attempts to deliver the event at least once, retrying transient
    /// broker failures within a bounded budget and deadline.
    async fn publish(&self, event: &PaymentEvent) -> PublishAttempt;
}

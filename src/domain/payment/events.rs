//! Internal payment domain events.
//!
//! The closed set of events this service emits to the message broker. Every
//! variant carries the same core facts about a payment occurrence; the
//! variant itself encodes what happened.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

use super::{Currency, MinorUnits};

/// Provider-agnostic payment event published to the broker.
///
/// Owned exclusively by the outbound publishing path once translated;
/// immutable after construction. Serialized as a tagged JSON object
/// (`"type": "payment_succeeded"` etc.) on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentEvent {
    /// A payment was captured successfully.
    PaymentSucceeded {
        user_id: UserId,
        amount: MinorUnits,
        currency: Currency,
        transaction_ref: String,
        occurred_at: Timestamp,
    },

    /// A payment attempt failed.
    PaymentFailed {
        user_id: UserId,
        amount: MinorUnits,
        currency: Currency,
        transaction_ref: String,
        occurred_at: Timestamp,
    },

    /// A previously captured payment was refunded.
    PaymentRefunded {
        user_id: UserId,
        amount: MinorUnits,
        currency: Currency,
        transaction_ref: String,
        occurred_at: Timestamp,
    },

    /// A hosted checkout session finished with a paid status.
    CheckoutCompleted {
        user_id: UserId,
        amount: MinorUnits,
        currency: Currency,
        transaction_ref: String,
        occurred_at: Timestamp,
    },
}

impl PaymentEvent {
    /// Event type string used for routing and logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentSucceeded { .. } => "payment.succeeded",
            PaymentEvent::PaymentFailed { .. } => "payment.failed",
            PaymentEvent::PaymentRefunded { .. } => "payment.refunded",
            PaymentEvent::CheckoutCompleted { .. } => "checkout.completed",
        }
    }

    /// The user this payment belongs to.
    pub fn user_id(&self) -> &UserId {
        match self {
            PaymentEvent::PaymentSucceeded { user_id, .. }
            | PaymentEvent::PaymentFailed { user_id, .. }
            | PaymentEvent::PaymentRefunded { user_id, .. }
            | PaymentEvent::CheckoutCompleted { user_id, .. } => user_id,
        }
    }

    /// Amount in minor units.
    pub fn amount(&self) -> MinorUnits {
        match self {
            PaymentEvent::PaymentSucceeded { amount, .. }
            | PaymentEvent::PaymentFailed { amount, .. }
            | PaymentEvent::PaymentRefunded { amount, .. }
            | PaymentEvent::CheckoutCompleted { amount, .. } => *amount,
        }
    }

    /// Settlement currency.
    pub fn currency(&self) -> &Currency {
        match self {
            PaymentEvent::PaymentSucceeded { currency, .. }
            | PaymentEvent::PaymentFailed { currency, .. }
            | PaymentEvent::PaymentRefunded { currency, .. }
            | PaymentEvent::CheckoutCompleted { currency, .. } => currency,
        }
    }

    /// Provider transaction reference.
    ///
    /// Doubles as the broker partition key: events sharing a transaction
    /// reference are delivered in admission order.
    pub fn transaction_ref(&self) -> &str {
        match self {
            PaymentEvent::PaymentSucceeded {
                transaction_ref, ..
            }
            | PaymentEvent::PaymentFailed {
                transaction_ref, ..
            }
            | PaymentEvent::PaymentRefunded {
                transaction_ref, ..
            }
            | PaymentEvent::CheckoutCompleted {
                transaction_ref, ..
            } => transaction_ref,
        }
    }

    /// When the payment occurrence happened at the provider.
    pub fn occurred_at(&self) -> Timestamp {
        match self {
            PaymentEvent::PaymentSucceeded { occurred_at, .. }
            | PaymentEvent::PaymentFailed { occurred_at, .. }
            | PaymentEvent::PaymentRefunded { occurred_at, .. }
            | PaymentEvent::CheckoutCompleted { occurred_at, .. } => *occurred_at,
        }
    }

    /// Key under which the event is published to the broker.
    pub fn routing_key(&self) -> &str {
        self.transaction_ref()
    }
}

#[cfg(test)]
pub(crate) fn test_event(transaction_ref: &str) -> PaymentEvent {
    PaymentEvent::PaymentSucceeded {
        user_id: UserId::new("user-test").unwrap(),
        amount: MinorUnits::new(1999).unwrap(),
        currency: Currency::parse("usd").unwrap(),
        transaction_ref: transaction_ref.to_string(),
        occurred_at: Timestamp::from_unix_secs(1704067200),
    }
}

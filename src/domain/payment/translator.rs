//! Event translator - maps verified provider events to domain events.
//!
//! Pure mapping keyed on the provider event-type tag, with strict field
//! validation. Unknown tags and intentionally skipped events are distinct
//! from malformed payloads: the former are acknowledged to the provider
//! without producing an event, the latter are permanent failures.

use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::webhook::{ProviderEventType, VerifiedEvent};

use super::{Currency, MinorUnits, PaymentEvent};

/// Why a verified payload did not translate into a domain event.
#[derive(Debug, Clone, Error)]
pub enum TranslationError {
    /// Event type the pipeline does not act on. Acknowledged, never retried.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Required field missing or invalid. Permanent; redelivery of the same
    /// payload fails identically.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Recognized event that is intentionally not acted on
    /// (e.g. a completed checkout session that was never paid).
    #[error("Not actionable: {0}")]
    NotActionable(String),
}

/// Translates a verified provider event into a domain event.
pub fn translate(verified: &VerifiedEvent) -> Result<PaymentEvent, TranslationError> {
    let event = verified.event();
    let object = &event.data.object;
    let occurred_at = Timestamp::from_unix_secs(event.created);

    match event.parsed_type() {
        ProviderEventType::PaymentIntentSucceeded => {
            let amount = amount_field(object, "amount_received")
                .or_else(|_| amount_field(object, "amount"))?;
            Ok(PaymentEvent::PaymentSucceeded {
                user_id: metadata_user_id(object)?,
                amount,
                currency: currency_field(object)?,
                transaction_ref: string_field(object, "id")?,
                occurred_at,
            })
        }

        ProviderEventType::PaymentIntentFailed => Ok(PaymentEvent::PaymentFailed {
            user_id: metadata_user_id(object)?,
            amount: amount_field(object, "amount")?,
            currency: currency_field(object)?,
            transaction_ref: string_field(object, "id")?,
            occurred_at,
        }),

        ProviderEventType::ChargeRefunded => {
            // Refunds key on the originating payment intent so they order
            // behind the payment they reverse.
            let transaction_ref = match optional_string_field(object, "payment_intent") {
                Some(payment_intent) => payment_intent,
                None => string_field(object, "id")?,
            };
            Ok(PaymentEvent::PaymentRefunded {
                user_id: metadata_user_id(object)?,
                amount: amount_field(object, "amount_refunded")?,
                currency: currency_field(object)?,
                transaction_ref,
                occurred_at,
            })
        }

        ProviderEventType::CheckoutSessionCompleted => {
            let payment_status = optional_string_field(object, "payment_status")
                .unwrap_or_else(|| "unpaid".to_string());
            if payment_status != "paid" {
                return Err(TranslationError::NotActionable(format!(
                    "checkout session payment_status is '{}'",
                    payment_status
                )));
            }

            let user_id = optional_string_field(object, "client_reference_id")
                .map(UserId::new)
                .transpose()
                .map_err(|e| TranslationError::MalformedPayload(e.to_string()))?;
            let user_id = match user_id {
                Some(id) => id,
                None => metadata_user_id(object)?,
            };

            Ok(PaymentEvent::CheckoutCompleted {
                user_id,
                amount: amount_field(object, "amount_total")?,
                currency: currency_field(object)?,
                transaction_ref: string_field(object, "payment_intent")?,
                occurred_at,
            })
        }

        ProviderEventType::Unknown => Err(TranslationError::UnknownEventType(
            event.event_type.clone(),
        )),
    }
}

fn string_field(object: &Value, field: &'static str) -> Result<String, TranslationError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TranslationError::MalformedPayload(format!("missing field '{}'", field)))
}

fn optional_string_field(object: &Value, field: &str) -> Option<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn amount_field(object: &Value, field: &'static str) -> Result<MinorUnits, TranslationError> {
    let raw = object
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| TranslationError::MalformedPayload(format!("missing field '{}'", field)))?;
    MinorUnits::new(raw).map_err(|e| TranslationError::MalformedPayload(e.to_string()))
}

fn currency_field(object: &Value) -> Result<Currency, TranslationError> {
    let raw = string_field(object, "currency")?;
    Currency::parse(&raw).map_err(|e| TranslationError::MalformedPayload(e.to_string()))
}

fn metadata_user_id(object: &Value) -> Result<UserId, TranslationError> {
    let raw = object
        .get("metadata")
        .and_then(|m| m.get("user_id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            TranslationError::MalformedPayload("missing user reference in metadata".to_string())
        })?;
    UserId::new(raw).map_err(|e| TranslationError::MalformedPayload(e.to_string()))
}

//! Webhook error types.
//!
//! All error conditions that can occur while ingesting a provider webhook,
//! with HTTP status code mapping and retryability semantics. The status code
//! drives the provider's retry behavior, so the mapping is part of the
//! contract: 2xx and 4xx stop redelivery, 5xx triggers it.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::StoreError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the tolerance window.
    #[error("Stale timestamp")]
    StaleTimestamp,

    /// Failed to parse the signature header or the JSON payload.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Payload was recognized but a required field is missing or invalid.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Durable storage operation failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Internal pipeline failure (e.g. a background task aborted).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    ///
    /// Only infrastructure failures are retryable; authenticity and schema
    /// errors fail identically on redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Store(_) | WebhookError::Internal(_))
    }

    /// Maps the error to the HTTP status code returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Security rejections - never retried
            WebhookError::InvalidSignature | WebhookError::StaleTimestamp => {
                StatusCode::UNAUTHORIZED
            }

            // Permanent schema problems - provider must stop retrying
            WebhookError::ParseError(_) | WebhookError::MalformedPayload(_) => {
                StatusCode::BAD_REQUEST
            }

            // Infrastructure failures - provider redelivers
            WebhookError::Store(_) | WebhookError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::StaleTimestamp => "STALE_TIMESTAMP",
            WebhookError::ParseError(_) => "PARSE_ERROR",
            WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WebhookError::Store(_) => "STORAGE_ERROR",
            WebhookError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn invalid_signature_returns_unauthorized() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn stale_timestamp_returns_unauthorized() {
        assert_eq!(
            WebhookError::StaleTimestamp.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn parse_error_returns_bad_request() {
        let err = WebhookError::ParseError("bad header".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_payload_returns_bad_request() {
        let err = WebhookError::MalformedPayload("missing user reference".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_error_returns_internal_error() {
        let err = WebhookError::Store(StoreError::database("connection lost"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ══════════════════════════════════════════════════════════════
    // Retryability Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn security_rejections_are_not_retryable() {
        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert!(!WebhookError::StaleTimestamp.is_retryable());
    }

    #[test]
    fn schema_errors_are_not_retryable() {
        assert!(!WebhookError::ParseError("x".to_string()).is_retryable());
        assert!(!WebhookError::MalformedPayload("x".to_string()).is_retryable());
    }

    #[test]
    fn store_errors_are_retryable() {
        let err = WebhookError::Store(StoreError::database("timeout"));
        assert!(err.is_retryable());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(WebhookError::InvalidSignature.code(), "INVALID_SIGNATURE");
        assert_eq!(WebhookError::StaleTimestamp.code(), "STALE_TIMESTAMP");
    }
}

//! Error types for the domain layer.

use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must not be negative, got {actual}")]
    Negative { field: String, actual: i64 },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates a negative value validation error.
    pub fn negative(field: impl Into<String>, actual: i64) -> Self {
        ValidationError::Negative {
            field: field.into(),
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by durable storage collaborators.
///
/// Covers both the idempotency store and the payment record store; callers
/// treat every variant as retryable by the provider (the webhook response is
/// 5xx and the idempotency record stays re-admittable).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Underlying database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Stored data could not be interpreted.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl StoreError {
    /// Creates a database error from any displayable source.
    pub fn database(source: impl std::fmt::Display) -> Self {
        StoreError::Database(source.to_string())
    }

    /// Creates a corrupt-record error from any displayable source.
    pub fn corrupt(source: impl std::fmt::Display) -> Self {
        StoreError::CorruptRecord(source.to_string())
    }
}

//! Request/response DTOs for the HTTP layer.

use serde::{Deserialize, Serialize};

use crate::ports::{CheckoutSession, PublishTask};

/// Acknowledgment body for webhook responses.
///
/// The provider's retry behavior is driven by the status code only; this
/// body exists for humans reading logs and replay tooling.
#[derive(Debug, Serialize)]
pub struct WebhookAckResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Request body for POST /api/payments/checkout.
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutApiRequest {
    pub user_id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Response body for a created checkout session.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
}

impl From<CheckoutSession> for CheckoutResponse {
    fn from(session: CheckoutSession) -> Self {
        Self {
            session_id: session.id,
            checkout_url: session.url,
        }
    }
}

/// Operator view of a dead-lettered publish task.
#[derive(Debug, Serialize)]
pub struct DeadLetterResponse {
    pub id: String,
    pub event_type: &'static str,
    pub partition_key: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
}

impl From<PublishTask> for DeadLetterResponse {
    fn from(task: PublishTask) -> Self {
        Self {
            id: task.id.to_string(),
            event_type: task.event.event_type(),
            partition_key: task.partition_key,
            attempts: task.attempts,
            last_error: task.last_error,
            created_at: task.created_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

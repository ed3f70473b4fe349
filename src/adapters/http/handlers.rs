//! HTTP handlers connecting axum routes to application handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::handlers::checkout::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
};
use crate::application::handlers::webhook::{
    ProcessWebhookCommand, ProcessWebhookHandler, WebhookDisposition,
};
use crate::domain::foundation::UserId;
use crate::domain::payment::{Currency, MinorUnits};
use crate::domain::webhook::{WebhookError, WebhookVerifier};
use crate::ports::{
    CheckoutError, CheckoutProvider, CreateCheckoutRequest, EventPublisher, IdempotencyStore,
    OutboxWriter, PaymentStore,
};

use super::dto::{
    CheckoutResponse, CreateCheckoutApiRequest, DeadLetterResponse, ErrorResponse,
    HealthResponse, WebhookAckResponse,
};

/// Shared application state containing all dependencies.
///
/// Cloned per request; dependencies are Arc-wrapped for cheap sharing.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<WebhookVerifier>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub outbox: Arc<dyn OutboxWriter>,
    pub checkout: Arc<dyn CheckoutProvider>,
}

impl AppState {
    /// Create the webhook pipeline handler from the shared state.
    pub fn webhook_handler(&self) -> ProcessWebhookHandler {
        ProcessWebhookHandler::new(
            self.verifier.clone(),
            self.idempotency.clone(),
            self.payments.clone(),
            self.publisher.clone(),
            self.outbox.clone(),
        )
    }

    pub fn checkout_handler(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(self.checkout.clone())
    }
}

/// POST /api/webhooks/provider - webhook ingestion endpoint.
pub async fn handle_provider_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::from(WebhookError::ParseError(
                "missing Stripe-Signature header".to_string(),
            ))
        })?;

    let handler = state.webhook_handler();
    let cmd = ProcessWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    let disposition = handler.handle(cmd).await?;

    let (status, body) = match disposition {
        WebhookDisposition::Published { event_id } => (
            StatusCode::OK,
            WebhookAckResponse {
                status: "published",
                event_id: Some(event_id),
            },
        ),
        WebhookDisposition::Outboxed { event_id } => (
            StatusCode::OK,
            WebhookAckResponse {
                status: "accepted",
                event_id: Some(event_id),
            },
        ),
        WebhookDisposition::AlreadyProcessed { event_id } => (
            StatusCode::OK,
            WebhookAckResponse {
                status: "already_processed",
                event_id: Some(event_id),
            },
        ),
        WebhookDisposition::Ignored { event_id, .. } => (
            StatusCode::OK,
            WebhookAckResponse {
                status: "ignored",
                event_id: Some(event_id),
            },
        ),
        // Another delivery is mid-flight; provider retries later.
        WebhookDisposition::InProgress { event_id } => (
            StatusCode::CONFLICT,
            WebhookAckResponse {
                status: "in_progress",
                event_id: Some(event_id),
            },
        ),
    };

    Ok((status, Json(body)))
}

/// POST /api/payments/checkout - create a hosted checkout session.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutApiRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = UserId::new(request.user_id).map_err(ApiError::validation)?;
    let amount = MinorUnits::new(request.amount).map_err(ApiError::validation)?;
    let currency = Currency::parse(&request.currency).map_err(ApiError::validation)?;

    let handler = state.checkout_handler();
    let cmd = CreateCheckoutSessionCommand {
        request: CreateCheckoutRequest {
            user_id,
            amount,
            currency,
            description: request
                .description
                .unwrap_or_else(|| "Payment".to_string()),
            success_url: request.success_url,
            cancel_url: request.cancel_url,
        },
    };

    let session = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(session))))
}

/// GET /api/admin/dead-letters - operator surface for parked publish tasks.
pub async fn list_dead_letters(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let tasks = state
        .outbox
        .dead_letters(100)
        .await
        .map_err(WebhookError::Store)?;

    let body: Vec<DeadLetterResponse> = tasks.into_iter().map(DeadLetterResponse::from).collect();
    Ok(Json(body))
}

/// GET /health - liveness probe.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: "payment-relay",
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts pipeline errors to HTTP responses.
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiError {
    fn validation(err: crate::domain::foundation::ValidationError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_FAILED".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        Self {
            status: err.status_code(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        let (status, code) = match &err {
            CheckoutError::Rejected(_) => (StatusCode::BAD_REQUEST, "CHECKOUT_REJECTED"),
            CheckoutError::Unavailable(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_UNAVAILABLE"),
        };
        Self {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorResponse::new(self.code, self.message);
        (self.status, Json(body)).into_response()
    }
}

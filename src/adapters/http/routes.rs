//! Axum router configuration.
//!
//! Route structure:
//!
//! - `POST /api/webhooks/provider` - signature-verified webhook ingestion
//! - `POST /api/payments/checkout` - hosted checkout session creation
//! - `GET  /api/admin/dead-letters` - parked publish tasks for operators
//! - `GET  /health` - liveness probe

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    create_checkout_session, handle_provider_webhook, health_check, list_dead_letters, AppState,
};

/// Webhook ingestion routes.
///
/// Separate from the payment routes because webhooks carry no user
/// authentication; they are verified via signature.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/provider", post(handle_provider_webhook))
}

/// Payment routes (checkout pass-through).
pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/checkout", post(create_checkout_session))
}

/// Operator routes.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/dead-letters", get(list_dead_letters))
}

/// Complete API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .nest("/webhooks", webhook_routes())
                .nest("/payments", payment_routes())
                .nest("/admin", admin_routes()),
        )
        .route("/health", get(health_check))
}

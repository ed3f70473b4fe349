//! CheckoutProvider port - provider checkout session creation.
//!
//! Starting a payment is a thin pass-through to the provider API; the hard
//! work in this service is the webhook that comes back. The port exists so
//! the HTTP layer does not depend on the provider SDK shape directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::UserId;
use crate::domain::payment::{Currency, MinorUnits};

/// Request to create a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutRequest {
    /// User starting the payment; forwarded as the client reference so the
    /// completion webhook can attribute the payment.
    pub user_id: UserId,

    /// Amount to charge, in minor units.
    pub amount: MinorUnits,

    /// Settlement currency.
    pub currency: Currency,

    /// Line-item description shown on the hosted page.
    pub description: String,

    /// Where the provider redirects after successful payment.
    pub success_url: String,

    /// Where the provider redirects on cancellation.
    pub cancel_url: String,
}

/// A created checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session id (cs_xxx format).
    pub id: String,

    /// Hosted checkout URL for the user.
    pub url: String,
}

/// Errors raised while creating a checkout session.
#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    /// The provider API rejected the request.
    #[error("Provider rejected checkout request: {0}")]
    Rejected(String),

    /// The provider API was unreachable or returned a server error.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Port for creating provider checkout sessions.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Creates a hosted checkout session for the given request.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError>;
}

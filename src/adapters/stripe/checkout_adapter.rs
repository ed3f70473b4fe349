//! Stripe checkout session adapter.
//!
//! Implements the `CheckoutProvider` port against the Stripe REST API.
//! This is the thin pass-through half of the provider integration; webhook
//! verification lives in the domain layer and does not go through here.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{CheckoutError, CheckoutProvider, CheckoutSession, CreateCheckoutRequest};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for the Stripe API.
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Overrides the API base URL (test servers).
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe implementation of the CheckoutProvider port.
pub struct StripeCheckoutAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeCheckoutAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }
}

/// Subset of Stripe's checkout session response we read.
#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

#[async_trait]
impl CheckoutProvider for StripeCheckoutAdapter {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        // Stripe's form encoding for one fixed-price line item.
        let currency = request.currency.as_str().to_ascii_lowercase();
        let params: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("client_reference_id", request.user_id.to_string()),
            ("metadata[user_id]", request.user_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", currency),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount.value().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.description.clone(),
            ),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
        ];

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .form(&params)
            .send()
            .await
            .map_err(|e| CheckoutError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let session: StripeCheckoutSessionResponse = response
                .json()
                .await
                .map_err(|e| CheckoutError::Unavailable(format!("invalid response: {}", e)))?;

            return Ok(CheckoutSession {
                id: session.id,
                url: session.url,
            });
        }

        let message = response
            .json::<StripeErrorResponse>()
            .await
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| format!("HTTP {}", status));

        if status.is_client_error() {
            tracing::error!(status = %status, %message, "Stripe rejected checkout request");
            Err(CheckoutError::Rejected(message))
        } else {
            tracing::error!(status = %status, %message, "Stripe API unavailable");
            Err(CheckoutError::Unavailable(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_stripe_api() {
        let config = StripeConfig::new("sk_test_xxx");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
    }

    #[test]
    fn config_base_url_override() {
        let config = StripeConfig::new("sk_test_xxx").with_api_base_url("http://localhost:12111");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }
}

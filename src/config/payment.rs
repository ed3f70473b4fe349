//! Payment provider configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment provider configuration (Stripe)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Provider API key
    pub stripe_api_key: String,

    /// Webhook signing secret
    pub stripe_webhook_secret: String,

    /// Webhook signature tolerance window in seconds
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,

    /// Reprocessing attempts allowed for a failed event id before it becomes
    /// a permanent failure
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,

    /// Idempotency record retention in days. Must exceed the provider's
    /// maximum redelivery window (3 days for Stripe).
    #[serde(default = "default_retention_days")]
    pub idempotency_retention_days: u32,
}

impl PaymentConfig {
    /// Check if using provider test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using provider live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidProviderKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidWebhookSecret);
        }

        if self.signature_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        if self.max_failed_attempts == 0 {
            return Err(ValidationError::InvalidRetryBudget);
        }

        Ok(())
    }
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_max_failed_attempts() -> u32 {
    3
}

fn default_retention_days() -> u32 {
    30
}

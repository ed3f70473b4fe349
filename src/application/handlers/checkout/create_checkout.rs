//! CreateCheckoutSessionHandler - pass-through checkout session creation.
//!
//! Validates the request against domain invariants and forwards it to the
//! provider. No pipeline logic lives here; the interesting half of a payment
//! arrives later as a webhook.

use std::sync::Arc;

use crate::ports::{CheckoutError, CheckoutProvider, CheckoutSession, CreateCheckoutRequest};

/// Command to start a hosted checkout flow.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub request: CreateCheckoutRequest,
}

/// Handler for creating provider checkout sessions.
pub struct CreateCheckoutSessionHandler {
    provider: Arc<dyn CheckoutProvider>,
}

impl CreateCheckoutSessionHandler {
    pub fn new(provider: Arc<dyn CheckoutProvider>) -> Self {
        Self { provider }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CheckoutSession, CheckoutError> {
        let session = self.provider.create_checkout_session(cmd.request).await?;

        tracing::info!(session_id = %session.id, "checkout session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::payment::{Currency, MinorUnits};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockCheckoutProvider {
        requests: Mutex<Vec<CreateCheckoutRequest>>,
        fail: bool,
    }

    impl MockCheckoutProvider {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl CheckoutProvider for MockCheckoutProvider {
        async fn create_checkout_session(
            &self,
            request: CreateCheckoutRequest,
        ) -> Result<CheckoutSession, CheckoutError> {
            if self.fail {
                return Err(CheckoutError::Unavailable("503".to_string()));
            }
            self.requests.lock().unwrap().push(request);
            Ok(CheckoutSession {
                id: "cs_test_123".to_string(),
                url: "https://checkout.example.com/cs_test_123".to_string(),
            })
        }
    }

    fn command() -> CreateCheckoutSessionCommand {
        CreateCheckoutSessionCommand {
            request: CreateCheckoutRequest {
                user_id: UserId::new("user-1").unwrap(),
                amount: MinorUnits::new(4900).unwrap(),
                currency: Currency::parse("usd").unwrap(),
                description: "Subscription: Pro".to_string(),
                success_url: "https://app.example.com?success=true".to_string(),
                cancel_url: "https://app.example.com?canceled=true".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn forwards_request_untouched() {
        let provider = Arc::new(MockCheckoutProvider::new());
        let handler = CreateCheckoutSessionHandler::new(provider.clone());

        let session = handler.handle(command()).await.unwrap();

        assert_eq!(session.id, "cs_test_123");
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount.value(), 4900);
        assert_eq!(requests[0].currency.as_str(), "USD");
        assert_eq!(requests[0].user_id.as_str(), "user-1");
    }

    #[tokio::test]
    async fn propagates_provider_failure() {
        let handler = CreateCheckoutSessionHandler::new(Arc::new(MockCheckoutProvider::failing()));

        let result = handler.handle(command()).await;

        assert!(matches!(result, Err(CheckoutError::Unavailable(_))));
    }
}

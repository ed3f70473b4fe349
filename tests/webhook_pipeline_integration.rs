//! Integration tests for the webhook ingestion pipeline.
//!
//! Exercises the end-to-end flow over in-memory adapters:
//! 1. Signed webhook arrives at the HTTP handler
//! 2. Pipeline verifies, deduplicates, translates, persists
//! 3. Event is published synchronously or handed to the outbox
//! 4. OutboxRelay drains the outbox once the broker recovers

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use serde_json::json;

use payment_relay::adapters::broker::{
    InMemoryBroker, OutboxRelay, OutboxRelayConfig, RetryPolicy, RetryingPublisher,
};
use payment_relay::adapters::http::handlers::handle_provider_webhook;
use payment_relay::adapters::http::AppState;
use payment_relay::adapters::memory::{
    InMemoryIdempotencyStore, InMemoryOutbox, InMemoryPaymentStore,
};
use payment_relay::domain::payment::PaymentEvent;
use payment_relay::domain::webhook::{sign_payload, WebhookVerifier};
use payment_relay::ports::{
    CheckoutError, CheckoutProvider, CheckoutSession, CreateCheckoutRequest, IdempotencyStore,
    OutboxWriter,
};

const SECRET: &str = "whsec_integration_tests";

// =============================================================================
// Test Infrastructure
// =============================================================================

struct StubCheckoutProvider;

#[async_trait::async_trait]
impl CheckoutProvider for StubCheckoutProvider {
    async fn create_checkout_session(
        &self,
        _request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError> {
        Ok(CheckoutSession {
            id: "cs_stub".to_string(),
            url: "https://checkout.example.com/cs_stub".to_string(),
        })
    }
}

struct Pipeline {
    state: AppState,
    broker: Arc<InMemoryBroker>,
    outbox: Arc<InMemoryOutbox>,
    payments: Arc<InMemoryPaymentStore>,
}

/// Builds a full pipeline over in-memory adapters with a fast retry policy.
fn pipeline() -> Pipeline {
    let broker = Arc::new(InMemoryBroker::new());
    let outbox = Arc::new(InMemoryOutbox::new());
    let payments = Arc::new(InMemoryPaymentStore::new());

    let publisher = Arc::new(RetryingPublisher::new(
        broker.clone(),
        "payment_events",
        RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5), 3),
        Duration::from_secs(5),
    ));

    let state = AppState {
        verifier: Arc::new(WebhookVerifier::new(SECRET)),
        idempotency: Arc::new(InMemoryIdempotencyStore::new(3)),
        payments: payments.clone(),
        publisher,
        outbox: outbox.clone(),
        checkout: Arc::new(StubCheckoutProvider),
    };

    Pipeline {
        state,
        broker,
        outbox,
        payments,
    }
}

fn signed_headers(payload: &str) -> HeaderMap {
    let timestamp = chrono::Utc::now().timestamp();
    let mut headers = HeaderMap::new();
    headers.insert(
        "Stripe-Signature",
        HeaderValue::from_str(&format!(
            "t={},v1={}",
            timestamp,
            sign_payload(SECRET, timestamp, payload.as_bytes())
        ))
        .unwrap(),
    );
    headers
}

fn payment_succeeded_payload(event_id: &str, amount: i64) -> String {
    json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "created": chrono::Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "pi_integration",
                "amount": amount,
                "amount_received": amount,
                "currency": "usd",
                "metadata": {"user_id": "user-42"}
            }
        },
        "livemode": false
    })
    .to_string()
}

async fn deliver(pipeline: &Pipeline, payload: &str, headers: HeaderMap) -> StatusCode {
    let response = handle_provider_webhook(
        State(pipeline.state.clone()),
        headers,
        Bytes::from(payload.as_bytes().to_vec()),
    )
    .await
    .into_response();
    response.status()
}

// =============================================================================
// Integration Tests
// =============================================================================

/// Valid signature, payment_intent.succeeded, amount 1999, currency "usd":
/// exactly one PaymentSucceeded event published with amount=1999,
/// currency="USD", response 200.
#[tokio::test]
async fn valid_webhook_publishes_exactly_one_event() {
    let fx = pipeline();
    let payload = payment_succeeded_payload("evt_e2e_1", 1999);

    let status = deliver(&fx, &payload, signed_headers(&payload)).await;

    assert_eq!(status, StatusCode::OK);

    let delivered = fx.broker.messages_for_key("pi_integration");
    assert_eq!(delivered.len(), 1);

    let event: PaymentEvent = serde_json::from_slice(&delivered[0]).unwrap();
    assert_eq!(event.event_type(), "payment.succeeded");
    assert_eq!(event.amount().value(), 1999);
    assert_eq!(event.currency().as_str(), "USD");
    assert_eq!(event.user_id().as_str(), "user-42");

    // Persisted once as well
    assert_eq!(fx.payments.recorded_events().len(), 1);
}

/// Same payload redelivered 5 times: exactly one publish, all five
/// responses 200.
#[tokio::test]
async fn five_redeliveries_publish_once_with_five_oks() {
    let fx = pipeline();
    let payload = payment_succeeded_payload("evt_e2e_dup", 1999);

    for _ in 0..5 {
        let status = deliver(&fx, &payload, signed_headers(&payload)).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(fx.broker.message_count(), 1);
    assert_eq!(fx.payments.recorded_events().len(), 1);
}

/// Tampered signature: response 401, no idempotency record, no event.
#[tokio::test]
async fn tampered_signature_is_rejected_with_401() {
    let fx = pipeline();
    let payload = payment_succeeded_payload("evt_e2e_tampered", 1999);

    let timestamp = chrono::Utc::now().timestamp();
    let mut headers = HeaderMap::new();
    headers.insert(
        "Stripe-Signature",
        HeaderValue::from_str(&format!("t={},v1={}", timestamp, "ab".repeat(32))).unwrap(),
    );

    let status = deliver(&fx, &payload, headers).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(fx.broker.message_count(), 0);
    assert!(fx.payments.recorded_events().is_empty());
    assert!(fx
        .state
        .idempotency
        .find("evt_e2e_tampered")
        .await
        .unwrap()
        .is_none());
}

/// Missing signature header: 400, provider must not blind-retry forever.
#[tokio::test]
async fn missing_signature_header_is_400() {
    let fx = pipeline();
    let payload = payment_succeeded_payload("evt_e2e_nosig", 1999);

    let status = deliver(&fx, &payload, HeaderMap::new()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Unknown event types are acknowledged, produce no domain event, and the
/// idempotency record is completed rather than failed.
#[tokio::test]
async fn unknown_event_type_acknowledged_without_event() {
    let fx = pipeline();
    let payload = json!({
        "id": "evt_e2e_unknown",
        "type": "customer.subscription.updated",
        "created": chrono::Utc::now().timestamp(),
        "data": {"object": {}},
        "livemode": false
    })
    .to_string();

    let status = deliver(&fx, &payload, signed_headers(&payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.broker.message_count(), 0);

    let record = fx
        .state
        .idempotency
        .find("evt_e2e_unknown")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.status,
        payment_relay::ports::ProcessingStatus::Completed
    );
}

/// Malformed payload: 400 and a failed idempotency record.
#[tokio::test]
async fn malformed_payload_is_400() {
    let fx = pipeline();
    let payload = json!({
        "id": "evt_e2e_malformed",
        "type": "payment_intent.succeeded",
        "created": chrono::Utc::now().timestamp(),
        "data": {"object": {"id": "pi_x", "currency": "usd"}},
        "livemode": false
    })
    .to_string();

    let status = deliver(&fx, &payload, signed_headers(&payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fx.broker.message_count(), 0);
}

/// Broker unreachable for the whole in-pipeline budget, then recovers:
/// webhook response is 200, event lands in the outbox, relay delivers it
/// exactly once.
#[tokio::test]
async fn broker_outage_routes_event_through_outbox() {
    let fx = pipeline();
    let payload = payment_succeeded_payload("evt_e2e_outage", 2900);

    // All three synchronous attempts fail
    fx.broker.fail_next(3);
    let status = deliver(&fx, &payload, signed_headers(&payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.broker.message_count(), 0);
    assert_eq!(fx.outbox.get_unpublished(10).await.unwrap().len(), 1);

    // Broker recovered: relay empties the outbox with exactly one delivery
    let relay = OutboxRelay::with_config(
        fx.outbox.clone(),
        fx.broker.clone(),
        "payment_events",
        OutboxRelayConfig::default()
            .with_retry_policy(RetryPolicy::new(Duration::ZERO, Duration::ZERO, 3)),
    );
    let delivered = relay.poll_once().await.unwrap();

    assert_eq!(delivered, 1);
    assert!(fx.outbox.get_unpublished(10).await.unwrap().is_empty());

    let messages = fx.broker.messages_for_key("pi_integration");
    assert_eq!(messages.len(), 1);
    let event: PaymentEvent = serde_json::from_slice(&messages[0]).unwrap();
    assert_eq!(event.amount().value(), 2900);

    // A later poll does not redeliver
    assert_eq!(relay.poll_once().await.unwrap(), 0);
    assert_eq!(fx.broker.message_count(), 1);
}

/// Persistence failure: 500 (provider will redeliver), then the redelivery
/// succeeds once the store recovers, publishing exactly once.
#[tokio::test]
async fn persistence_failure_recovers_on_redelivery() {
    let fx = pipeline();
    let payload = payment_succeeded_payload("evt_e2e_store", 1500);

    fx.payments.fail_next(1);
    let status = deliver(&fx, &payload, signed_headers(&payload)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fx.broker.message_count(), 0);

    // Provider redelivers; failed record re-admits
    let status = deliver(&fx, &payload, signed_headers(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.broker.message_count(), 1);
    assert_eq!(fx.payments.recorded_events().len(), 1);
}

/// Two same-key webhooks where the first gets outboxed: the second must not
/// overtake it at the broker, and the relay preserves admission order.
#[tokio::test]
async fn same_key_ordering_survives_broker_outage() {
    let fx = pipeline();

    // First webhook: broker down, event outboxed
    let first = payment_succeeded_payload("evt_e2e_order_1", 1000);
    fx.broker.fail_next(3);
    assert_eq!(
        deliver(&fx, &first, signed_headers(&first)).await,
        StatusCode::OK
    );

    // Second webhook for the same transaction: broker healthy again, but the
    // event must queue behind its predecessor
    let second = payment_succeeded_payload("evt_e2e_order_2", 2000);
    assert_eq!(
        deliver(&fx, &second, signed_headers(&second)).await,
        StatusCode::OK
    );
    assert_eq!(fx.broker.message_count(), 0);
    assert_eq!(fx.outbox.get_unpublished(10).await.unwrap().len(), 2);

    // Relay drains in order, one same-key task per cycle
    let relay = OutboxRelay::with_config(
        fx.outbox.clone(),
        fx.broker.clone(),
        "payment_events",
        OutboxRelayConfig::default()
            .with_retry_policy(RetryPolicy::new(Duration::ZERO, Duration::ZERO, 3)),
    );
    relay.poll_once().await.unwrap();
    relay.poll_once().await.unwrap();

    let messages = fx.broker.messages_for_key("pi_integration");
    assert_eq!(messages.len(), 2);
    let first_event: PaymentEvent = serde_json::from_slice(&messages[0]).unwrap();
    let second_event: PaymentEvent = serde_json::from_slice(&messages[1]).unwrap();
    assert_eq!(first_event.amount().value(), 1000);
    assert_eq!(second_event.amount().value(), 2000);
}

/// Concurrent deliveries of the same event id: every response is 200 or 409
/// and exactly one publish happens.
#[tokio::test]
async fn concurrent_redeliveries_publish_exactly_once() {
    let fx = pipeline();
    let payload = payment_succeeded_payload("evt_e2e_race", 1999);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let fx_state = fx.state.clone();
        let payload = payload.clone();
        let headers = signed_headers(&payload);
        handles.push(tokio::spawn(async move {
            handle_provider_webhook(
                State(fx_state),
                headers,
                Bytes::from(payload.as_bytes().to_vec()),
            )
            .await
            .into_response()
            .status()
        }));
    }

    for handle in handles {
        let status = handle.await.unwrap();
        assert!(
            status == StatusCode::OK || status == StatusCode::CONFLICT,
            "unexpected status {}",
            status
        );
    }

    assert_eq!(fx.broker.message_count(), 1);
    assert_eq!(fx.payments.recorded_events().len(), 1);
}

//! ProcessWebhookHandler - the webhook pipeline orchestrator.
//!
//! Composes verification, deduplication, translation, persistence, and
//! publishing into the per-request flow:
//!
//! ```text
//! Received -> Verifying -> Deduplicating -> Translating -> Persisting
//!          -> Publishing -> Acknowledged
//! ```
//!
//! Terminal short-circuits: `Rejected` (signature/timestamp), `Ignored`
//! (unknown type, duplicate), `Failed` (malformed payload, persistence
//! failure). Publish exhaustion is NOT a failure: the event goes to the
//! durable outbox and the webhook is acknowledged, so the provider does not
//! redeliver an event we already own.
//!
//! Everything after admission runs on a spawned task: if the provider
//! disconnects mid-request, the admitted record still resolves to a terminal
//! state instead of wedging as `pending`.

use std::sync::Arc;

use crate::domain::foundation::StoreError;
use crate::domain::payment::{translate, PaymentEvent, TranslationError};
use crate::domain::webhook::{VerifiedEvent, WebhookError, WebhookVerifier};
use crate::ports::{
    Admission, EventPublisher, IdempotencyStore, OutboxWriter, PaymentStore, ProcessingOutcome,
    PublishAttempt, PublishTask,
};

/// Command to process one inbound webhook call.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    /// Raw request body bytes.
    pub payload: Vec<u8>,
    /// Value of the provider signature header.
    pub signature: String,
}

/// How the pipeline disposed of a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// Event translated, persisted, and acknowledged by the broker.
    Published { event_id: String },

    /// Event translated and persisted; broker delivery handed to the outbox.
    Outboxed { event_id: String },

    /// Duplicate of an already-completed event id; original success response
    /// repeated without reprocessing.
    AlreadyProcessed { event_id: String },

    /// Another delivery of this event id is mid-pipeline; provider should
    /// retry later.
    InProgress { event_id: String },

    /// Acknowledged without producing an event (unknown type, intentionally
    /// skipped event, or permanently failed record).
    Ignored { event_id: String, reason: String },
}

/// Handler for processing provider webhooks.
pub struct ProcessWebhookHandler {
    verifier: Arc<WebhookVerifier>,
    idempotency: Arc<dyn IdempotencyStore>,
    payments: Arc<dyn PaymentStore>,
    publisher: Arc<dyn EventPublisher>,
    outbox: Arc<dyn OutboxWriter>,
}

impl ProcessWebhookHandler {
    pub fn new(
        verifier: Arc<WebhookVerifier>,
        idempotency: Arc<dyn IdempotencyStore>,
        payments: Arc<dyn PaymentStore>,
        publisher: Arc<dyn EventPublisher>,
        outbox: Arc<dyn OutboxWriter>,
    ) -> Self {
        Self {
            verifier,
            idempotency,
            payments,
            publisher,
            outbox,
        }
    }

    /// Runs the pipeline for one inbound webhook call.
    pub async fn handle(
        &self,
        cmd: ProcessWebhookCommand,
    ) -> Result<WebhookDisposition, WebhookError> {
        // Verifying: nothing in the payload is trusted before this call.
        let verified = self
            .verifier
            .verify_and_parse(&cmd.payload, &cmd.signature)?;
        let event_id = verified.event().id.clone();
        let event_type = verified.event().event_type.clone();

        // Deduplicating: exactly one caller wins admission per event id.
        match self.idempotency.begin(&event_id).await? {
            Admission::AlreadyCompleted => {
                tracing::debug!(event_id = %event_id, "duplicate delivery of completed event");
                return Ok(WebhookDisposition::AlreadyProcessed { event_id });
            }
            Admission::AlreadyFailed { attempts } => {
                tracing::warn!(
                    event_id = %event_id,
                    attempts,
                    "duplicate delivery of permanently failed event"
                );
                return Ok(WebhookDisposition::Ignored {
                    event_id,
                    reason: format!("permanently failed after {} attempts", attempts),
                });
            }
            Admission::InProgress => {
                tracing::debug!(event_id = %event_id, "concurrent delivery in progress");
                return Ok(WebhookDisposition::InProgress { event_id });
            }
            Admission::Admitted => {}
        }

        tracing::info!(event_id = %event_id, event_type = %event_type, "webhook admitted");

        // The admitted record must resolve even if the caller disconnects,
        // so the rest of the pipeline is detached from the request future.
        let idempotency = Arc::clone(&self.idempotency);
        let payments = Arc::clone(&self.payments);
        let publisher = Arc::clone(&self.publisher);
        let outbox = Arc::clone(&self.outbox);

        let task = tokio::spawn(async move {
            run_admitted(verified, idempotency, payments, publisher, outbox).await
        });

        task.await
            .map_err(|e| WebhookError::Internal(format!("pipeline task aborted: {}", e)))?
    }
}

/// Translating -> Persisting -> Publishing for an admitted event.
async fn run_admitted(
    verified: VerifiedEvent,
    idempotency: Arc<dyn IdempotencyStore>,
    payments: Arc<dyn PaymentStore>,
    publisher: Arc<dyn EventPublisher>,
    outbox: Arc<dyn OutboxWriter>,
) -> Result<WebhookDisposition, WebhookError> {
    let event_id = verified.event().id.clone();

    // Translating
    let event = match translate(&verified) {
        Ok(event) => event,
        Err(TranslationError::UnknownEventType(tag)) => {
            // Acknowledged as received so the provider does not build a
            // retry storm for types we intentionally do not act on.
            tracing::info!(event_id = %event_id, event_type = %tag, "ignoring unknown event type");
            idempotency
                .commit(&event_id, ProcessingOutcome::Completed)
                .await?;
            return Ok(WebhookDisposition::Ignored {
                event_id,
                reason: format!("unknown event type '{}'", tag),
            });
        }
        Err(TranslationError::NotActionable(reason)) => {
            tracing::info!(event_id = %event_id, %reason, "ignoring non-actionable event");
            idempotency
                .commit(&event_id, ProcessingOutcome::Completed)
                .await?;
            return Ok(WebhookDisposition::Ignored { event_id, reason });
        }
        Err(TranslationError::MalformedPayload(detail)) => {
            // Redelivery of the same payload fails identically; recorded
            // failed for operator triage and answered 400.
            tracing::error!(event_id = %event_id, %detail, "malformed webhook payload");
            idempotency
                .commit(&event_id, ProcessingOutcome::Failed)
                .await?;
            return Err(WebhookError::MalformedPayload(detail));
        }
    };

    // Persisting
    if let Err(store_err) = payments.record_payment_event(&event).await {
        tracing::error!(
            event_id = %event_id,
            error = %store_err,
            "failed to persist payment state change"
        );
        idempotency
            .commit(&event_id, ProcessingOutcome::Failed)
            .await?;
        return Err(WebhookError::Store(store_err));
    }

    // Publishing
    let disposition = publish_or_outbox(&event_id, event, publisher, outbox).await?;

    // The event is either at the broker or durably queued; either way the
    // provider must not redeliver.
    idempotency
        .commit(&event_id, ProcessingOutcome::Completed)
        .await?;

    Ok(disposition)
}

async fn publish_or_outbox(
    event_id: &str,
    event: PaymentEvent,
    publisher: Arc<dyn EventPublisher>,
    outbox: Arc<dyn OutboxWriter>,
) -> Result<WebhookDisposition, StoreError> {
    // Same-key ordering: if earlier events for this key are still queued,
    // this one queues behind them instead of overtaking at the broker.
    if outbox
        .has_unpublished_for_key(event.routing_key())
        .await?
    {
        tracing::info!(
            event_id = %event_id,
            partition_key = %event.routing_key(),
            "queueing behind undelivered events for same key"
        );
        outbox.enqueue(PublishTask::new(event)).await?;
        return Ok(WebhookDisposition::Outboxed {
            event_id: event_id.to_string(),
        });
    }

    match publisher.publish(&event).await {
        PublishAttempt::Delivered { attempts } => {
            tracing::info!(
                event_id = %event_id,
                event_type = event.event_type(),
                attempts,
                "event published"
            );
            Ok(WebhookDisposition::Published {
                event_id: event_id.to_string(),
            })
        }
        PublishAttempt::Exhausted {
            attempts,
            last_error,
        } => {
            tracing::warn!(
                event_id = %event_id,
                attempts,
                error = %last_error,
                "publish budget exhausted, handing event to outbox"
            );
            outbox
                .enqueue(PublishTask::new(event).with_last_error(last_error))
                .await?;
            Ok(WebhookDisposition::Outboxed {
                event_id: event_id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryIdempotencyStore, InMemoryOutbox, InMemoryPaymentStore,
    };
    use crate::domain::webhook::sign_payload;
    use crate::ports::ProcessingStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    const SECRET: &str = "whsec_pipeline_tests";

    /// Publisher stub that succeeds or exhausts on demand.
    struct StubPublisher {
        exhausted: bool,
        calls: AtomicU32,
    }

    impl StubPublisher {
        fn delivering() -> Self {
            Self {
                exhausted: false,
                calls: AtomicU32::new(0),
            }
        }

        fn exhausting() -> Self {
            Self {
                exhausted: true,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventPublisher for StubPublisher {
        async fn publish(&self, _event: &PaymentEvent) -> PublishAttempt {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.exhausted {
                PublishAttempt::Exhausted {
                    attempts: 3,
                    last_error: "connection refused".to_string(),
                }
            } else {
                PublishAttempt::Delivered { attempts: 1 }
            }
        }
    }

    struct Fixture {
        handler: ProcessWebhookHandler,
        idempotency: Arc<InMemoryIdempotencyStore>,
        payments: Arc<InMemoryPaymentStore>,
        publisher: Arc<StubPublisher>,
        outbox: Arc<InMemoryOutbox>,
    }

    fn fixture(publisher: StubPublisher) -> Fixture {
        let idempotency = Arc::new(InMemoryIdempotencyStore::new(3));
        let payments = Arc::new(InMemoryPaymentStore::new());
        let publisher = Arc::new(publisher);
        let outbox = Arc::new(InMemoryOutbox::new());

        let handler = ProcessWebhookHandler::new(
            Arc::new(WebhookVerifier::new(SECRET)),
            idempotency.clone(),
            payments.clone(),
            publisher.clone(),
            outbox.clone(),
        );

        Fixture {
            handler,
            idempotency,
            payments,
            publisher,
            outbox,
        }
    }

    fn signed_command(payload: &str) -> ProcessWebhookCommand {
        let timestamp = chrono::Utc::now().timestamp();
        ProcessWebhookCommand {
            payload: payload.as_bytes().to_vec(),
            signature: format!(
                "t={},v1={}",
                timestamp,
                sign_payload(SECRET, timestamp, payload.as_bytes())
            ),
        }
    }

    fn succeeded_payload(event_id: &str) -> String {
        json!({
            "id": event_id,
            "type": "payment_intent.succeeded",
            "created": chrono::Utc::now().timestamp(),
            "data": {
                "object": {
                    "id": "pi_123",
                    "amount": 1999,
                    "amount_received": 1999,
                    "currency": "usd",
                    "metadata": {"user_id": "user-42"}
                }
            },
            "livemode": false
        })
        .to_string()
    }

    // ══════════════════════════════════════════════════════════════
    // Happy Path
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn valid_webhook_publishes_exactly_one_event() {
        let fx = fixture(StubPublisher::delivering());

        let result = fx
            .handler
            .handle(signed_command(&succeeded_payload("evt_1")))
            .await
            .unwrap();

        assert_eq!(
            result,
            WebhookDisposition::Published {
                event_id: "evt_1".to_string()
            }
        );
        assert_eq!(fx.publisher.calls(), 1);
        assert_eq!(fx.payments.recorded_events().len(), 1);

        let record = fx.idempotency.find("evt_1").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn redelivery_after_completion_short_circuits() {
        let fx = fixture(StubPublisher::delivering());

        fx.handler
            .handle(signed_command(&succeeded_payload("evt_dup")))
            .await
            .unwrap();
        let second = fx
            .handler
            .handle(signed_command(&succeeded_payload("evt_dup")))
            .await
            .unwrap();

        assert_eq!(
            second,
            WebhookDisposition::AlreadyProcessed {
                event_id: "evt_dup".to_string()
            }
        );
        // No second publish, no second persistence
        assert_eq!(fx.publisher.calls(), 1);
        assert_eq!(fx.payments.recorded_events().len(), 1);
    }

    // ══════════════════════════════════════════════════════════════
    // Verification Failures
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn tampered_signature_is_rejected_without_side_effects() {
        let fx = fixture(StubPublisher::delivering());
        let payload = succeeded_payload("evt_bad_sig");
        let timestamp = chrono::Utc::now().timestamp();
        let cmd = ProcessWebhookCommand {
            payload: payload.as_bytes().to_vec(),
            signature: format!("t={},v1={}", timestamp, "ab".repeat(32)),
        };

        let result = fx.handler.handle(cmd).await;

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
        // No idempotency record, no event, no persistence
        assert!(fx.idempotency.find("evt_bad_sig").await.unwrap().is_none());
        assert_eq!(fx.publisher.calls(), 0);
        assert!(fx.payments.recorded_events().is_empty());
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected() {
        let fx = fixture(StubPublisher::delivering());
        let payload = succeeded_payload("evt_stale");
        let timestamp = chrono::Utc::now().timestamp() - 3600;
        let cmd = ProcessWebhookCommand {
            payload: payload.as_bytes().to_vec(),
            signature: format!(
                "t={},v1={}",
                timestamp,
                sign_payload(SECRET, timestamp, payload.as_bytes())
            ),
        };

        let result = fx.handler.handle(cmd).await;

        assert!(matches!(result, Err(WebhookError::StaleTimestamp)));
    }

    // ══════════════════════════════════════════════════════════════
    // Translation Outcomes
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_event_type_is_ignored_and_completed() {
        let fx = fixture(StubPublisher::delivering());
        let payload = json!({
            "id": "evt_unknown",
            "type": "customer.created",
            "created": chrono::Utc::now().timestamp(),
            "data": {"object": {}},
            "livemode": false
        })
        .to_string();

        let result = fx.handler.handle(signed_command(&payload)).await.unwrap();

        assert!(matches!(result, WebhookDisposition::Ignored { .. }));
        assert_eq!(fx.publisher.calls(), 0);

        // Never recorded as failed
        let record = fx.idempotency.find("evt_unknown").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn malformed_payload_commits_failed_and_errors() {
        let fx = fixture(StubPublisher::delivering());
        let payload = json!({
            "id": "evt_malformed",
            "type": "payment_intent.succeeded",
            "created": chrono::Utc::now().timestamp(),
            "data": {"object": {"id": "pi_1", "currency": "usd"}},
            "livemode": false
        })
        .to_string();

        let result = fx.handler.handle(signed_command(&payload)).await;

        assert!(matches!(result, Err(WebhookError::MalformedPayload(_))));
        let record = fx.idempotency.find("evt_malformed").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Failed);
        assert_eq!(fx.publisher.calls(), 0);
    }

    // ══════════════════════════════════════════════════════════════
    // Publish Exhaustion
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn exhausted_publish_outboxes_and_still_completes() {
        let fx = fixture(StubPublisher::exhausting());

        let result = fx
            .handler
            .handle(signed_command(&succeeded_payload("evt_outboxed")))
            .await
            .unwrap();

        assert_eq!(
            result,
            WebhookDisposition::Outboxed {
                event_id: "evt_outboxed".to_string()
            }
        );

        // Event is durably queued, never lost
        let queued = fx.outbox.get_unpublished(10).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].event.transaction_ref(), "pi_123");
        assert_eq!(queued[0].last_error.as_deref(), Some("connection refused"));

        // Provider must not redeliver: record is completed
        let record = fx.idempotency.find("evt_outboxed").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn same_key_event_queues_behind_outboxed_predecessor() {
        let fx = fixture(StubPublisher::delivering());

        // An earlier event for pi_123 is stuck in the outbox
        fx.outbox
            .enqueue(PublishTask::new(crate::domain::payment::test_event("pi_123")))
            .await
            .unwrap();

        let result = fx
            .handler
            .handle(signed_command(&succeeded_payload("evt_ordered")))
            .await
            .unwrap();

        // Even though the broker is healthy, the event queues to keep order
        assert!(matches!(result, WebhookDisposition::Outboxed { .. }));
        assert_eq!(fx.publisher.calls(), 0);
        assert_eq!(fx.outbox.get_unpublished(10).await.unwrap().len(), 2);
    }

    // ══════════════════════════════════════════════════════════════
    // Concurrency
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn concurrent_redeliveries_admit_exactly_one() {
        let fx = fixture(StubPublisher::delivering());
        let idempotency = fx.idempotency.clone();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = idempotency.clone();
            handles.push(tokio::spawn(
                async move { store.begin("evt_race").await },
            ));
        }

        let mut admitted = 0;
        for handle in handles {
            if matches!(handle.await.unwrap().unwrap(), Admission::Admitted) {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
    }
}

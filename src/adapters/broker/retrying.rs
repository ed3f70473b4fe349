//! RetryingPublisher - the synchronous publish portion of the pipeline.
//!
//! Wraps a raw `BrokerPublisher` with the in-pipeline retry budget: bounded
//! attempts, exponential backoff with jitter, and a hard overall deadline so
//! the webhook response is never held hostage by a slow broker. Exhaustion
//! is an outcome, not an error; the orchestrator routes it to the outbox.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::payment::PaymentEvent;
use crate::ports::{BrokerPublisher, EventPublisher, PublishAttempt};

use super::RetryPolicy;

/// Publisher with bounded synchronous retry.
pub struct RetryingPublisher {
    broker: Arc<dyn BrokerPublisher>,
    topic: String,
    policy: RetryPolicy,
    deadline: Duration,
}

impl RetryingPublisher {
    pub fn new(
        broker: Arc<dyn BrokerPublisher>,
        topic: impl Into<String>,
        policy: RetryPolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            broker,
            topic: topic.into(),
            policy,
            deadline,
        }
    }
}

#[async_trait]
impl EventPublisher for RetryingPublisher {
    async fn publish(&self, event: &PaymentEvent) -> PublishAttempt {
        let payload = serde_json::to_vec(event)
            .expect("PaymentEvent serialization never fails for well-formed events");
        let key = event.routing_key();
        let started = Instant::now();

        let mut attempts = 0;
        let mut last_error;

        loop {
            attempts += 1;

            let remaining = self.deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return PublishAttempt::Exhausted {
                    attempts: attempts - 1,
                    last_error: "publish deadline elapsed".to_string(),
                };
            }

            let send = self.broker.send(&self.topic, key, &payload);
            match tokio::time::timeout(remaining, send).await {
                Ok(Ok(())) => return PublishAttempt::Delivered { attempts },
                Ok(Err(broker_err)) => {
                    if !broker_err.is_transient() {
                        // Fatal rejection: retrying the same bytes cannot
                        // help, hand it to the outbox for operator review.
                        return PublishAttempt::Exhausted {
                            attempts,
                            last_error: broker_err.to_string(),
                        };
                    }
                    last_error = broker_err.to_string();
                }
                Err(_) => {
                    return PublishAttempt::Exhausted {
                        attempts,
                        last_error: "publish deadline elapsed".to_string(),
                    };
                }
            }

            if !self.policy.allows_retry(attempts) {
                return PublishAttempt::Exhausted {
                    attempts,
                    last_error,
                };
            }

            let backoff = self
                .policy
                .backoff_delay(attempts)
                .min(self.deadline.saturating_sub(started.elapsed()));
            tracing::debug!(
                key,
                attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %last_error,
                "transient broker failure, backing off"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::broker::InMemoryBroker;
    use crate::domain::payment::test_event;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5), max_attempts)
    }

    #[tokio::test]
    async fn delivers_on_first_attempt() {
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = RetryingPublisher::new(
            broker.clone(),
            "payment_events",
            fast_policy(3),
            Duration::from_secs(5),
        );

        let outcome = publisher.publish(&test_event("pi_1")).await;

        assert_eq!(outcome, PublishAttempt::Delivered { attempts: 1 });
        assert_eq!(broker.message_count(), 1);
        assert_eq!(broker.messages_for_key("pi_1").len(), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_then_delivers() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.fail_next(2);
        let publisher = RetryingPublisher::new(
            broker.clone(),
            "payment_events",
            fast_policy(3),
            Duration::from_secs(5),
        );

        let outcome = publisher.publish(&test_event("pi_1")).await;

        assert_eq!(outcome, PublishAttempt::Delivered { attempts: 3 });
        assert_eq!(broker.message_count(), 1);
    }

    #[tokio::test]
    async fn exhausts_after_retry_budget() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.fail_next(10);
        let publisher = RetryingPublisher::new(
            broker.clone(),
            "payment_events",
            fast_policy(3),
            Duration::from_secs(5),
        );

        let outcome = publisher.publish(&test_event("pi_1")).await;

        match outcome {
            PublishAttempt::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("connection"));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(broker.message_count(), 0);
    }

    #[tokio::test]
    async fn serialized_payload_reaches_broker_intact() {
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = RetryingPublisher::new(
            broker.clone(),
            "payment_events",
            fast_policy(3),
            Duration::from_secs(5),
        );

        publisher.publish(&test_event("pi_roundtrip")).await;

        let delivered = broker.messages_for_key("pi_roundtrip");
        let restored: PaymentEvent = serde_json::from_slice(&delivered[0]).unwrap();
        assert_eq!(restored.amount().value(), 1999);
        assert_eq!(restored.currency().as_str(), "USD");
    }
}

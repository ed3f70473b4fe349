//! OutboxRelay - background drain of the durable publish outbox.
//!
//! Second half of the delivery guarantee: events the synchronous path could
//! not deliver are polled from the outbox and retried here until the broker
//! accepts them or the retry budget dead-letters them.
//!
//! ## Ordering
//!
//! Tasks are fetched in creation order and at most one task per partition
//! key is attempted per cycle; a key whose head task fails (or is not yet
//! due) blocks its later tasks for that cycle. Same-key events therefore
//! reach the broker in the order their webhooks were admitted.
//!
//! ## Graceful Shutdown
//!
//! The relay listens on a watch channel and finishes the current batch
//! before stopping.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::{StoreError, Timestamp};
use crate::ports::{BrokerPublisher, OutboxWriter};

use super::RetryPolicy;

/// Configuration for the OutboxRelay service.
#[derive(Debug, Clone)]
pub struct OutboxRelayConfig {
    /// How often to poll for unpublished tasks.
    pub poll_interval: Duration,

    /// Maximum tasks fetched per poll cycle.
    pub batch_size: u32,

    /// Delivery attempts before a task is dead-lettered.
    pub max_attempts: u32,

    /// Backoff schedule for failed tasks.
    pub retry_policy: RetryPolicy,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            batch_size: 100,
            max_attempts: 10,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl OutboxRelayConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// Background service that delivers outboxed events to the broker.
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxWriter>,
    broker: Arc<dyn BrokerPublisher>,
    topic: String,
    config: OutboxRelayConfig,
}

impl OutboxRelay {
    pub fn new(
        outbox: Arc<dyn OutboxWriter>,
        broker: Arc<dyn BrokerPublisher>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            outbox,
            broker,
            topic: topic.into(),
            config: OutboxRelayConfig::default(),
        }
    }

    pub fn with_config(
        outbox: Arc<dyn OutboxWriter>,
        broker: Arc<dyn BrokerPublisher>,
        topic: impl Into<String>,
        config: OutboxRelayConfig,
    ) -> Self {
        Self {
            outbox,
            broker,
            topic: topic.into(),
            config,
        }
    }

    /// Runs the relay loop until the shutdown signal flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StoreError> {
        let mut interval = time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        // Finish the in-flight batch, then stop.
                        self.process_batch().await?;
                        tracing::info!("outbox relay stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    self.process_batch().await?;
                }
            }
        }
    }

    /// Processes one batch of unpublished tasks. Returns the number of tasks
    /// delivered to the broker.
    pub async fn process_batch(&self) -> Result<usize, StoreError> {
        let tasks = self.outbox.get_unpublished(self.config.batch_size).await?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let now = Timestamp::now();
        let mut blocked_keys: HashSet<String> = HashSet::new();
        let mut delivered = 0;

        for task in tasks {
            // One in-flight task per key per cycle; later same-key tasks
            // wait behind their head task.
            if blocked_keys.contains(&task.partition_key) {
                continue;
            }
            blocked_keys.insert(task.partition_key.clone());

            if task.next_attempt_at.is_after(&now) {
                continue;
            }

            let payload = serde_json::to_vec(&task.event)
                .expect("PaymentEvent serialization never fails for well-formed events");

            match self
                .broker
                .send(&self.topic, &task.partition_key, &payload)
                .await
            {
                Ok(()) => {
                    self.outbox.mark_published(task.id).await?;
                    delivered += 1;
                    tracing::info!(
                        task_id = %task.id,
                        partition_key = %task.partition_key,
                        attempts = task.attempts + 1,
                        "outboxed event delivered"
                    );
                }
                Err(broker_err) => {
                    let failed_attempts = task.attempts + 1;
                    if failed_attempts >= self.config.max_attempts {
                        tracing::error!(
                            task_id = %task.id,
                            partition_key = %task.partition_key,
                            attempts = failed_attempts,
                            error = %broker_err,
                            "outbox task dead-lettered"
                        );
                        self.outbox
                            .mark_dead_letter(task.id, &broker_err.to_string())
                            .await?;
                    } else {
                        let backoff = self.config.retry_policy.backoff_delay(failed_attempts);
                        let next_attempt_at =
                            Timestamp::now().plus_millis(backoff.as_millis() as i64);
                        tracing::warn!(
                            task_id = %task.id,
                            partition_key = %task.partition_key,
                            attempts = failed_attempts,
                            error = %broker_err,
                            "outbox delivery failed, rescheduled"
                        );
                        self.outbox
                            .mark_failed(task.id, &broker_err.to_string(), next_attempt_at)
                            .await?;
                    }
                }
            }
        }

        Ok(delivered)
    }

    /// Runs exactly one poll cycle (for testing).
    pub async fn poll_once(&self) -> Result<usize, StoreError> {
        self.process_batch().await
    }
}

//! OutboxWriter port - durable outbox for undeliverable events.
//!
//! A verified, translated event must never be lost, even when the broker is
//! momentarily unreachable. Events that exhaust the in-pipeline retry budget
//! are handed to this outbox; a background relay drains it. Tasks that
//! exhaust the relay's retry budget become dead letters, parked for operator
//! handling rather than discarded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{StoreError, Timestamp};
use crate::domain::payment::PaymentEvent;

/// Delivery state of an outbox task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishTaskStatus {
    /// Waiting for its first relay attempt.
    Pending,
    /// Delivered to the broker.
    Published,
    /// A relay attempt failed; rescheduled for `next_attempt_at`.
    Failed,
    /// Retry budget exhausted; parked for operator handling.
    DeadLetter,
}

impl PublishTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishTaskStatus::Pending => "pending",
            PublishTaskStatus::Published => "published",
            PublishTaskStatus::Failed => "failed",
            PublishTaskStatus::DeadLetter => "dead_letter",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(PublishTaskStatus::Pending),
            "published" => Ok(PublishTaskStatus::Published),
            "failed" => Ok(PublishTaskStatus::Failed),
            "dead_letter" => Ok(PublishTaskStatus::DeadLetter),
            other => Err(StoreError::corrupt(format!(
                "invalid publish task status '{}'",
                other
            ))),
        }
    }
}

/// A domain event plus its delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishTask {
    /// Unique identifier for this task.
    pub id: Uuid,

    /// The domain event awaiting delivery.
    pub event: PaymentEvent,

    /// Broker partition key (the event's transaction reference).
    pub partition_key: String,

    /// Current delivery state.
    pub status: PublishTaskStatus,

    /// When the task was written to the outbox. Relay order is creation
    /// order within a partition key.
    pub created_at: Timestamp,

    /// Earliest time the relay may attempt (or re-attempt) delivery.
    pub next_attempt_at: Timestamp,

    /// Number of relay attempts so far.
    pub attempts: u32,

    /// Last delivery error, if any.
    pub last_error: Option<String>,
}

impl PublishTask {
    /// Creates a pending task for an event, due immediately.
    pub fn new(event: PaymentEvent) -> Self {
        let now = Timestamp::now();
        let partition_key = event.routing_key().to_string();
        Self {
            id: Uuid::new_v4(),
            event,
            partition_key,
            status: PublishTaskStatus::Pending,
            created_at: now,
            next_attempt_at: now,
            attempts: 0,
            last_error: None,
        }
    }

    /// Records the first delivery failure context at enqueue time.
    pub fn with_last_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }

    /// True if the task is still awaiting delivery.
    pub fn is_unpublished(&self) -> bool {
        matches!(
            self.status,
            PublishTaskStatus::Pending | PublishTaskStatus::Failed
        )
    }
}

/// Port for the durable publish outbox.
#[async_trait]
pub trait OutboxWriter: Send + Sync {
    /// Persists a task for asynchronous delivery.
    async fn enqueue(&self, task: PublishTask) -> Result<(), StoreError>;

    /// Returns unpublished tasks (pending or failed) ordered by creation
    /// time, oldest first. Includes tasks that are not yet due so the relay
    /// can keep per-key ordering.
    async fn get_unpublished(&self, limit: u32) -> Result<Vec<PublishTask>, StoreError>;

    /// True if any unpublished task exists for the partition key.
    ///
    /// The synchronous publish path checks this before bypassing the outbox:
    /// an event must queue behind earlier undelivered events for its key.
    async fn has_unpublished_for_key(&self, partition_key: &str) -> Result<bool, StoreError>;

    /// Marks a task as delivered.
    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError>;

    /// Marks a task as failed and schedules the next attempt.
    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Parks a task as a dead letter.
    async fn mark_dead_letter(&self, id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Returns dead-lettered tasks for operator inspection, newest first.
    async fn dead_letters(&self, limit: u32) -> Result<Vec<PublishTask>, StoreError>;

    /// Deletes published tasks created before the cutoff. Returns the number
    /// of tasks removed.
    async fn cleanup_published(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::test_event;

    #[test]
    fn new_task_is_pending_and_due_immediately() {
        let task = PublishTask::new(test_event("pi_1"));

        assert_eq!(task.status, PublishTaskStatus::Pending);
        assert_eq!(task.partition_key, "pi_1");
        assert_eq!(task.attempts, 0);
        assert!(task.is_unpublished());
        assert!(!task.next_attempt_at.is_after(&Timestamp::now()));
    }

    #[test]
    fn with_last_error_records_context() {
        let task = PublishTask::new(test_event("pi_2")).with_last_error("broker timeout");

        assert_eq!(task.last_error.as_deref(), Some("broker timeout"));
    }

    #[test]
    fn published_and_dead_letter_are_not_unpublished() {
        let mut task = PublishTask::new(test_event("pi_3"));
        task.status = PublishTaskStatus::Published;
        assert!(!task.is_unpublished());

        task.status = PublishTaskStatus::DeadLetter;
        assert!(!task.is_unpublished());
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            PublishTaskStatus::Pending,
            PublishTaskStatus::Published,
            PublishTaskStatus::Failed,
            PublishTaskStatus::DeadLetter,
        ] {
            assert_eq!(PublishTaskStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}

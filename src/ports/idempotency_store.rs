//! IdempotencyStore port - durable deduplication of provider event ids.
//!
//! Providers deliver the same webhook more than once: network timeouts, 5xx
//! responses from our endpoint, or a success response they never received all
//! trigger redelivery. This port is the admission gate that makes the
//! pipeline process each provider event id at most once.
//!
//! ## Admission Contract
//!
//! `begin` is a compare-and-set style check: exactly one caller is granted
//! `Admitted` for an id while no terminal outcome is recorded; every
//! concurrent or later caller observes `InProgress` or a terminal state.
//! Implementations enforce this with a unique-constraint insert (Postgres)
//! or a single-lock map update (in-memory).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StoreError, Timestamp};

/// Processing state of a provider event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Admitted but no terminal outcome recorded yet.
    Pending,
    /// Processed successfully (includes acknowledged-and-ignored events).
    Completed,
    /// Processing failed; may be re-admitted up to the configured cap.
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(StoreError::corrupt(format!(
                "invalid processing status '{}'",
                other
            ))),
        }
    }
}

/// Durable record of one provider event id.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    /// Provider-assigned event id (evt_xxx format).
    pub event_id: String,

    /// Current processing state.
    pub status: ProcessingStatus,

    /// Monotonic count of admissions for this id.
    pub attempts: u32,

    /// When the id was last admitted or committed.
    pub last_attempt_at: Timestamp,
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Caller holds the exclusive right to process this event id.
    Admitted,

    /// A terminal success was already recorded; short-circuit with the
    /// original success response and do not reprocess.
    AlreadyCompleted,

    /// The reprocessing cap for a failed record is exhausted; the record is
    /// a permanent failure visible to operators.
    AlreadyFailed { attempts: u32 },

    /// Another caller was admitted and has not committed yet. Do not
    /// proceed; the provider should retry later.
    InProgress,
}

/// Terminal outcome recorded by `commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    Completed,
    Failed,
}

impl ProcessingOutcome {
    pub fn as_status(&self) -> ProcessingStatus {
        match self {
            ProcessingOutcome::Completed => ProcessingStatus::Completed,
            ProcessingOutcome::Failed => ProcessingStatus::Failed,
        }
    }
}

/// Port for the durable idempotency store.
///
/// Records are never deleted inside the retention window; `delete_before` is
/// the retention sweep and must only be called with a cutoff older than the
/// provider's maximum redelivery window.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Attempts to admit the given event id for processing.
    ///
    /// A `failed` record re-admits (incrementing the attempt counter) until
    /// the implementation's configured reprocessing cap, after which
    /// `AlreadyFailed` is returned.
    async fn begin(&self, event_id: &str) -> Result<Admission, StoreError>;

    /// Records the terminal outcome for an admitted event id.
    async fn commit(
        &self,
        event_id: &str,
        outcome: ProcessingOutcome,
    ) -> Result<(), StoreError>;

    /// Looks up the record for an event id, if any.
    async fn find(&self, event_id: &str) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Deletes records last touched before the cutoff. Returns the number of
    /// records removed.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(ProcessingStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn status_parse_rejects_garbage() {
        assert!(ProcessingStatus::parse("done").is_err());
    }

    #[test]
    fn outcome_maps_to_terminal_status() {
        assert_eq!(
            ProcessingOutcome::Completed.as_status(),
            ProcessingStatus::Completed
        );
        assert_eq!(
            ProcessingOutcome::Failed.as_status(),
            ProcessingStatus::Failed
        );
    }
}

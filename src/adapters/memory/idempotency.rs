//! In-memory implementation of the IdempotencyStore port.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::{StoreError, Timestamp};
use crate::ports::{
    Admission, IdempotencyRecord, IdempotencyStore, ProcessingOutcome, ProcessingStatus,
};

/// In-memory idempotency store.
///
/// All state transitions happen under a single lock, which gives the same
/// atomicity the Postgres adapter gets from its unique constraint.
pub struct InMemoryIdempotencyStore {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
    max_failed_attempts: u32,
}

impl InMemoryIdempotencyStore {
    /// Creates a store with the given reprocessing cap for failed records.
    pub fn new(max_failed_attempts: u32) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            max_failed_attempts,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, IdempotencyRecord>> {
        self.records
            .lock()
            .expect("InMemoryIdempotencyStore: lock poisoned")
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(&self, event_id: &str) -> Result<Admission, StoreError> {
        let mut records = self.lock();

        match records.get_mut(event_id) {
            None => {
                records.insert(
                    event_id.to_string(),
                    IdempotencyRecord {
                        event_id: event_id.to_string(),
                        status: ProcessingStatus::Pending,
                        attempts: 1,
                        last_attempt_at: Timestamp::now(),
                    },
                );
                Ok(Admission::Admitted)
            }
            Some(record) => match record.status {
                ProcessingStatus::Pending => Ok(Admission::InProgress),
                ProcessingStatus::Completed => Ok(Admission::AlreadyCompleted),
                ProcessingStatus::Failed => {
                    if record.attempts < self.max_failed_attempts {
                        record.status = ProcessingStatus::Pending;
                        record.attempts += 1;
                        record.last_attempt_at = Timestamp::now();
                        Ok(Admission::Admitted)
                    } else {
                        Ok(Admission::AlreadyFailed {
                            attempts: record.attempts,
                        })
                    }
                }
            },
        }
    }

    async fn commit(
        &self,
        event_id: &str,
        outcome: ProcessingOutcome,
    ) -> Result<(), StoreError> {
        let mut records = self.lock();
        let record = records.get_mut(event_id).ok_or_else(|| {
            StoreError::corrupt(format!("commit for unknown event id '{}'", event_id))
        })?;

        record.status = outcome.as_status();
        record.last_attempt_at = Timestamp::now();
        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(self.lock().get(event_id).cloned())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, r| !r.last_attempt_at.is_before(&cutoff));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_begin_is_admitted() {
        let store = InMemoryIdempotencyStore::new(3);

        let admission = store.begin("evt_1").await.unwrap();

        assert_eq!(admission, Admission::Admitted);
        let record = store.find("evt_1").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Pending);
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn second_begin_before_commit_is_in_progress() {
        let store = InMemoryIdempotencyStore::new(3);

        store.begin("evt_1").await.unwrap();
        let second = store.begin("evt_1").await.unwrap();

        assert_eq!(second, Admission::InProgress);
    }

    #[tokio::test]
    async fn begin_after_completed_commit_short_circuits() {
        let store = InMemoryIdempotencyStore::new(3);

        store.begin("evt_1").await.unwrap();
        store
            .commit("evt_1", ProcessingOutcome::Completed)
            .await
            .unwrap();

        let admission = store.begin("evt_1").await.unwrap();
        assert_eq!(admission, Admission::AlreadyCompleted);
    }

    #[tokio::test]
    async fn failed_record_readmits_until_cap() {
        let store = InMemoryIdempotencyStore::new(3);

        // Attempt 1 fails
        store.begin("evt_1").await.unwrap();
        store.commit("evt_1", ProcessingOutcome::Failed).await.unwrap();

        // Attempts 2 and 3 re-admit
        assert_eq!(store.begin("evt_1").await.unwrap(), Admission::Admitted);
        store.commit("evt_1", ProcessingOutcome::Failed).await.unwrap();
        assert_eq!(store.begin("evt_1").await.unwrap(), Admission::Admitted);
        store.commit("evt_1", ProcessingOutcome::Failed).await.unwrap();

        // Cap reached: permanent failure
        assert_eq!(
            store.begin("evt_1").await.unwrap(),
            Admission::AlreadyFailed { attempts: 3 }
        );
    }

    #[tokio::test]
    async fn commit_for_unknown_id_is_an_error() {
        let store = InMemoryIdempotencyStore::new(3);

        let result = store.commit("evt_ghost", ProcessingOutcome::Completed).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_before_respects_cutoff() {
        let store = InMemoryIdempotencyStore::new(3);
        store.begin("evt_old").await.unwrap();

        // Nothing older than a cutoff in the past
        let deleted = store
            .delete_before(Timestamp::now().minus_days(30))
            .await
            .unwrap();
        assert_eq!(deleted, 0);

        // Everything older than a cutoff in the future
        let deleted = store
            .delete_before(Timestamp::now().plus_secs(60))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.find("evt_old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_begins_admit_exactly_one() {
        let store = std::sync::Arc::new(InMemoryIdempotencyStore::new(3));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.begin("evt_race").await }));
        }

        let mut admitted = 0;
        let mut in_progress = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Admission::Admitted => admitted += 1,
                Admission::InProgress => in_progress += 1,
                other => panic!("unexpected admission: {:?}", other),
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(in_progress, 15);
    }
}

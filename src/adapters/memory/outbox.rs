//! In-memory implementation of the OutboxWriter port.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::foundation::{StoreError, Timestamp};
use crate::ports::{OutboxWriter, PublishTask, PublishTaskStatus};

/// In-memory publish outbox.
///
/// Tasks are kept in enqueue order, which is also creation order.
pub struct InMemoryOutbox {
    tasks: Mutex<Vec<PublishTask>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PublishTask>> {
        self.tasks.lock().expect("InMemoryOutbox: lock poisoned")
    }

    /// Number of tasks delivered so far (test helper).
    pub fn published_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|t| t.status == PublishTaskStatus::Published)
            .count()
    }

    fn update<F>(&self, id: Uuid, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut PublishTask),
    {
        let mut tasks = self.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::corrupt(format!("unknown outbox task {}", id)))?;
        apply(task);
        Ok(())
    }
}

impl Default for InMemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboxWriter for InMemoryOutbox {
    async fn enqueue(&self, task: PublishTask) -> Result<(), StoreError> {
        self.lock().push(task);
        Ok(())
    }

    async fn get_unpublished(&self, limit: u32) -> Result<Vec<PublishTask>, StoreError> {
        Ok(self
            .lock()
            .iter()
            .filter(|t| t.is_unpublished())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn has_unpublished_for_key(&self, partition_key: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .iter()
            .any(|t| t.is_unpublished() && t.partition_key == partition_key))
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(id, |task| {
            task.status = PublishTaskStatus::Published;
            task.attempts += 1;
            task.last_error = None;
        })
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), StoreError> {
        self.update(id, |task| {
            task.status = PublishTaskStatus::Failed;
            task.attempts += 1;
            task.last_error = Some(error.to_string());
            task.next_attempt_at = next_attempt_at;
        })
    }

    async fn mark_dead_letter(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        self.update(id, |task| {
            task.status = PublishTaskStatus::DeadLetter;
            task.attempts += 1;
            task.last_error = Some(error.to_string());
        })
    }

    async fn dead_letters(&self, limit: u32) -> Result<Vec<PublishTask>, StoreError> {
        let mut parked: Vec<_> = self
            .lock()
            .iter()
            .filter(|t| t.status == PublishTaskStatus::DeadLetter)
            .cloned()
            .collect();
        parked.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        parked.truncate(limit as usize);
        Ok(parked)
    }

    async fn cleanup_published(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut tasks = self.lock();
        let before = tasks.len();
        tasks.retain(|t| {
            t.status != PublishTaskStatus::Published || !t.created_at.is_before(&cutoff)
        });
        Ok((before - tasks.len()) as u64)
    }
}

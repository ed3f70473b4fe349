//! In-memory broker implementation for testing.
//!
//! Records every acknowledged send and supports failure injection. Not for
//! production use.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::ports::{BrokerError, BrokerPublisher};

/// One record accepted by the broker.
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// In-memory broker for tests.
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned; acceptable for test
/// code only.
pub struct InMemoryBroker {
    messages: RwLock<Vec<RecordedMessage>>,
    fail_next: AtomicU32,
    fail_error: Mutex<Option<BrokerError>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            fail_next: AtomicU32::new(0),
            fail_error: Mutex::new(None),
        }
    }

    /// Makes the next `n` sends fail with a transient connection error.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` sends fail with the given error.
    pub fn fail_next_with(&self, n: u32, error: BrokerError) {
        self.fail_next.store(n, Ordering::SeqCst);
        *self
            .fail_error
            .lock()
            .expect("InMemoryBroker: fail_error lock poisoned") = Some(error);
    }

    /// All acknowledged records (test assertion helper).
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.messages
            .read()
            .expect("InMemoryBroker: messages lock poisoned")
            .clone()
    }

    /// Number of acknowledged records.
    pub fn message_count(&self) -> usize {
        self.messages
            .read()
            .expect("InMemoryBroker: messages lock poisoned")
            .len()
    }

    /// Payloads acknowledged for a given key, in send order.
    pub fn messages_for_key(&self, key: &str) -> Vec<Vec<u8>> {
        self.messages
            .read()
            .expect("InMemoryBroker: messages lock poisoned")
            .iter()
            .filter(|m| m.key == key)
            .map(|m| m.payload.clone())
            .collect()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerPublisher for InMemoryBroker {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            let error = self
                .fail_error
                .lock()
                .expect("InMemoryBroker: fail_error lock poisoned")
                .clone()
                .unwrap_or_else(|| BrokerError::Connection("connection refused".to_string()));
            return Err(error);
        }

        self.messages
            .write()
            .expect("InMemoryBroker: messages lock poisoned")
            .push(RecordedMessage {
                topic: topic.to_string(),
                key: key.to_string(),
                payload: payload.to_vec(),
            });
        Ok(())
    }
}

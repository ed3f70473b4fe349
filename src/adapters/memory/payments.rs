//! In-memory implementation of the PaymentStore port.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::StoreError;
use crate::domain::payment::PaymentEvent;
use crate::ports::PaymentStore;

/// In-memory payment record store.
///
/// Records every event it is asked to persist and can be told to fail the
/// next N calls to exercise the pipeline's failure paths.
pub struct InMemoryPaymentStore {
    events: Mutex<Vec<PaymentEvent>>,
    fail_next: AtomicU32,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_next: AtomicU32::new(0),
        }
    }

    /// Makes the next `n` calls fail with a database error (test helper).
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Events persisted so far (test helper).
    pub fn recorded_events(&self) -> Vec<PaymentEvent> {
        self.events
            .lock()
            .expect("InMemoryPaymentStore: lock poisoned")
            .clone()
    }
}

impl Default for InMemoryPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn record_payment_event(&self, event: &PaymentEvent) -> Result<(), StoreError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::database("simulated database failure"));
        }

        self.events
            .lock()
            .expect("InMemoryPaymentStore: lock poisoned")
            .push(event.clone());
        Ok(())
    }
}

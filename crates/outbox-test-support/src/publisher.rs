//! Test publishers: `Publisher` implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use outbox_core::error::PublishError;
use outbox_core::publisher::{OutboundMessage, Publisher};

/// A publisher that records every acknowledged batch. It can be told to
/// fail its first few calls and to take a while per call.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    batches: Mutex<Vec<Vec<OutboundMessage>>>,
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl RecordingPublisher {
    /// A publisher that acknowledges every batch immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose first `n` calls fail.
    #[must_use]
    pub fn failing_first(n: usize) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    /// Sleeps for `delay` inside every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the acknowledged batches, in publish order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn batches(&self) -> Vec<Vec<OutboundMessage>> {
        self.batches.lock().unwrap().clone()
    }

    /// Returns every acknowledged message, flattened in publish order.
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.batches().into_iter().flatten().collect()
    }

    /// Returns how many times `publish` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, batch: &[OutboundMessage]) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(PublishError::new("broker unavailable"));
        }
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

/// A publisher that rejects every batch.
#[derive(Debug, Default)]
pub struct FailingPublisher {
    calls: AtomicUsize,
}

impl FailingPublisher {
    /// Returns how many times `publish` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _batch: &[OutboundMessage]) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PublishError::new("broker rejected batch"))
    }
}

/// A publisher whose calls never return, like a hung bus connection.
#[derive(Debug, Default)]
pub struct StalledPublisher;

#[async_trait]
impl Publisher for StalledPublisher {
    async fn publish(&self, _batch: &[OutboundMessage]) -> Result<(), PublishError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

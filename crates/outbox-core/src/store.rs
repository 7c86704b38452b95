//! Claim protocol between the relay and an outbox store.
//!
//! A claim is a lease over a set of pending rows, scoped to one store
//! transaction. While a [`ClaimedBatch`] is alive no other claim can see its
//! rows. Dropping it without calling [`ClaimedBatch::complete`] rolls the
//! transaction back and makes the rows claimable again.
//!
//! Rollback on drop is eventual: a store may finish it in the background, so
//! a claim issued right after the drop can still skip the rows. Call
//! [`ClaimedBatch::release`] when the rows must be claimable on return.

use async_trait::async_trait;

use crate::entry::OutboxEntry;
use crate::error::DomainError;

/// What happened to a claimed batch on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Every message was acknowledged. Entries become terminal with
    /// `error = false`.
    Delivered,
    /// The publish call failed. Each entry's attempt counter is incremented;
    /// entries reaching `max_attempts` become terminal with `error = true`,
    /// the rest stay pending.
    Failed {
        /// Failure reason recorded on every entry.
        reason: String,
        /// Attempts allowed before an entry is dead-lettered. `1` marks the
        /// whole batch failed immediately.
        max_attempts: u32,
    },
}

/// Result of recording a disposition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionReport {
    /// Entries marked delivered.
    pub delivered: usize,
    /// Entries left pending for another attempt.
    pub retried: usize,
    /// Entries marked terminal with `error = true`.
    pub dead_lettered: usize,
}

/// A transaction-scoped claim over pending entries.
#[async_trait]
pub trait ClaimedBatch: Send {
    /// The claimed entries, in `created_at` then `id` order.
    fn entries(&self) -> &[OutboxEntry];

    /// Records the disposition for every claimed entry in one multi-row
    /// statement and commits the claim transaction.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the update or commit fails.
    /// A failed update is rolled back before this returns.
    async fn complete(
        self: Box<Self>,
        disposition: &Disposition,
    ) -> Result<CompletionReport, DomainError>;

    /// Rolls the claim back without touching any entry. The rows are
    /// claimable again once this returns.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the rollback fails.
    async fn release(self: Box<Self>) -> Result<(), DomainError>;
}

/// Store side of the relay: hands out claims.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Opens a transaction and claims up to `limit` pending entries, skipping
    /// rows held by other in-flight claims.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the transaction cannot be
    /// opened or the claim query fails.
    async fn claim_batch(&self, limit: usize) -> Result<Box<dyn ClaimedBatch>, DomainError>;
}

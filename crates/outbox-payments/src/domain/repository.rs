//! Payment persistence abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_core::entry::NewOutboxEntry;
use outbox_core::error::DomainError;

use super::payment::{NewPayment, Payment, PaymentStatus};

/// Builds the outbox entry for a post-mutation payment. Runs inside the
/// mutation's transaction; an `Err` aborts the whole write.
pub type OutboxEncoder<'a> =
    dyn Fn(&Payment) -> Result<NewOutboxEntry, DomainError> + Send + Sync + 'a;

/// Repository that writes payment mutations and their outbox entries as one
/// unit.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts `payment` and the entry produced by `encode`, atomically.
    ///
    /// # Errors
    ///
    /// Returns whatever `encode` returns, or `DomainError::Infrastructure`
    /// if the store fails. Nothing is persisted on error.
    async fn insert_with_event(
        &self,
        payment: &NewPayment,
        encode: &OutboxEncoder<'_>,
    ) -> Result<Payment, DomainError>;

    /// Sets the status of payment `id` and appends the entry produced by
    /// `encode`, atomically.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the payment does not exist, what
    /// `encode` returns, or `DomainError::Infrastructure`. Nothing is
    /// persisted on error.
    async fn update_status_with_event(
        &self,
        id: i64,
        status: PaymentStatus,
        updated_at: DateTime<Utc>,
        encode: &OutboxEncoder<'_>,
    ) -> Result<Payment, DomainError>;

    /// Loads a payment by id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store fails.
    async fn find(&self, id: i64) -> Result<Option<Payment>, DomainError>;
}

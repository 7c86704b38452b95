//! Test repositories: `PaymentRepository` implementations for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_core::error::DomainError;
use outbox_payments::domain::payment::{NewPayment, Payment, PaymentStatus};
use outbox_payments::domain::repository::{OutboxEncoder, PaymentRepository};

use crate::outbox::InMemoryOutboxStore;

/// A payment repository that keeps payments in a map and appends their
/// outbox entries to an `InMemoryOutboxStore`. An encoder failure leaves both
/// untouched.
#[derive(Debug)]
pub struct InMemoryPaymentRepository {
    payments: Mutex<BTreeMap<i64, Payment>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryPaymentRepository {
    /// Creates an empty repository writing entries to `outbox`.
    #[must_use]
    pub fn new(outbox: InMemoryOutboxStore) -> Self {
        Self {
            payments: Mutex::new(BTreeMap::new()),
            outbox,
        }
    }

    /// Returns a snapshot of every stored payment, ordered by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn payments(&self) -> Vec<Payment> {
        self.payments.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert_with_event(
        &self,
        payment: &NewPayment,
        encode: &OutboxEncoder<'_>,
    ) -> Result<Payment, DomainError> {
        let mut payments = self.payments.lock().unwrap();
        let id = payments.keys().next_back().map_or(1, |last| last + 1);
        let created = Payment {
            id,
            user_id: payment.user_id,
            amount: payment.amount,
            status: payment.status,
            created_at: payment.created_at,
            updated_at: payment.created_at,
        };

        let entry = encode(&created)?;
        payments.insert(id, created.clone());
        self.outbox.append(entry);
        Ok(created)
    }

    async fn update_status_with_event(
        &self,
        id: i64,
        status: PaymentStatus,
        updated_at: DateTime<Utc>,
        encode: &OutboxEncoder<'_>,
    ) -> Result<Payment, DomainError> {
        let mut payments = self.payments.lock().unwrap();
        let Some(existing) = payments.get(&id) else {
            return Err(DomainError::not_found("payment", id));
        };
        let updated = Payment {
            status,
            updated_at,
            ..existing.clone()
        };

        let entry = encode(&updated)?;
        payments.insert(id, updated.clone());
        self.outbox.append(entry);
        Ok(updated)
    }

    async fn find(&self, id: i64) -> Result<Option<Payment>, DomainError> {
        Ok(self.payments.lock().unwrap().get(&id).cloned())
    }
}

/// A payment repository that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingPaymentRepository;

#[async_trait]
impl PaymentRepository for FailingPaymentRepository {
    async fn insert_with_event(
        &self,
        _payment: &NewPayment,
        _encode: &OutboxEncoder<'_>,
    ) -> Result<Payment, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn update_status_with_event(
        &self,
        _id: i64,
        _status: PaymentStatus,
        _updated_at: DateTime<Utc>,
        _encode: &OutboxEncoder<'_>,
    ) -> Result<Payment, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn find(&self, _id: i64) -> Result<Option<Payment>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

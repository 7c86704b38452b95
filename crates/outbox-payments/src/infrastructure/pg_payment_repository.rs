//! `PostgreSQL` implementation of the `PaymentRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use outbox_core::error::DomainError;

use crate::domain::payment::{NewPayment, Payment, PaymentStatus};
use crate::domain::repository::{OutboxEncoder, PaymentRepository};

const INSERT_PAYMENT: &str = r"
INSERT INTO payment (user_id, amount, status, created_at, updated_at)
VALUES ($1, $2, $3, $4, $4)
RETURNING id, user_id, amount, status, created_at, updated_at
";

const UPDATE_STATUS: &str = r"
UPDATE payment
SET status = $1, updated_at = $2
WHERE id = $3
RETURNING id, user_id, amount, status, created_at, updated_at
";

const SELECT_PAYMENT: &str = r"
SELECT id, user_id, amount, status, created_at, updated_at
FROM payment
WHERE id = $1
";

fn infra(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

#[derive(FromRow)]
struct PaymentRow {
    id: i64,
    user_id: i64,
    amount: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<PaymentStatus>()
            .map_err(|e| DomainError::Infrastructure(format!("corrupt payment row {}: {e}", row.id)))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed payment repository. Every mutation and its outbox
/// entry share one transaction; an early return drops it, rolling back.
#[derive(Debug, Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    /// Creates a new `PgPaymentRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn insert_with_event(
        &self,
        payment: &NewPayment,
        encode: &OutboxEncoder<'_>,
    ) -> Result<Payment, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infra)?;

        let row: PaymentRow = sqlx::query_as(INSERT_PAYMENT)
            .bind(payment.user_id)
            .bind(payment.amount)
            .bind(payment.status.as_str())
            .bind(payment.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(infra)?;
        let created = Payment::try_from(row)?;

        let entry = encode(&created)?;
        outbox_store::append(&mut tx, &entry).await?;

        tx.commit().await.map_err(infra)?;
        Ok(created)
    }

    async fn update_status_with_event(
        &self,
        id: i64,
        status: PaymentStatus,
        updated_at: DateTime<Utc>,
        encode: &OutboxEncoder<'_>,
    ) -> Result<Payment, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infra)?;

        let row: Option<PaymentRow> = sqlx::query_as(UPDATE_STATUS)
            .bind(status.as_str())
            .bind(updated_at)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(infra)?;
        let Some(row) = row else {
            return Err(DomainError::not_found("payment", id));
        };
        let updated = Payment::try_from(row)?;

        let entry = encode(&updated)?;
        outbox_store::append(&mut tx, &entry).await?;

        tx.commit().await.map_err(infra)?;
        Ok(updated)
    }

    async fn find(&self, id: i64) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(SELECT_PAYMENT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infra)?;
        row.map(Payment::try_from).transpose()
    }
}

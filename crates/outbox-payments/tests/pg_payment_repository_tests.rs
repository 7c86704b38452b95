//! Integration tests for `PgPaymentRepository`.
//!
//! These need a running `PostgreSQL` reachable through `DATABASE_URL`.

use chrono::{TimeZone, Utc};
use outbox_core::error::DomainError;
use outbox_payments::domain::events::PaymentEvent;
use outbox_payments::domain::payment::{NewPayment, Payment, PaymentStatus};
use outbox_payments::domain::repository::PaymentRepository;
use outbox_payments::infrastructure::pg_payment_repository::PgPaymentRepository;
use sqlx::PgPool;

fn draft() -> NewPayment {
    let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    NewPayment::new(11, 4_200, PaymentStatus::Pending, at).unwrap()
}

fn created_event(payment: &Payment) -> Result<outbox_core::entry::NewOutboxEntry, DomainError> {
    PaymentEvent::PaymentCreated(payment.clone()).to_outbox_entry()
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_insert_commits_payment_and_outbox_entry_together(pool: PgPool) {
    let repo = PgPaymentRepository::new(pool.clone());

    let payment = repo.insert_with_event(&draft(), &created_event).await.unwrap();

    let (entity_id, created_at, processed_at): (i64, chrono::DateTime<Utc>, Option<chrono::DateTime<Utc>>) =
        sqlx::query_as("SELECT entity_id, created_at, processed_at FROM outbox_messages")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(entity_id, payment.id);
    assert_eq!(created_at, payment.updated_at);
    assert!(processed_at.is_none());
    assert_eq!(repo.find(payment.id).await.unwrap(), Some(payment));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_encoding_failure_rolls_back_the_payment(pool: PgPool) {
    let repo = PgPaymentRepository::new(pool.clone());

    let result = repo
        .insert_with_event(&draft(), &|_: &Payment| {
            Err(DomainError::Encoding("unsupported value".into()))
        })
        .await;

    assert!(matches!(result, Err(DomainError::Encoding(_))));
    assert_eq!(count(&pool, "payment").await, 0);
    assert_eq!(count(&pool, "outbox_messages").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_of_missing_payment_is_not_found(pool: PgPool) {
    let repo = PgPaymentRepository::new(pool.clone());

    let result = repo
        .update_status_with_event(999, PaymentStatus::Completed, Utc::now(), &created_event)
        .await;

    assert!(matches!(result, Err(DomainError::NotFound { .. })));
    assert_eq!(count(&pool, "outbox_messages").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_failure_keeps_previous_status(pool: PgPool) {
    let repo = PgPaymentRepository::new(pool.clone());
    let payment = repo.insert_with_event(&draft(), &created_event).await.unwrap();

    let result = repo
        .update_status_with_event(payment.id, PaymentStatus::Refunded, Utc::now(), &|_: &Payment| {
            Err(DomainError::Encoding("boom".into()))
        })
        .await;

    assert!(result.is_err());
    let stored = repo.find(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(count(&pool, "outbox_messages").await, 1);
}

//! `PostgreSQL` implementation of the `OutboxStore` trait.
//!
//! Claims use `FOR UPDATE SKIP LOCKED`, so concurrent relays never see each
//! other's rows and a crashed relay's rows are released with its
//! transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use outbox_core::clock::Clock;
use outbox_core::entry::{NewOutboxEntry, OutboxEntry};
use outbox_core::error::DomainError;
use outbox_core::store::{ClaimedBatch, CompletionReport, Disposition, OutboxStore};

const INSERT_ENTRY: &str = r"
INSERT INTO outbox_messages (id, entity_id, topic, payload, created_at)
VALUES ($1, $2, $3, $4, $5)
";

const CLAIM_PENDING: &str = r"
SELECT id, entity_id, topic, payload, created_at, attempts
FROM outbox_messages
WHERE processed_at IS NULL
ORDER BY created_at, id
LIMIT $1
FOR UPDATE SKIP LOCKED
";

const MARK_DELIVERED: &str = r"
UPDATE outbox_messages
SET processed_at = $1, error = FALSE
WHERE id = ANY($2) AND processed_at IS NULL
";

// SET expressions see the pre-update row, so `attempts + 1` is the new count
// in every clause.
const RECORD_FAILURE: &str = r"
UPDATE outbox_messages
SET attempts = attempts + 1,
    last_error = $2,
    processed_at = CASE WHEN attempts + 1 >= $3 THEN $1 ELSE NULL END,
    error = attempts + 1 >= $3
WHERE id = ANY($4) AND processed_at IS NULL
RETURNING processed_at IS NOT NULL
";

fn infra(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// Appends `entry` on the caller's connection. Pass the domain mutation's
/// open transaction so both commit or neither does.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the insert fails.
pub async fn append(conn: &mut PgConnection, entry: &NewOutboxEntry) -> Result<(), DomainError> {
    sqlx::query(INSERT_ENTRY)
        .bind(entry.id)
        .bind(entry.entity_id)
        .bind(&entry.topic)
        .bind(&entry.payload)
        .bind(entry.created_at)
        .execute(conn)
        .await
        .map_err(infra)?;
    Ok(())
}

#[derive(FromRow)]
struct OutboxRow {
    id: Uuid,
    entity_id: i64,
    topic: String,
    payload: String,
    created_at: DateTime<Utc>,
    attempts: i32,
}

impl From<OutboxRow> for OutboxEntry {
    fn from(row: OutboxRow) -> Self {
        Self {
            id: row.id,
            entity_id: row.entity_id,
            topic: row.topic,
            payload: row.payload,
            created_at: row.created_at,
            attempts: row.attempts.max(0).unsigned_abs(),
        }
    }
}

/// PostgreSQL-backed outbox store.
#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgOutboxStore {
    /// Creates a new `PgOutboxStore`. `clock` stamps `processed_at`.
    #[must_use]
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

impl std::fmt::Debug for PgOutboxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgOutboxStore")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn claim_batch(&self, limit: usize) -> Result<Box<dyn ClaimedBatch>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infra)?;

        let rows: Vec<OutboxRow> = sqlx::query_as(CLAIM_PENDING)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&mut *tx)
            .await
            .map_err(infra)?;

        let entries: Vec<OutboxEntry> = rows.into_iter().map(OutboxEntry::from).collect();
        debug!(claimed = entries.len(), limit, "claimed outbox entries");

        Ok(Box::new(PgClaimedBatch {
            tx,
            entries,
            clock: Arc::clone(&self.clock),
        }))
    }
}

/// A claim held open as a `PostgreSQL` transaction.
///
/// Dropping it only queues the `ROLLBACK`; the row locks go away once the
/// connection is returned to the pool. `complete` and `release` roll back
/// explicitly so their callers see the rows unlocked on return.
struct PgClaimedBatch {
    tx: Transaction<'static, Postgres>,
    entries: Vec<OutboxEntry>,
    clock: Arc<dyn Clock>,
}

/// Applies `disposition` to every row in `ids` on the claim's connection.
async fn record_disposition(
    conn: &mut PgConnection,
    ids: &[Uuid],
    now: DateTime<Utc>,
    disposition: &Disposition,
) -> Result<CompletionReport, DomainError> {
    let mut report = CompletionReport::default();
    match disposition {
        Disposition::Delivered => {
            let result = sqlx::query(MARK_DELIVERED)
                .bind(now)
                .bind(ids)
                .execute(conn)
                .await
                .map_err(infra)?;
            report.delivered = usize::try_from(result.rows_affected()).unwrap_or(usize::MAX);
        }
        Disposition::Failed {
            reason,
            max_attempts,
        } => {
            let terminal: Vec<bool> = sqlx::query_scalar(RECORD_FAILURE)
                .bind(now)
                .bind(reason)
                .bind(i32::try_from(*max_attempts).unwrap_or(i32::MAX))
                .bind(ids)
                .fetch_all(conn)
                .await
                .map_err(infra)?;
            report.dead_lettered = terminal.iter().filter(|dead| **dead).count();
            report.retried = terminal.len() - report.dead_lettered;
        }
    }
    Ok(report)
}

#[async_trait]
impl ClaimedBatch for PgClaimedBatch {
    fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    async fn complete(
        self: Box<Self>,
        disposition: &Disposition,
    ) -> Result<CompletionReport, DomainError> {
        let Self {
            mut tx,
            entries,
            clock,
        } = *self;

        if entries.is_empty() {
            tx.commit().await.map_err(infra)?;
            return Ok(CompletionReport::default());
        }

        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        match record_disposition(&mut *tx, &ids, clock.now(), disposition).await {
            Ok(report) => {
                tx.commit().await.map_err(infra)?;
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback after failed outcome update failed");
                }
                Err(err)
            }
        }
    }

    async fn release(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(infra)
    }
}

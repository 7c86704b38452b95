//! Shared application state.

use std::sync::Arc;

use outbox_core::clock::Clock;
use outbox_payments::domain::repository::PaymentRepository;
use sqlx::PgPool;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub db_pool: PgPool,
    /// Clock stamping payment mutations and their outbox entries.
    pub clock: Arc<dyn Clock>,
    /// Payment persistence, paired with the outbox.
    pub payment_repository: Arc<dyn PaymentRepository>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        db_pool: PgPool,
        clock: Arc<dyn Clock>,
        payment_repository: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            db_pool,
            clock,
            payment_repository,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("db_pool", &self.db_pool)
            .finish_non_exhaustive()
    }
}

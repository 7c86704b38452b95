//! Outbox Store: `PostgreSQL` persistence for outbox entries.

pub mod pg_outbox_store;

pub use pg_outbox_store::{PgOutboxStore, append};

/// Embedded schema migrations for the `payment` and `outbox_messages`
/// tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

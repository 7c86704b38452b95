//! Outbox API: HTTP surface of the payments producer.

pub mod error;
pub mod routes;
pub mod state;

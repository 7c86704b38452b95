//! Payments bounded context.
//!
//! Every payment mutation commits together with the outbox entry that
//! announces it.

pub mod application;
pub mod domain;
pub mod infrastructure;

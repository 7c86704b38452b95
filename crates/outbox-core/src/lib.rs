//! Outbox Core: shared abstractions for the transactional outbox.
//!
//! This crate defines the entry model, the claim protocol the relay runs
//! against a store, and the publisher contract. It contains no
//! infrastructure code.

pub mod clock;
pub mod entry;
pub mod error;
pub mod publisher;
pub mod store;

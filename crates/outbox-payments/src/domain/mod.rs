//! Payment domain model.

pub mod commands;
pub mod events;
pub mod payment;
pub mod repository;

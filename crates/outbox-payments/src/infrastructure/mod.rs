//! `PostgreSQL` adapters for the payments context.

pub mod pg_payment_repository;

//! Outbox Relay: the claim-batch dispatcher and its bus adapter.
//!
//! One [`dispatcher::Dispatcher`] runs per process. Any number of processes
//! may run against the same store; the store's lock-skipping claim is the
//! only coordination between them.

pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod http;
pub mod metrics;
pub mod nats;
pub mod partition;

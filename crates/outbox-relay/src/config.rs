//! Relay configuration, read from the environment at startup.

use std::fmt::Display;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::backoff::Backoff;
use crate::dispatcher::{DispatcherSettings, FailurePolicy};

const DEFAULT_PARTITIONS: NonZeroU32 = NonZeroU32::new(12).unwrap();
const DEFAULT_METRICS_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8081);

/// Invalid or missing configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// A variable is set but unusable.
    #[error("invalid {key}={value}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Everything the relay binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Pool size.
    pub database_max_connections: u32,
    /// NATS server URL.
    pub nats_url: String,
    /// Topic whose stream is created at startup.
    pub topic: String,
    /// Partitions per topic.
    pub partitions: NonZeroU32,
    /// Stream replicas that must hold a message before it is acknowledged.
    pub stream_replicas: usize,
    /// Entries claimed per cycle.
    pub batch_size: usize,
    /// Time between cycles.
    pub poll_interval: Duration,
    /// Bound on opening the claim transaction and running the claim query.
    pub claim_timeout: Duration,
    /// Bound on one publish call.
    pub publish_timeout: Duration,
    /// What happens to a batch the bus did not acknowledge.
    pub failure_policy: FailurePolicy,
    /// Listen address of the metrics and health endpoints.
    pub metrics_addr: SocketAddr,
}

impl RelayConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let batch_size: usize = parse_or(&lookup, "OUTBOX_BATCH_SIZE", 100)?;
        if batch_size == 0 {
            return Err(invalid("OUTBOX_BATCH_SIZE", "0", "must be at least 1"));
        }
        let poll_interval_ms: u64 = parse_or(&lookup, "OUTBOX_POLL_INTERVAL_MS", 5_000)?;
        if poll_interval_ms == 0 {
            return Err(invalid("OUTBOX_POLL_INTERVAL_MS", "0", "must be at least 1"));
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: lookup("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string()),
            topic: lookup("OUTBOX_TOPIC").unwrap_or_else(|| "payment-events".to_string()),
            partitions: parse_or(&lookup, "OUTBOX_PARTITIONS", DEFAULT_PARTITIONS)?,
            stream_replicas: parse_or(&lookup, "OUTBOX_STREAM_REPLICAS", 1)?,
            batch_size,
            poll_interval: Duration::from_millis(poll_interval_ms),
            claim_timeout: Duration::from_millis(parse_or(
                &lookup,
                "OUTBOX_CLAIM_TIMEOUT_MS",
                10_000,
            )?),
            publish_timeout: Duration::from_millis(parse_or(
                &lookup,
                "OUTBOX_PUBLISH_TIMEOUT_MS",
                30_000,
            )?),
            failure_policy: failure_policy(&lookup)?,
            metrics_addr: parse_or(&lookup, "METRICS_ADDR", DEFAULT_METRICS_ADDR)?,
        })
    }

    /// Returns the dispatcher settings derived from this configuration.
    #[must_use]
    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            batch_size: self.batch_size,
            poll_interval: self.poll_interval,
            claim_timeout: self.claim_timeout,
            publish_timeout: self.publish_timeout,
            failure_policy: self.failure_policy,
            backoff: Backoff::default(),
        }
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| invalid(key, &raw, e)),
    }
}

fn failure_policy<F>(lookup: &F) -> Result<FailurePolicy, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let max_attempts: u32 = parse_or(lookup, "OUTBOX_MAX_ATTEMPTS", 5)?;
    if max_attempts == 0 {
        return Err(invalid("OUTBOX_MAX_ATTEMPTS", "0", "must be at least 1"));
    }

    match lookup("OUTBOX_FAILURE_POLICY").as_deref().map(str::trim) {
        None | Some("retry") => Ok(FailurePolicy::Retry { max_attempts }),
        Some("mark-failed") => Ok(FailurePolicy::MarkFailed),
        Some(other) => Err(invalid(
            "OUTBOX_FAILURE_POLICY",
            other,
            "expected `retry` or `mark-failed`",
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<RelayConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        // Arrange / Act
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/outbox")]).unwrap();

        // Assert
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.topic, "payment-events");
        assert_eq!(config.partitions.get(), 12);
        assert_eq!(config.stream_replicas, 1);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.claim_timeout, Duration::from_secs(10));
        assert_eq!(config.publish_timeout, Duration::from_secs(30));
        assert_eq!(config.failure_policy, FailurePolicy::Retry { max_attempts: 5 });
        assert_eq!(config.metrics_addr, "0.0.0.0:8081".parse().unwrap());
    }

    #[test]
    fn test_missing_database_url_is_rejected() {
        assert_eq!(
            config_from(&[]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/outbox"),
            ("OUTBOX_BATCH_SIZE", "5"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("OUTBOX_PARTITIONS", "3"),
            ("OUTBOX_STREAM_REPLICAS", "3"),
            ("OUTBOX_FAILURE_POLICY", "mark-failed"),
            ("METRICS_ADDR", "127.0.0.1:9100"),
        ])
        .unwrap();

        assert_eq!(config.batch_size, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.partitions.get(), 3);
        assert_eq!(config.stream_replicas, 3);
        assert_eq!(config.failure_policy, FailurePolicy::MarkFailed);
        assert_eq!(config.metrics_addr.port(), 9100);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = config_from(&[("DATABASE_URL", "x"), ("OUTBOX_BATCH_SIZE", "0")]).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "OUTBOX_BATCH_SIZE", .. }));
    }

    #[test]
    fn test_zero_partitions_is_rejected() {
        let err = config_from(&[("DATABASE_URL", "x"), ("OUTBOX_PARTITIONS", "0")]).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "OUTBOX_PARTITIONS", .. }));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let err =
            config_from(&[("DATABASE_URL", "x"), ("OUTBOX_POLL_INTERVAL_MS", "0")]).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "OUTBOX_POLL_INTERVAL_MS", .. }));
    }

    #[test]
    fn test_unknown_failure_policy_is_rejected() {
        let err = config_from(&[("DATABASE_URL", "x"), ("OUTBOX_FAILURE_POLICY", "drop")])
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "invalid OUTBOX_FAILURE_POLICY=drop: expected `retry` or `mark-failed`"
        );
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let err =
            config_from(&[("DATABASE_URL", "x"), ("OUTBOX_BATCH_SIZE", "lots")]).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "OUTBOX_BATCH_SIZE", .. }));
    }

    #[test]
    fn test_custom_max_attempts_feeds_retry_policy() {
        let config =
            config_from(&[("DATABASE_URL", "x"), ("OUTBOX_MAX_ATTEMPTS", "2")]).unwrap();

        assert_eq!(config.failure_policy, FailurePolicy::Retry { max_attempts: 2 });
        assert_eq!(config.dispatcher_settings().failure_policy.max_attempts(), 2);
    }
}

//! Prometheus counters for the relay.
//!
//! Counters only move after a cycle's claim transaction has committed, so a
//! rolled-back or timed-out cycle is invisible here.

use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use crate::dispatcher::CycleOutcome;

const CYCLE_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Point-in-time copy of the relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Entries published and marked delivered.
    pub processed: u64,
    /// Entries whose publish failed.
    pub failed: u64,
    /// Failed entries left pending for another attempt.
    pub retried: u64,
    /// Failed entries made terminal with `error = true`.
    pub dead_lettered: u64,
}

/// Relay metrics registered in their own registry.
#[derive(Debug, Clone)]
pub struct RelayMetrics {
    registry: Registry,
    processed: IntCounter,
    failed: IntCounter,
    retried: IntCounter,
    dead_lettered: IntCounter,
    cycle_duration: Histogram,
}

impl RelayMetrics {
    /// Creates and registers the relay metrics.
    ///
    /// # Errors
    ///
    /// Returns `prometheus::Error` if a metric cannot be registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let processed = IntCounter::new(
            "messages_processed_total",
            "Outbox entries published and marked delivered",
        )?;
        let failed = IntCounter::new(
            "messages_failed_total",
            "Outbox entries whose publish was not acknowledged",
        )?;
        let retried = IntCounter::new(
            "messages_retried_total",
            "Failed outbox entries left pending for another attempt",
        )?;
        let dead_lettered = IntCounter::new(
            "messages_dead_lettered_total",
            "Failed outbox entries marked terminal",
        )?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "outbox_cycle_duration_seconds",
                "Duration of committed claim-publish-record cycles",
            )
            .buckets(CYCLE_BUCKETS.to_vec()),
        )?;

        let registry = Registry::new();
        registry.register(Box::new(processed.clone()))?;
        registry.register(Box::new(failed.clone()))?;
        registry.register(Box::new(retried.clone()))?;
        registry.register(Box::new(dead_lettered.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;

        Ok(Self {
            registry,
            processed,
            failed,
            retried,
            dead_lettered,
            cycle_duration,
        })
    }

    /// Records a committed cycle.
    pub fn record(&self, outcome: &CycleOutcome, elapsed: Duration) {
        match *outcome {
            CycleOutcome::Delivered { count } => self.processed.inc_by(as_u64(count)),
            CycleOutcome::Failed {
                count,
                retried,
                dead_lettered,
            } => {
                self.failed.inc_by(as_u64(count));
                self.retried.inc_by(as_u64(retried));
                self.dead_lettered.inc_by(as_u64(dead_lettered));
            }
            CycleOutcome::Idle | CycleOutcome::Released { .. } => return,
        }
        self.cycle_duration.observe(elapsed.as_secs_f64());
    }

    /// Reads the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.processed.get(),
            failed: self.failed.get(),
            retried: self.retried.get(),
            dead_lettered: self.dead_lettered.get(),
        }
    }

    /// Renders every metric in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns `prometheus::Error` if encoding fails.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// The registry holding the relay metrics.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_start_at_zero() {
        let metrics = RelayMetrics::new().unwrap();

        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_delivered_cycle_increments_processed_only() {
        // Arrange
        let metrics = RelayMetrics::new().unwrap();

        // Act
        metrics.record(&CycleOutcome::Delivered { count: 3 }, Duration::from_millis(12));

        // Assert
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.failed, 0);
    }

    #[test]
    fn test_failed_cycle_splits_by_disposition() {
        let metrics = RelayMetrics::new().unwrap();

        metrics.record(
            &CycleOutcome::Failed {
                count: 4,
                retried: 3,
                dead_lettered: 1,
            },
            Duration::from_millis(5),
        );

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                processed: 0,
                failed: 4,
                retried: 3,
                dead_lettered: 1,
            }
        );
    }

    #[test]
    fn test_idle_and_released_cycles_leave_counters_alone() {
        let metrics = RelayMetrics::new().unwrap();

        metrics.record(&CycleOutcome::Idle, Duration::ZERO);
        metrics.record(&CycleOutcome::Released { count: 8 }, Duration::from_secs(30));

        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert_eq!(metrics.cycle_duration.get_sample_count(), 0);
    }

    #[test]
    fn test_render_exposes_counter_names() {
        let metrics = RelayMetrics::new().unwrap();
        metrics.record(&CycleOutcome::Delivered { count: 2 }, Duration::from_millis(1));

        let text = metrics.render().unwrap();

        assert!(text.contains("messages_processed_total 2"));
        assert!(text.contains("messages_failed_total 0"));
        assert!(text.contains("outbox_cycle_duration_seconds_count 1"));
    }
}

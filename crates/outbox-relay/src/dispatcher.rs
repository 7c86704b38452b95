//! Claim-batch dispatcher.
//!
//! A cycle claims the oldest pending entries, publishes them as one batch,
//! records the outcome in the claim transaction and commits. Cycles never
//! overlap within a process; concurrent processes are kept apart by the
//! store's lock-skipping claim.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use outbox_core::error::DomainError;
use outbox_core::publisher::{OutboundMessage, Publisher};
use outbox_core::store::{Disposition, OutboxStore};

use crate::backoff::Backoff;
use crate::metrics::RelayMetrics;

/// What to do with a batch the bus did not acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Leave entries pending for a later cycle; dead-letter an entry once it
    /// has failed `max_attempts` times.
    Retry {
        /// Attempts allowed per entry, at least 1.
        max_attempts: u32,
    },
    /// Mark every entry of the batch terminal with `error = true` on the
    /// first failure. Events are lost while the bus is down.
    MarkFailed,
}

impl FailurePolicy {
    /// Attempts after which an entry becomes terminal.
    #[must_use]
    pub fn max_attempts(self) -> u32 {
        match self {
            Self::Retry { max_attempts } => max_attempts.max(1),
            Self::MarkFailed => 1,
        }
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Retry { max_attempts: 5 }
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherSettings {
    /// Entries claimed per cycle.
    pub batch_size: usize,
    /// Time between cycles.
    pub poll_interval: Duration,
    /// Bound on opening the claim transaction and running the claim query.
    pub claim_timeout: Duration,
    /// Bound on the publish call. On expiry the claim is rolled back.
    pub publish_timeout: Duration,
    /// Handling of unacknowledged batches.
    pub failure_policy: FailurePolicy,
    /// Delay schedule after consecutive aborted cycles.
    pub backoff: Backoff,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(5),
            claim_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(30),
            failure_policy: FailurePolicy::default(),
            backoff: Backoff::default(),
        }
    }
}

/// Result of one committed or released cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was pending.
    Idle,
    /// `count` entries were published and marked delivered.
    Delivered {
        /// Batch size.
        count: usize,
    },
    /// The publish failed and the failure was recorded.
    Failed {
        /// Batch size.
        count: usize,
        /// Entries left pending for another attempt.
        retried: usize,
        /// Entries made terminal with `error = true`.
        dead_lettered: usize,
    },
    /// The publish timed out; the claim was rolled back untouched.
    Released {
        /// Batch size.
        count: usize,
    },
}

/// A cycle that aborted without committing.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The claim did not complete within the claim timeout.
    #[error("claim timed out after {0:?}")]
    ClaimTimeout(Duration),

    /// The store failed to claim, record or commit.
    #[error(transparent)]
    Store(#[from] DomainError),
}

/// Drives claim-publish-record cycles against one store and one bus.
pub struct Dispatcher {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<dyn Publisher>,
    metrics: RelayMetrics,
    settings: DispatcherSettings,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        store: Arc<dyn OutboxStore>,
        publisher: Arc<dyn Publisher>,
        metrics: RelayMetrics,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            store,
            publisher,
            metrics,
            settings,
        }
    }

    /// The dispatcher's settings.
    #[must_use]
    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// The metrics this dispatcher records into.
    #[must_use]
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Runs one claim-publish-record cycle.
    ///
    /// Counters are updated only after the claim transaction commits.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` if the claim timed out or the store failed. No
    /// entry changes state in that case.
    #[instrument(skip(self), fields(batch_size = self.settings.batch_size))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, RelayError> {
        let started = Instant::now();

        let claim = timeout(
            self.settings.claim_timeout,
            self.store.claim_batch(self.settings.batch_size),
        )
        .await
        .map_err(|_| RelayError::ClaimTimeout(self.settings.claim_timeout))??;

        if claim.entries().is_empty() {
            claim.complete(&Disposition::Delivered).await?;
            debug!("no pending outbox entries");
            return Ok(CycleOutcome::Idle);
        }

        let messages: Vec<OutboundMessage> =
            claim.entries().iter().map(OutboundMessage::from).collect();
        let count = messages.len();

        let disposition =
            match timeout(self.settings.publish_timeout, self.publisher.publish(&messages)).await {
                Ok(Ok(())) => Disposition::Delivered,
                Ok(Err(err)) => {
                    warn!(error = %err, count, "publish failed; recording failure");
                    Disposition::Failed {
                        reason: err.to_string(),
                        max_attempts: self.settings.failure_policy.max_attempts(),
                    }
                }
                Err(_) => {
                    warn!(
                        count,
                        timeout_ms = duration_ms(self.settings.publish_timeout),
                        "publish timed out; releasing claim"
                    );
                    claim.release().await?;
                    return Ok(CycleOutcome::Released { count });
                }
            };

        let report = claim.complete(&disposition).await?;
        let outcome = match disposition {
            Disposition::Delivered => CycleOutcome::Delivered { count },
            Disposition::Failed { .. } => CycleOutcome::Failed {
                count,
                retried: report.retried,
                dead_lettered: report.dead_lettered,
            },
        };

        let elapsed = started.elapsed();
        self.metrics.record(&outcome, elapsed);
        info!(
            claimed = count,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            elapsed_ms = duration_ms(elapsed),
            "outbox batch processed"
        );
        Ok(outcome)
    }

    /// Runs cycles on a fixed interval until `shutdown` is cancelled.
    ///
    /// A cycle in flight when `shutdown` fires runs to completion. Aborted or
    /// panicking cycles are logged and never end the loop; consecutive
    /// aborts delay the next attempt by the backoff schedule.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            batch_size = self.settings.batch_size,
            poll_interval_ms = duration_ms(self.settings.poll_interval),
            failure_policy = ?self.settings.failure_policy,
            "starting outbox dispatcher"
        );
        if self.settings.failure_policy == FailurePolicy::MarkFailed {
            warn!("failure policy `mark-failed` drops events whose publish fails");
        }

        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let failed = match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(Ok(_)) => false,
                Ok(Err(err)) => {
                    error!(error = %err, "outbox cycle aborted");
                    true
                }
                Err(panic) => {
                    error!(panic = panic_message(panic.as_ref()), "outbox cycle panicked");
                    true
                }
            };

            if !failed {
                consecutive_failures = 0;
                continue;
            }
            consecutive_failures = consecutive_failures.saturating_add(1);
            let delay = self.settings.backoff.delay(consecutive_failures);
            warn!(
                consecutive_failures,
                backoff_ms = duration_ms(delay),
                "backing off before next cycle"
            );
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = sleep(delay) => {}
            }
        }

        info!("outbox dispatcher stopped");
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

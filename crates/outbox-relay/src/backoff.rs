//! Exponential backoff with jitter for consecutive infrastructure failures.
//!
//! ```text
//! failures   delay (base = 500ms, max = 30s)   with jitter (+/-20%)
//!    1             500ms                          400ms - 600ms
//!    2               1s                           800ms - 1.2s
//!    3               2s                           1.6s  - 2.4s
//!    ...
//!    >=7            30s                            24s  - 36s
//! ```

use std::time::Duration;

use rand::Rng;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Doubling cap on the exponent; `2^16` base delays is already far beyond
/// any sane `max_delay`.
const MAX_EXPONENT: u32 = 16;

/// Backoff schedule applied between failed cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound before jitter.
    pub max_delay: Duration,
    /// Relative jitter in `0.0..=1.0`.
    pub jitter_factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl Backoff {
    /// Returns the un-jittered delay after `consecutive_failures` failures.
    #[must_use]
    pub fn nominal_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (consecutive_failures - 1).min(MAX_EXPONENT);
        self.base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }

    /// Returns the jittered delay after `consecutive_failures` failures.
    #[must_use]
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        let nominal = self.nominal_delay(consecutive_failures);
        let jitter = self.jitter_factor.clamp(0.0, 1.0);
        if jitter <= 0.0 || nominal.is_zero() {
            return nominal;
        }
        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        nominal.mul_f64(factor)
    }
}

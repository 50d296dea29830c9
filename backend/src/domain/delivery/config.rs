//! Environment-driven configuration for the outbox delivery worker.

use std::time::Duration;

use crate::domain::config::{ConfigEnv, DefaultConfigEnv, parsed_or};

/// Environment variable for the poll interval in seconds.
pub const DELIVERY_POLL_INTERVAL_SECS_ENV: &str = "DELIVERY_POLL_INTERVAL_SECS";
/// Environment variable for the per-pass claim batch size.
pub const DELIVERY_BATCH_SIZE_ENV: &str = "DELIVERY_BATCH_SIZE";
/// Environment variable for the base retry delay in seconds.
pub const DELIVERY_BASE_DELAY_SECS_ENV: &str = "DELIVERY_BASE_DELAY_SECS";
/// Environment variable for the exponential backoff factor.
pub const DELIVERY_BACKOFF_FACTOR_ENV: &str = "DELIVERY_BACKOFF_FACTOR";
/// Environment variable for the retry delay cap in seconds.
pub const DELIVERY_CAP_DELAY_SECS_ENV: &str = "DELIVERY_CAP_DELAY_SECS";

/// Configuration for the outbox delivery worker.
///
/// The backoff schedule with the defaults is 60s, 4m, 16m, 64m, 256m: the
/// first retries absorb transient blips within minutes while the later ones
/// ride out hours-long outages before an event dead-letters (roughly a 5.5
/// hour total window for the default five-retry budget).
///
/// # Example
///
/// ```
/// # use backend::domain::delivery::DeliveryConfig;
/// # use std::time::Duration;
/// let config = DeliveryConfig::default();
/// assert_eq!(config.poll_interval(), Duration::from_secs(10));
/// assert_eq!(config.backoff_delay(2), Duration::from_secs(960));
/// ```
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    poll_interval: Duration,
    batch_size: i64,
    base_delay: Duration,
    backoff_factor: u64,
    cap_delay: Duration,
}

impl DeliveryConfig {
    /// Default poll interval in seconds.
    const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
    /// Bounds for the poll interval.
    const POLL_INTERVAL_SECS_RANGE: (u64, u64) = (1, 300);

    /// Default number of events claimed per pass.
    const DEFAULT_BATCH_SIZE: i64 = 20;
    /// Bounds for the batch size.
    const BATCH_SIZE_RANGE: (i64, i64) = (1, 500);

    /// Default base retry delay in seconds.
    const DEFAULT_BASE_DELAY_SECS: u64 = 60;
    /// Bounds for the base delay.
    const BASE_DELAY_SECS_RANGE: (u64, u64) = (1, 3600);

    /// Default exponential backoff factor.
    const DEFAULT_BACKOFF_FACTOR: u64 = 4;
    /// Bounds for the backoff factor.
    const BACKOFF_FACTOR_RANGE: (u64, u64) = (2, 10);

    /// Default retry delay cap in seconds (256 minutes).
    const DEFAULT_CAP_DELAY_SECS: u64 = 15_360;
    /// Bounds for the delay cap.
    const CAP_DELAY_SECS_RANGE: (u64, u64) = (60, 86_400);

    /// Load configuration from the real process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(&DefaultConfigEnv)
    }

    /// Load configuration from a custom environment source.
    ///
    /// Each value is clamped to its documented range; the cap is raised to
    /// at least the base delay so the schedule can never shrink below its
    /// first step.
    pub fn from_env_with(env: &impl ConfigEnv) -> Self {
        let poll_interval_secs = parsed_or(
            env,
            DELIVERY_POLL_INTERVAL_SECS_ENV,
            Self::DEFAULT_POLL_INTERVAL_SECS,
        )
        .clamp(
            Self::POLL_INTERVAL_SECS_RANGE.0,
            Self::POLL_INTERVAL_SECS_RANGE.1,
        );
        let batch_size = parsed_or(env, DELIVERY_BATCH_SIZE_ENV, Self::DEFAULT_BATCH_SIZE)
            .clamp(Self::BATCH_SIZE_RANGE.0, Self::BATCH_SIZE_RANGE.1);
        let base_delay_secs = parsed_or(
            env,
            DELIVERY_BASE_DELAY_SECS_ENV,
            Self::DEFAULT_BASE_DELAY_SECS,
        )
        .clamp(Self::BASE_DELAY_SECS_RANGE.0, Self::BASE_DELAY_SECS_RANGE.1);
        let backoff_factor = parsed_or(
            env,
            DELIVERY_BACKOFF_FACTOR_ENV,
            Self::DEFAULT_BACKOFF_FACTOR,
        )
        .clamp(Self::BACKOFF_FACTOR_RANGE.0, Self::BACKOFF_FACTOR_RANGE.1);
        let cap_delay_secs = parsed_or(env, DELIVERY_CAP_DELAY_SECS_ENV, Self::DEFAULT_CAP_DELAY_SECS)
            .clamp(Self::CAP_DELAY_SECS_RANGE.0, Self::CAP_DELAY_SECS_RANGE.1)
            .max(base_delay_secs);

        Self {
            poll_interval: Duration::from_secs(poll_interval_secs),
            batch_size,
            base_delay: Duration::from_secs(base_delay_secs),
            backoff_factor,
            cap_delay: Duration::from_secs(cap_delay_secs),
        }
    }

    /// Override the poll interval (for testing).
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the batch size (for testing).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Override the backoff schedule (for testing).
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, factor: u64, cap: Duration) -> Self {
        self.base_delay = base;
        self.backoff_factor = factor;
        self.cap_delay = cap;
        self
    }

    /// Pause between delivery passes.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Maximum number of events claimed per pass.
    pub fn batch_size(&self) -> i64 {
        self.batch_size
    }

    /// First retry delay in the backoff schedule.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Multiplier applied per failed attempt.
    pub fn backoff_factor(&self) -> u64 {
        self.backoff_factor
    }

    /// Upper bound on any single retry delay.
    pub fn cap_delay(&self) -> Duration {
        self.cap_delay
    }

    /// Delay before the next attempt after `retry_count` prior failures.
    ///
    /// Computes `min(base * factor^retry_count, cap)`; a negative count is
    /// treated as zero.
    pub fn backoff_delay(&self, retry_count: i32) -> Duration {
        let exponent = u32::try_from(retry_count).unwrap_or(0);
        let multiplier = self.backoff_factor.saturating_pow(exponent);
        let delay_secs = self
            .base_delay
            .as_secs()
            .saturating_mul(multiplier)
            .min(self.cap_delay.as_secs());
        Duration::from_secs(delay_secs)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(Self::DEFAULT_POLL_INTERVAL_SECS),
            batch_size: Self::DEFAULT_BATCH_SIZE,
            base_delay: Duration::from_secs(Self::DEFAULT_BASE_DELAY_SECS),
            backoff_factor: Self::DEFAULT_BACKOFF_FACTOR,
            cap_delay: Duration::from_secs(Self::DEFAULT_CAP_DELAY_SECS),
        }
    }
}

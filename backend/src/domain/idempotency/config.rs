//! Environment-driven configuration for the mutation gateway.

use std::time::Duration;

use super::super::config::{ConfigEnv, DefaultConfigEnv, parsed_or};

/// Environment variable for the process-local cache TTL in seconds.
pub const GATEWAY_LOCAL_TTL_SECS_ENV: &str = "GATEWAY_LOCAL_TTL_SECS";
/// Environment variable for the process-local cache capacity.
pub const GATEWAY_LOCAL_CAPACITY_ENV: &str = "GATEWAY_LOCAL_CAPACITY";
/// Environment variable for the distributed cache TTL in hours.
pub const GATEWAY_DISTRIBUTED_TTL_HOURS_ENV: &str = "GATEWAY_DISTRIBUTED_TTL_HOURS";
/// Environment variable for the durable record lifetime in hours.
pub const GATEWAY_RECORD_TTL_HOURS_ENV: &str = "GATEWAY_RECORD_TTL_HOURS";
/// Environment variable for the stampede lock TTL in seconds.
pub const GATEWAY_LOCK_TTL_SECS_ENV: &str = "GATEWAY_LOCK_TTL_SECS";
/// Environment variable for the retry hint returned with in-flight conflicts.
pub const GATEWAY_RETRY_HINT_SECS_ENV: &str = "GATEWAY_RETRY_HINT_SECS";
/// Environment variable for the circuit breaker failure threshold.
pub const GATEWAY_BREAKER_THRESHOLD_ENV: &str = "GATEWAY_BREAKER_THRESHOLD";
/// Environment variable for the circuit breaker cooldown in seconds.
pub const GATEWAY_BREAKER_COOLDOWN_SECS_ENV: &str = "GATEWAY_BREAKER_COOLDOWN_SECS";
/// Environment variable for the expired-record sweep interval in seconds.
pub const GATEWAY_SWEEP_INTERVAL_SECS_ENV: &str = "GATEWAY_SWEEP_INTERVAL_SECS";

/// Configuration for the idempotent mutation gateway.
///
/// Controls the lifetimes of the three response tiers, the stampede lock,
/// and the circuit breaker guarding the distributed cache. Tier lifetimes
/// are kept ordered (local ≤ distributed ≤ durable record) so a faster tier
/// can never outlive the slower tier it shadows.
///
/// # Example
///
/// ```
/// # use backend::domain::idempotency::GatewayConfig;
/// # use std::time::Duration;
/// let config = GatewayConfig::default();
/// assert_eq!(config.local_ttl(), Duration::from_secs(20));
/// assert_eq!(config.record_ttl(), Duration::from_secs(24 * 3600));
/// ```
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    local_ttl: Duration,
    local_capacity: u64,
    distributed_ttl: Duration,
    record_ttl: Duration,
    lock_ttl: Duration,
    retry_hint: Duration,
    breaker_threshold: u32,
    breaker_cooldown: Duration,
    sweep_interval: Duration,
}

impl GatewayConfig {
    /// Default process-local cache TTL in seconds.
    const DEFAULT_LOCAL_TTL_SECS: u64 = 20;
    /// Bounds for the process-local TTL.
    ///
    /// The local tier only smooths immediate retry bursts; letting it grow
    /// past a few minutes would serve stale replays from a single process
    /// after the distributed tier has been invalidated.
    const LOCAL_TTL_SECS_RANGE: (u64, u64) = (1, 300);

    /// Default process-local cache capacity in entries.
    const DEFAULT_LOCAL_CAPACITY: u64 = 10_000;
    /// Bounds for the process-local capacity.
    const LOCAL_CAPACITY_RANGE: (u64, u64) = (100, 1_000_000);

    /// Default distributed cache TTL in hours.
    const DEFAULT_DISTRIBUTED_TTL_HOURS: u64 = 2;
    /// Bounds for the distributed TTL.
    const DISTRIBUTED_TTL_HOURS_RANGE: (u64, u64) = (1, 24);

    /// Default durable record lifetime in hours.
    const DEFAULT_RECORD_TTL_HOURS: u64 = 24;
    /// Bounds for the record lifetime (1 hour to 10 years).
    const RECORD_TTL_HOURS_RANGE: (u64, u64) = (1, 24 * 365 * 10);

    /// Default stampede lock TTL in seconds.
    ///
    /// Long enough to cover a slow mutation, short enough that a crashed
    /// holder does not block retries for long.
    const DEFAULT_LOCK_TTL_SECS: u64 = 30;
    /// Bounds for the lock TTL.
    const LOCK_TTL_SECS_RANGE: (u64, u64) = (5, 300);

    /// Default retry hint in seconds for in-flight conflicts.
    const DEFAULT_RETRY_HINT_SECS: u64 = 2;
    /// Bounds for the retry hint.
    const RETRY_HINT_SECS_RANGE: (u64, u64) = (1, 60);

    /// Default consecutive-failure threshold before the breaker opens.
    const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
    /// Bounds for the breaker threshold.
    const BREAKER_THRESHOLD_RANGE: (u32, u32) = (1, 100);

    /// Default breaker cooldown in seconds before a probe is admitted.
    const DEFAULT_BREAKER_COOLDOWN_SECS: u64 = 30;
    /// Bounds for the breaker cooldown.
    const BREAKER_COOLDOWN_SECS_RANGE: (u64, u64) = (1, 3600);

    /// Default expired-record sweep interval in seconds (hourly).
    const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
    /// Bounds for the sweep interval.
    const SWEEP_INTERVAL_SECS_RANGE: (u64, u64) = (60, 86_400);

    /// Load configuration from the real process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(&DefaultConfigEnv)
    }

    /// Load configuration from a custom environment source.
    ///
    /// Each value is clamped to its documented range; the record lifetime is
    /// additionally raised to at least the distributed TTL so the durable
    /// tier always outlives the caches built from it.
    pub fn from_env_with(env: &impl ConfigEnv) -> Self {
        let local_ttl_secs = parsed_or(env, GATEWAY_LOCAL_TTL_SECS_ENV, Self::DEFAULT_LOCAL_TTL_SECS)
            .clamp(Self::LOCAL_TTL_SECS_RANGE.0, Self::LOCAL_TTL_SECS_RANGE.1);
        let local_capacity =
            parsed_or(env, GATEWAY_LOCAL_CAPACITY_ENV, Self::DEFAULT_LOCAL_CAPACITY)
                .clamp(Self::LOCAL_CAPACITY_RANGE.0, Self::LOCAL_CAPACITY_RANGE.1);
        let distributed_hours = parsed_or(
            env,
            GATEWAY_DISTRIBUTED_TTL_HOURS_ENV,
            Self::DEFAULT_DISTRIBUTED_TTL_HOURS,
        )
        .clamp(
            Self::DISTRIBUTED_TTL_HOURS_RANGE.0,
            Self::DISTRIBUTED_TTL_HOURS_RANGE.1,
        );
        let record_hours = parsed_or(
            env,
            GATEWAY_RECORD_TTL_HOURS_ENV,
            Self::DEFAULT_RECORD_TTL_HOURS,
        )
        .clamp(Self::RECORD_TTL_HOURS_RANGE.0, Self::RECORD_TTL_HOURS_RANGE.1)
        .max(distributed_hours);
        let lock_ttl_secs = parsed_or(env, GATEWAY_LOCK_TTL_SECS_ENV, Self::DEFAULT_LOCK_TTL_SECS)
            .clamp(Self::LOCK_TTL_SECS_RANGE.0, Self::LOCK_TTL_SECS_RANGE.1);
        let retry_hint_secs = parsed_or(
            env,
            GATEWAY_RETRY_HINT_SECS_ENV,
            Self::DEFAULT_RETRY_HINT_SECS,
        )
        .clamp(Self::RETRY_HINT_SECS_RANGE.0, Self::RETRY_HINT_SECS_RANGE.1);
        let breaker_threshold = parsed_or(
            env,
            GATEWAY_BREAKER_THRESHOLD_ENV,
            Self::DEFAULT_BREAKER_THRESHOLD,
        )
        .clamp(Self::BREAKER_THRESHOLD_RANGE.0, Self::BREAKER_THRESHOLD_RANGE.1);
        let breaker_cooldown_secs = parsed_or(
            env,
            GATEWAY_BREAKER_COOLDOWN_SECS_ENV,
            Self::DEFAULT_BREAKER_COOLDOWN_SECS,
        )
        .clamp(
            Self::BREAKER_COOLDOWN_SECS_RANGE.0,
            Self::BREAKER_COOLDOWN_SECS_RANGE.1,
        );
        let sweep_interval_secs = parsed_or(
            env,
            GATEWAY_SWEEP_INTERVAL_SECS_ENV,
            Self::DEFAULT_SWEEP_INTERVAL_SECS,
        )
        .clamp(
            Self::SWEEP_INTERVAL_SECS_RANGE.0,
            Self::SWEEP_INTERVAL_SECS_RANGE.1,
        );

        Self {
            local_ttl: Duration::from_secs(local_ttl_secs),
            local_capacity,
            distributed_ttl: Duration::from_secs(distributed_hours.saturating_mul(3600)),
            record_ttl: Duration::from_secs(record_hours.saturating_mul(3600)),
            lock_ttl: Duration::from_secs(lock_ttl_secs),
            retry_hint: Duration::from_secs(retry_hint_secs),
            breaker_threshold,
            breaker_cooldown: Duration::from_secs(breaker_cooldown_secs),
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        }
    }

    /// Override the process-local cache TTL (for testing).
    #[must_use]
    pub fn with_local_ttl(mut self, ttl: Duration) -> Self {
        self.local_ttl = ttl;
        self
    }

    /// Override the distributed cache TTL (for testing).
    #[must_use]
    pub fn with_distributed_ttl(mut self, ttl: Duration) -> Self {
        self.distributed_ttl = ttl;
        self
    }

    /// Override the durable record lifetime (for testing).
    #[must_use]
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = ttl;
        self
    }

    /// Override the stampede lock TTL (for testing).
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Override the breaker threshold and cooldown (for testing).
    #[must_use]
    pub fn with_breaker(mut self, threshold: u32, cooldown: Duration) -> Self {
        self.breaker_threshold = threshold;
        self.breaker_cooldown = cooldown;
        self
    }

    /// TTL for the process-local response cache.
    pub fn local_ttl(&self) -> Duration {
        self.local_ttl
    }

    /// Maximum number of entries held by the process-local cache.
    pub fn local_capacity(&self) -> u64 {
        self.local_capacity
    }

    /// TTL for the distributed response cache.
    pub fn distributed_ttl(&self) -> Duration {
        self.distributed_ttl
    }

    /// Lifetime of durable idempotency records.
    pub fn record_ttl(&self) -> Duration {
        self.record_ttl
    }

    /// TTL for the stampede lock.
    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    /// Hint returned to clients that collide with an in-flight request.
    pub fn retry_hint(&self) -> Duration {
        self.retry_hint
    }

    /// Consecutive failures before the breaker opens.
    pub fn breaker_threshold(&self) -> u32 {
        self.breaker_threshold
    }

    /// Cooldown before an open breaker admits a probe.
    pub fn breaker_cooldown(&self) -> Duration {
        self.breaker_cooldown
    }

    /// Interval between expired-record sweep passes.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            local_ttl: Duration::from_secs(Self::DEFAULT_LOCAL_TTL_SECS),
            local_capacity: Self::DEFAULT_LOCAL_CAPACITY,
            distributed_ttl: Duration::from_secs(Self::DEFAULT_DISTRIBUTED_TTL_HOURS * 3600),
            record_ttl: Duration::from_secs(Self::DEFAULT_RECORD_TTL_HOURS * 3600),
            lock_ttl: Duration::from_secs(Self::DEFAULT_LOCK_TTL_SECS),
            retry_hint: Duration::from_secs(Self::DEFAULT_RETRY_HINT_SECS),
            breaker_threshold: Self::DEFAULT_BREAKER_THRESHOLD,
            breaker_cooldown: Duration::from_secs(Self::DEFAULT_BREAKER_COOLDOWN_SECS),
            sweep_interval: Duration::from_secs(Self::DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

//! Circuit breaker state machine guarding the distributed cache tier.
//!
//! Adapter-agnostic policy logic: consecutive failures open the circuit,
//! a cooldown admits a single half-open probe, and the probe's outcome
//! either closes the circuit or re-opens it for another cooldown. The
//! gateway consults the breaker before every distributed-tier call so a
//! down cache costs one admission check instead of a timeout.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to open the breaker.
    pub failure_threshold: u32,
    /// Cooldown period while the breaker remains open.
    pub open_cooldown: Duration,
}

/// Circuit breaker state snapshot.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    /// Normal operation.
    Closed,
    /// Calls are blocked until cooldown elapses.
    Open,
    /// One probe call is allowed.
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitInternalState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: DateTime<Utc> },
    HalfOpen { probe_in_flight: bool },
}

/// Circuit breaker over the distributed cache and lock backend.
///
/// Pure state machine; the gateway wraps it in a `Mutex` and treats a
/// denied admission as a cache miss rather than an error.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitInternalState,
}

impl CircuitBreaker {
    /// Build a closed breaker with the provided configuration.
    ///
    /// A zero failure threshold is raised to one so the breaker can always
    /// close again after a successful probe.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                open_cooldown: config.open_cooldown,
            },
            state: CircuitInternalState::Closed {
                consecutive_failures: 0,
            },
        }
    }

    /// Decide whether one call to the guarded backend may proceed.
    ///
    /// While open, admission is denied until the cooldown elapses; the
    /// first admission afterwards is the half-open probe, and further
    /// admissions are denied until the probe's outcome is recorded.
    pub fn admit(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitInternalState::Closed { .. } => true,
            CircuitInternalState::Open { opened_at }
                if is_cooldown_elapsed(opened_at, now, self.config.open_cooldown) =>
            {
                self.state = CircuitInternalState::HalfOpen {
                    probe_in_flight: true,
                };
                true
            }
            CircuitInternalState::Open { .. } => false,
            CircuitInternalState::HalfOpen { probe_in_flight } => {
                if probe_in_flight {
                    false
                } else {
                    self.state = CircuitInternalState::HalfOpen {
                        probe_in_flight: true,
                    };
                    true
                }
            }
        }
    }

    /// Record a successful call to the guarded backend.
    pub fn record_success(&mut self) {
        self.state = CircuitInternalState::Closed {
            consecutive_failures: 0,
        };
    }

    /// Record a failed call to the guarded backend.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.state = match self.state {
            CircuitInternalState::Closed {
                consecutive_failures,
            } => {
                let next_failures = consecutive_failures.saturating_add(1);
                if next_failures >= self.config.failure_threshold {
                    CircuitInternalState::Open { opened_at: now }
                } else {
                    CircuitInternalState::Closed {
                        consecutive_failures: next_failures,
                    }
                }
            }
            CircuitInternalState::HalfOpen { .. } => CircuitInternalState::Open { opened_at: now },
            CircuitInternalState::Open { opened_at } => CircuitInternalState::Open { opened_at },
        };
    }

    /// Snapshot current circuit breaker state.
    #[cfg(test)]
    pub fn state(&self) -> CircuitBreakerState {
        match self.state {
            CircuitInternalState::Closed { .. } => CircuitBreakerState::Closed,
            CircuitInternalState::Open { .. } => CircuitBreakerState::Open,
            CircuitInternalState::HalfOpen { .. } => CircuitBreakerState::HalfOpen,
        }
    }
}

fn is_cooldown_elapsed(opened_at: DateTime<Utc>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    // An unconvertible cooldown counts as elapsed; the circuit must never
    // stay open forever.
    let Ok(cooldown) = chrono::Duration::from_std(cooldown) else {
        return true;
    };

    now >= opened_at + cooldown
}

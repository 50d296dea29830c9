//! Idempotency primitives for safe request retries.
//!
//! This module provides the building blocks of the idempotent mutation
//! pipeline:
//!
//! - [`IdempotencyKey`]: Validated UUID v4 identifier sent by clients via the
//!   `Idempotency-Key` HTTP header.
//! - [`PayloadFingerprint`]: SHA-256 digest of a canonicalized request
//!   payload, used to detect conflicting requests for the same key.
//! - [`CapturedResponse`]: Exact snapshot of the response returned for the
//!   first execution, replayed verbatim to retries.
//! - [`IdempotencyRecord`]: Durable record binding a key to its principal,
//!   fingerprint, and response snapshot.
//! - [`CacheEntry`]: Projection of a record held by the process-local and
//!   distributed caches.
//! - [`ReplayDecision`]: Outcome of comparing a stored record against an
//!   incoming request (replay, ownership conflict, or payload conflict).
//! - [`GatewayConfig`]: Environment-driven tuning for tier lifetimes, the
//!   stampede lock, and the circuit breaker.
//!
//! # Payload Canonicalization
//!
//! To ensure semantically equivalent payloads produce identical fingerprints
//! regardless of whitespace or key ordering, payloads are canonicalized
//! before hashing:
//!
//! 1. JSON objects have their keys sorted recursively; array order is kept.
//! 2. The result is serialized to compact JSON (no whitespace).
//! 3. The SHA-256 digest is computed on the resulting bytes.

mod config;
mod fingerprint;
mod key;
mod record;

pub use config::{
    GATEWAY_BREAKER_COOLDOWN_SECS_ENV, GATEWAY_BREAKER_THRESHOLD_ENV,
    GATEWAY_DISTRIBUTED_TTL_HOURS_ENV, GATEWAY_LOCAL_CAPACITY_ENV, GATEWAY_LOCAL_TTL_SECS_ENV,
    GATEWAY_LOCK_TTL_SECS_ENV, GATEWAY_RECORD_TTL_HOURS_ENV, GATEWAY_RETRY_HINT_SECS_ENV,
    GATEWAY_SWEEP_INTERVAL_SECS_ENV, GatewayConfig,
};
pub use fingerprint::{FingerprintError, PayloadFingerprint};
pub use key::{IdempotencyKey, IdempotencyKeyValidationError};
pub use record::{
    CacheEntry, CacheEntryDecodeError, CapturedResponse, IdempotencyRecord, ReplayDecision,
};

//! Idempotent mutation gateway orchestrating the response tiers.
//!
//! The gateway is the single entry point for deduplicated mutations. It
//! resolves each request against three tiers (a process-local cache, a
//! distributed cache, and the durable record store) and only executes the
//! caller-supplied mutation on a full miss, under a best-effort stampede
//! lock. Replays return the captured response verbatim.
//!
//! Failure policy: the tiers are accelerators, not correctness mechanisms.
//! Every cache, lock, or store failure is logged, counted, and absorbed;
//! the worst case is executing the mutation as if idempotency had not been
//! requested, with the mutation's own natural-key uniqueness constraint as
//! the final backstop. Only request-shape conflicts (ownership, payload,
//! in-flight) surface to the caller.

mod breaker;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig};

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use mockable::Clock;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain::ports::{
    ConflictKind, GatewayMetrics, IdempotencyStore, IdempotencyStoreError, LockAcquisition,
    MutationLock, ResponseCache, ResponseTier,
};
use crate::domain::{
    CacheEntry, CapturedResponse, Error, GatewayConfig, IdempotencyKey, IdempotencyRecord,
    PayloadFingerprint, PrincipalId, ReplayDecision,
};

/// Result of routing a mutation through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOutcome {
    /// The response to emit to the caller.
    pub response: CapturedResponse,
    /// Whether the response was served from a stored record rather than a
    /// fresh execution.
    pub replayed: bool,
}

impl GatewayOutcome {
    fn fresh(response: CapturedResponse) -> Self {
        Self {
            response,
            replayed: false,
        }
    }

    fn replayed(response: CapturedResponse) -> Self {
        Self {
            response,
            replayed: true,
        }
    }
}

/// Port bundle required by the mutation gateway.
pub struct MutationGatewayPorts {
    /// Process-local response cache (fastest tier).
    pub local: Arc<dyn ResponseCache>,
    /// Distributed response cache shared across service instances.
    pub distributed: Arc<dyn ResponseCache>,
    /// Durable idempotency record store (authoritative tier).
    pub store: Arc<dyn IdempotencyStore>,
    /// Stampede lock serializing first executions per key.
    pub lock: Arc<dyn MutationLock>,
    /// Outcome metrics sink.
    pub metrics: Arc<dyn GatewayMetrics>,
}

impl MutationGatewayPorts {
    /// Build a strongly-typed gateway port bundle.
    pub fn new(
        local: Arc<dyn ResponseCache>,
        distributed: Arc<dyn ResponseCache>,
        store: Arc<dyn IdempotencyStore>,
        lock: Arc<dyn MutationLock>,
        metrics: Arc<dyn GatewayMetrics>,
    ) -> Self {
        Self {
            local,
            distributed,
            store,
            lock,
            metrics,
        }
    }
}

/// How the stampede lock acquisition resolved.
enum LockOutcome {
    /// This request holds the lock and must release it.
    Acquired,
    /// Another request holds the lock; the caller should retry shortly.
    Held,
    /// The lock backend is degraded; execution proceeds lock-less.
    Unavailable,
}

/// Idempotent mutation gateway over the three response tiers.
///
/// Construct one per process and share it behind an `Arc`; all state is
/// internally synchronized. The circuit breaker guards both distributed
/// cache calls and lock acquisition, so a down cache backend costs one
/// admission check per request instead of a timeout.
pub struct MutationGateway {
    local: Arc<dyn ResponseCache>,
    distributed: Arc<dyn ResponseCache>,
    store: Arc<dyn IdempotencyStore>,
    lock: Arc<dyn MutationLock>,
    metrics: Arc<dyn GatewayMetrics>,
    clock: Arc<dyn Clock>,
    breaker: Mutex<CircuitBreaker>,
    config: GatewayConfig,
}

impl MutationGateway {
    /// Build a gateway from its ports, clock, and configuration.
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use backend::domain::gateway::{MutationGateway, MutationGatewayPorts};
    /// # use backend::domain::ports::{
    /// #     FixtureIdempotencyStore, NoOpGatewayMetrics, NoOpMutationLock, NoOpResponseCache,
    /// # };
    /// # use backend::domain::GatewayConfig;
    /// # use mockable::DefaultClock;
    /// let ports = MutationGatewayPorts::new(
    ///     Arc::new(NoOpResponseCache),
    ///     Arc::new(NoOpResponseCache),
    ///     Arc::new(FixtureIdempotencyStore),
    ///     Arc::new(NoOpMutationLock),
    ///     Arc::new(NoOpGatewayMetrics),
    /// );
    /// let _gateway = MutationGateway::new(ports, Arc::new(DefaultClock), GatewayConfig::default());
    /// ```
    pub fn new(ports: MutationGatewayPorts, clock: Arc<dyn Clock>, config: GatewayConfig) -> Self {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.breaker_threshold(),
            open_cooldown: config.breaker_cooldown(),
        });
        Self {
            local: ports.local,
            distributed: ports.distributed,
            store: ports.store,
            lock: ports.lock,
            metrics: ports.metrics,
            clock,
            breaker: Mutex::new(breaker),
            config,
        }
    }

    /// Execute a mutation at most once per idempotency key.
    ///
    /// Resolves the key against the tiers in order (local, distributed,
    /// durable); the first hit is replayed verbatim without running
    /// `mutation`. On a full miss the stampede lock is acquired, `mutation`
    /// runs exactly once, and its response is recorded in every tier when
    /// its status is below 500.
    ///
    /// The mutation encodes business-rule rejections as 4xx responses and
    /// its own infrastructure faults as 5xx responses; only sub-500
    /// responses are recorded, so a failed execution is retryable under the
    /// same key.
    ///
    /// # Errors
    ///
    /// - forbidden when the key is bound to a different principal;
    /// - conflict when the key was first used with a different payload, or
    ///   another request for the key is still in flight (the latter carries
    ///   a `retry_after_secs` hint in its details).
    ///
    /// Tier failures never surface here; they degrade to executing the
    /// mutation directly.
    pub async fn execute<M, Fut>(
        &self,
        key: &IdempotencyKey,
        principal: &PrincipalId,
        payload: &Value,
        mutation: M,
    ) -> Result<GatewayOutcome, Error>
    where
        M: FnOnce() -> Fut + Send,
        Fut: Future<Output = CapturedResponse> + Send,
    {
        let fingerprint = PayloadFingerprint::of(payload)
            .map_err(|error| Error::internal(format!("payload fingerprinting failed: {error}")))?;

        if let Some(entry) = self.local_lookup(key).await {
            return self
                .settle_hit(entry, principal, &fingerprint, ResponseTier::Local)
                .await;
        }

        if let Some(entry) = self.distributed_lookup(key).await {
            self.backfill_local(key, &entry).await;
            return self
                .settle_hit(entry, principal, &fingerprint, ResponseTier::Distributed)
                .await;
        }

        if let Some(record) = self.durable_lookup(key).await {
            let entry = record.to_cache_entry();
            self.backfill_distributed(key, &entry).await;
            self.backfill_local(key, &entry).await;
            return self
                .settle_hit(entry, principal, &fingerprint, ResponseTier::Durable)
                .await;
        }

        self.execute_miss(key, principal, fingerprint, mutation)
            .await
    }

    /// Delete expired records from the durable tier.
    ///
    /// Returns the number of records removed. Intended for the periodic
    /// housekeeping task; lookups already evict lazily, so sweeping bounds
    /// table growth rather than correctness.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the durable store rejects the sweep.
    pub async fn sweep_expired_records(&self) -> Result<u64, Error> {
        let now = self.clock.utc();
        self.store
            .sweep_expired(now)
            .await
            .map_err(|error| Error::internal(format!("idempotency sweep failed: {error}")))
    }

    async fn settle_hit(
        &self,
        entry: CacheEntry,
        principal: &PrincipalId,
        fingerprint: &PayloadFingerprint,
        tier: ResponseTier,
    ) -> Result<GatewayOutcome, Error> {
        match entry.decide(principal, fingerprint) {
            ReplayDecision::Replay => {
                self.record_hit(tier).await;
                Ok(GatewayOutcome::replayed(entry.response))
            }
            ReplayDecision::OwnershipConflict => {
                self.record_conflict(ConflictKind::Ownership).await;
                Err(ownership_conflict())
            }
            ReplayDecision::PayloadConflict => {
                self.record_conflict(ConflictKind::Payload).await;
                Err(payload_conflict())
            }
        }
    }

    async fn execute_miss<M, Fut>(
        &self,
        key: &IdempotencyKey,
        principal: &PrincipalId,
        fingerprint: PayloadFingerprint,
        mutation: M,
    ) -> Result<GatewayOutcome, Error>
    where
        M: FnOnce() -> Fut + Send,
        Fut: Future<Output = CapturedResponse> + Send,
    {
        let lock_held = match self.acquire_lock(key, principal).await {
            LockOutcome::Acquired => true,
            LockOutcome::Held => {
                self.record_conflict(ConflictKind::InFlight).await;
                return Err(self.in_flight_conflict());
            }
            LockOutcome::Unavailable => false,
        };

        self.record_miss().await;
        let response = mutation().await;
        let outcome = self
            .settle_execution(key, principal, fingerprint, response)
            .await;

        if lock_held {
            self.release_lock(key).await;
        }
        outcome
    }

    async fn settle_execution(
        &self,
        key: &IdempotencyKey,
        principal: &PrincipalId,
        fingerprint: PayloadFingerprint,
        response: CapturedResponse,
    ) -> Result<GatewayOutcome, Error> {
        if !response.is_storable() {
            debug!(%key, status = response.status, "not recording server-error response");
            return Ok(GatewayOutcome::fresh(response));
        }

        let now = self.clock.utc();
        let ttl_secs = i64::try_from(self.config.record_ttl().as_secs()).unwrap_or(i64::MAX);
        let record = IdempotencyRecord {
            key: key.clone(),
            principal: principal.clone(),
            fingerprint,
            response,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        };

        match self.store.insert(&record).await {
            Ok(()) => {
                let entry = record.to_cache_entry();
                self.backfill_distributed(key, &entry).await;
                self.backfill_local(key, &entry).await;
                Ok(GatewayOutcome::fresh(record.response))
            }
            Err(IdempotencyStoreError::DuplicateKey { .. }) => {
                debug!(%key, "lost idempotency insert race; deferring to the stored record");
                self.replay_race_winner(key, principal, record).await
            }
            Err(error) => {
                warn!(%key, %error, "failed to record idempotency outcome; a retry will re-execute");
                self.record_store_failure().await;
                Ok(GatewayOutcome::fresh(record.response))
            }
        }
    }

    /// Resolve a lost insert race by replaying whichever record won.
    ///
    /// Both executions completed; converging on the stored response keeps
    /// every caller of the key seeing a single canonical result. If the
    /// winner cannot be read back, our own response stands.
    async fn replay_race_winner(
        &self,
        key: &IdempotencyKey,
        principal: &PrincipalId,
        ours: IdempotencyRecord,
    ) -> Result<GatewayOutcome, Error> {
        match self.store.find(key).await {
            Ok(Some(winner)) => match winner.decide(principal, &ours.fingerprint) {
                ReplayDecision::Replay => {
                    let entry = winner.to_cache_entry();
                    self.backfill_distributed(key, &entry).await;
                    self.backfill_local(key, &entry).await;
                    self.record_hit(ResponseTier::Durable).await;
                    Ok(GatewayOutcome::replayed(winner.response))
                }
                ReplayDecision::OwnershipConflict => {
                    self.record_conflict(ConflictKind::Ownership).await;
                    Err(ownership_conflict())
                }
                ReplayDecision::PayloadConflict => {
                    self.record_conflict(ConflictKind::Payload).await;
                    Err(payload_conflict())
                }
            },
            Ok(None) => Ok(GatewayOutcome::fresh(ours.response)),
            Err(error) => {
                warn!(%key, %error, "failed to read race-winning record; returning own response");
                self.record_store_failure().await;
                Ok(GatewayOutcome::fresh(ours.response))
            }
        }
    }

    async fn local_lookup(&self, key: &IdempotencyKey) -> Option<CacheEntry> {
        match self.local.get(key).await {
            Ok(entry) => entry,
            Err(error) => {
                warn!(%key, %error, "local cache lookup failed; falling through");
                None
            }
        }
    }

    async fn distributed_lookup(&self, key: &IdempotencyKey) -> Option<CacheEntry> {
        if !self.breaker_admits() {
            self.record_fallback().await;
            return None;
        }
        match self.distributed.get(key).await {
            Ok(entry) => {
                self.breaker_success();
                entry
            }
            Err(error) => {
                self.breaker_failure();
                self.record_fallback().await;
                warn!(%key, %error, "distributed cache lookup failed; falling through");
                None
            }
        }
    }

    async fn durable_lookup(&self, key: &IdempotencyKey) -> Option<IdempotencyRecord> {
        let record = match self.store.find(key).await {
            Ok(found) => found?,
            Err(error) => {
                warn!(%key, %error, "durable record lookup failed; executing without replay protection");
                self.record_store_failure().await;
                return None;
            }
        };
        if record.is_expired(self.clock.utc()) {
            debug!(%key, "evicting expired idempotency record");
            if let Err(error) = self.store.remove(key).await {
                warn!(%key, %error, "expired record eviction failed; the sweep will retry");
            }
            return None;
        }
        Some(record)
    }

    async fn acquire_lock(&self, key: &IdempotencyKey, principal: &PrincipalId) -> LockOutcome {
        if !self.breaker_admits() {
            self.record_fallback().await;
            debug!(%key, "lock backend circuit open; executing without a stampede lock");
            return LockOutcome::Unavailable;
        }
        match self
            .lock
            .acquire(key, principal, self.config.lock_ttl())
            .await
        {
            Ok(LockAcquisition::Acquired) => {
                self.breaker_success();
                LockOutcome::Acquired
            }
            Ok(LockAcquisition::Held) => {
                self.breaker_success();
                LockOutcome::Held
            }
            Err(error) => {
                self.breaker_failure();
                warn!(%key, %error, "stampede lock unavailable; executing without it");
                LockOutcome::Unavailable
            }
        }
    }

    // Release stays outside the breaker: a held lock means the backend was
    // reachable moments ago, and a skipped release blocks the key for the
    // full TTL.
    async fn release_lock(&self, key: &IdempotencyKey) {
        if let Err(error) = self.lock.release(key).await {
            warn!(%key, %error, "stampede lock release failed; TTL expiry will reclaim it");
        }
    }

    async fn backfill_local(&self, key: &IdempotencyKey, entry: &CacheEntry) {
        if let Err(error) = self.local.put(key, entry, self.config.local_ttl()).await {
            warn!(%key, %error, "local cache backfill failed");
        }
    }

    async fn backfill_distributed(&self, key: &IdempotencyKey, entry: &CacheEntry) {
        if !self.breaker_admits() {
            self.record_fallback().await;
            return;
        }
        match self
            .distributed
            .put(key, entry, self.config.distributed_ttl())
            .await
        {
            Ok(()) => self.breaker_success(),
            Err(error) => {
                self.breaker_failure();
                warn!(%key, %error, "distributed cache backfill failed");
            }
        }
    }

    fn in_flight_conflict(&self) -> Error {
        let hint = self.config.retry_hint().as_secs();
        Error::conflict("another request with this idempotency key is in flight").with_details(
            json!({
                "reason": "request_in_flight",
                "retry_after_secs": hint,
            }),
        )
    }

    fn breaker_admits(&self) -> bool {
        let now = self.clock.utc();
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(now)
    }

    fn breaker_success(&self) {
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_success();
    }

    fn breaker_failure(&self) {
        let now = self.clock.utc();
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_failure(now);
    }

    // Metrics exporter errors never affect request handling.
    async fn record_hit(&self, tier: ResponseTier) {
        let _ = self.metrics.record_hit(tier).await;
    }

    async fn record_miss(&self) {
        let _ = self.metrics.record_miss().await;
    }

    async fn record_conflict(&self, kind: ConflictKind) {
        let _ = self.metrics.record_conflict(kind).await;
    }

    async fn record_fallback(&self) {
        let _ = self.metrics.record_fallback().await;
    }

    async fn record_store_failure(&self) {
        let _ = self.metrics.record_store_failure().await;
    }
}

fn ownership_conflict() -> Error {
    Error::forbidden("idempotency key belongs to a different principal")
}

fn payload_conflict() -> Error {
    Error::conflict("idempotency key was already used with a different payload")
}

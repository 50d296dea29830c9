//! End-to-end pipeline tests over in-memory adapters.
//!
//! Exercises the full mutation path without external backends: requests
//! enter the gateway, first executions append an outbox event alongside
//! their business effect, and the delivery worker drains the outbox to a
//! recording consumer. The fakes keep real state, so outbox rows move
//! through the same lifecycle the SQL adapter drives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use serde_json::json;
use uuid::Uuid;

use backend::domain::delivery::{DeliveryConfig, DeliveryWorker, DeliveryWorkerPorts};
use backend::domain::gateway::{MutationGateway, MutationGatewayPorts};
use backend::domain::ports::{
    EventConsumer, EventConsumerError, IdempotencyStore, IdempotencyStoreError, LockAcquisition,
    MutationLock, MutationLockError, NoOpDeliveryMetrics, NoOpGatewayMetrics, OutboxRepository,
    OutboxRepositoryError, ResponseCache, ResponseCacheError,
};
use backend::domain::{
    CacheEntry, CapturedResponse, ErrorCode, EventType, GatewayConfig, IdempotencyKey,
    IdempotencyRecord, OutboxEvent, OutboxStatus, PrincipalId,
};

/// Durable store fake with insert-if-absent semantics.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<Uuid, IdempotencyRecord>>,
    fail: AtomicBool,
}

impl MemoryStore {
    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn find(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IdempotencyStoreError::connection("store offline"));
        }
        Ok(self
            .records
            .lock()
            .expect("store mutex")
            .get(key.as_uuid())
            .cloned())
    }

    async fn insert(&self, record: &IdempotencyRecord) -> Result<(), IdempotencyStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IdempotencyStoreError::connection("store offline"));
        }
        let mut records = self.records.lock().expect("store mutex");
        if records.contains_key(record.key.as_uuid()) {
            return Err(IdempotencyStoreError::duplicate_key(record.key.to_string()));
        }
        records.insert(*record.key.as_uuid(), record.clone());
        Ok(())
    }

    async fn remove(&self, key: &IdempotencyKey) -> Result<(), IdempotencyStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IdempotencyStoreError::connection("store offline"));
        }
        self.records
            .lock()
            .expect("store mutex")
            .remove(key.as_uuid());
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, IdempotencyStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IdempotencyStoreError::connection("store offline"));
        }
        let mut records = self.records.lock().expect("store mutex");
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

/// Response cache fake with a switchable failure mode.
#[derive(Default)]
struct MemoryCache {
    entries: Mutex<HashMap<Uuid, CacheEntry>>,
    fail: AtomicBool,
}

impl MemoryCache {
    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<CacheEntry>, ResponseCacheError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ResponseCacheError::connection("cache offline"));
        }
        Ok(self
            .entries
            .lock()
            .expect("cache mutex")
            .get(key.as_uuid())
            .cloned())
    }

    async fn put(
        &self,
        key: &IdempotencyKey,
        entry: &CacheEntry,
        _ttl: Duration,
    ) -> Result<(), ResponseCacheError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ResponseCacheError::connection("cache offline"));
        }
        self.entries
            .lock()
            .expect("cache mutex")
            .insert(*key.as_uuid(), entry.clone());
        Ok(())
    }
}

/// Stampede lock fake with set-if-absent semantics.
#[derive(Default)]
struct MemoryLock {
    holders: Mutex<HashMap<Uuid, Uuid>>,
    fail: AtomicBool,
}

impl MemoryLock {
    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MutationLock for MemoryLock {
    async fn acquire(
        &self,
        key: &IdempotencyKey,
        holder: &PrincipalId,
        _ttl: Duration,
    ) -> Result<LockAcquisition, MutationLockError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MutationLockError::connection("lock backend offline"));
        }
        let mut holders = self.holders.lock().expect("lock mutex");
        if holders.contains_key(key.as_uuid()) {
            return Ok(LockAcquisition::Held);
        }
        holders.insert(*key.as_uuid(), *holder.as_uuid());
        Ok(LockAcquisition::Acquired)
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<(), MutationLockError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MutationLockError::connection("lock backend offline"));
        }
        self.holders.lock().expect("lock mutex").remove(key.as_uuid());
        Ok(())
    }
}

/// Stateful outbox fake moving rows through the worker's transitions.
#[derive(Default)]
struct MemoryOutbox {
    events: Mutex<Vec<OutboxEvent>>,
}

impl MemoryOutbox {
    fn append(&self, event: OutboxEvent) {
        self.events.lock().expect("outbox mutex").push(event);
    }

    fn snapshot(&self) -> Vec<OutboxEvent> {
        self.events.lock().expect("outbox mutex").clone()
    }

    fn by_id(&self, id: Uuid) -> Option<OutboxEvent> {
        self.snapshot().into_iter().find(|event| event.id == id)
    }

    fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut OutboxEvent),
    ) -> Result<(), OutboxRepositoryError> {
        let mut events = self.events.lock().expect("outbox mutex");
        let event = events
            .iter_mut()
            .find(|event| event.id == id)
            .ok_or_else(|| OutboxRepositoryError::query(format!("no outbox row {id}")))?;
        apply(event);
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for MemoryOutbox {
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, OutboxRepositoryError> {
        let mut events = self.events.lock().expect("outbox mutex");
        let mut due: Vec<&mut OutboxEvent> =
            events.iter_mut().filter(|event| event.is_due(now)).collect();
        due.sort_by_key(|event| event.created_at);

        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut claimed = Vec::new();
        for event in due.into_iter().take(limit) {
            event.status = OutboxStatus::Processing;
            event.updated_at = now;
            claimed.push(event.clone());
        }
        Ok(claimed)
    }

    async fn mark_delivered(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), OutboxRepositoryError> {
        self.update(id, |event| {
            event.status = OutboxStatus::Delivered;
            event.processed_at = Some(processed_at);
            event.updated_at = processed_at;
        })
    }

    async fn mark_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), OutboxRepositoryError> {
        self.update(id, |event| {
            event.status = OutboxStatus::Pending;
            event.retry_count = retry_count;
            event.next_retry_at = next_retry_at;
            event.last_error = Some(error.to_owned());
        })
    }

    async fn mark_dead_letter(&self, id: Uuid, error: &str) -> Result<(), OutboxRepositoryError> {
        self.update(id, |event| {
            event.status = OutboxStatus::DeadLetter;
            event.last_error = Some(error.to_owned());
        })
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), OutboxRepositoryError> {
        self.update(id, |event| {
            event.status = OutboxStatus::Failed;
            event.last_error = Some(error.to_owned());
        })
    }
}

/// Consumer recording deliveries, optionally refusing the first N attempts.
struct RecordingConsumer {
    consumed: Mutex<Vec<Uuid>>,
    failures_remaining: AtomicUsize,
}

impl RecordingConsumer {
    fn reliable() -> Self {
        Self {
            consumed: Mutex::new(Vec::new()),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    fn always_failing() -> Self {
        Self {
            consumed: Mutex::new(Vec::new()),
            failures_remaining: AtomicUsize::new(usize::MAX),
        }
    }

    fn failing_first(attempts: usize) -> Self {
        Self {
            consumed: Mutex::new(Vec::new()),
            failures_remaining: AtomicUsize::new(attempts),
        }
    }

    fn consumed(&self) -> Vec<Uuid> {
        self.consumed.lock().expect("consumer mutex").clone()
    }
}

#[async_trait]
impl EventConsumer for RecordingConsumer {
    async fn consume(&self, event: &OutboxEvent) -> Result<(), EventConsumerError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining
                .store(remaining.saturating_sub(1), Ordering::SeqCst);
            return Err(EventConsumerError::unreachable("consumer endpoint offline"));
        }
        self.consumed.lock().expect("consumer mutex").push(event.id);
        Ok(())
    }
}

/// Clock whose reading can be moved mid-test.
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().expect("clock mutex") = now;
    }

    fn advance(&self, delta: chrono::Duration) {
        let mut now = self.0.lock().expect("clock mutex");
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex")
    }
}

struct Pipeline {
    gateway: Arc<MutationGateway>,
    worker: DeliveryWorker,
    local: Arc<MemoryCache>,
    distributed: Arc<MemoryCache>,
    store: Arc<MemoryStore>,
    lock: Arc<MemoryLock>,
    outbox: Arc<MemoryOutbox>,
    consumer: Arc<RecordingConsumer>,
    clock: Arc<ManualClock>,
}

fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

fn pipeline_with_consumer(consumer: RecordingConsumer) -> Pipeline {
    let local = Arc::new(MemoryCache::default());
    let distributed = Arc::new(MemoryCache::default());
    let store = Arc::new(MemoryStore::default());
    let lock = Arc::new(MemoryLock::default());
    let outbox = Arc::new(MemoryOutbox::default());
    let consumer = Arc::new(consumer);
    let clock = Arc::new(ManualClock::at(fixture_timestamp()));

    let ports = MutationGatewayPorts::new(
        Arc::clone(&local) as Arc<dyn ResponseCache>,
        Arc::clone(&distributed) as Arc<dyn ResponseCache>,
        Arc::clone(&store) as Arc<dyn IdempotencyStore>,
        Arc::clone(&lock) as Arc<dyn MutationLock>,
        Arc::new(NoOpGatewayMetrics),
    );
    let gateway = Arc::new(MutationGateway::new(
        ports,
        Arc::clone(&clock) as Arc<dyn Clock>,
        GatewayConfig::default(),
    ));

    let worker = DeliveryWorker::new(
        DeliveryWorkerPorts::new(
            Arc::clone(&outbox) as Arc<dyn OutboxRepository>,
            Arc::new(NoOpDeliveryMetrics),
        ),
        Arc::clone(&clock) as Arc<dyn Clock>,
        DeliveryConfig::default(),
    )
    .register(
        EventType::BookingCreated,
        Arc::clone(&consumer) as Arc<dyn EventConsumer>,
    );

    Pipeline {
        gateway,
        worker,
        local,
        distributed,
        store,
        lock,
        outbox,
        consumer,
        clock,
    }
}

fn pipeline() -> Pipeline {
    pipeline_with_consumer(RecordingConsumer::reliable())
}

/// A mutation in the booking slice's shape: one business effect plus one
/// outbox event, atomically.
async fn booking_mutation(
    outbox: Arc<MemoryOutbox>,
    executions: Arc<AtomicUsize>,
    now: DateTime<Utc>,
) -> CapturedResponse {
    executions.fetch_add(1, Ordering::SeqCst);
    let event = OutboxEvent::new(
        "booking",
        Uuid::new_v4(),
        EventType::BookingCreated,
        json!({"bookingId": Uuid::new_v4()}),
        now,
    );
    outbox.append(event);
    CapturedResponse::json(201, r#"{"status":"confirmed"}"#)
}

#[tokio::test]
async fn replayed_requests_run_the_mutation_once() {
    let pipeline = pipeline();
    let key = IdempotencyKey::random();
    let principal = PrincipalId::random();
    let payload = json!({"listingId": Uuid::new_v4(), "checkIn": "2025-07-04"});
    let executions = Arc::new(AtomicUsize::new(0));
    let now = pipeline.clock.utc();

    let first = pipeline
        .gateway
        .execute(&key, &principal, &payload, || {
            booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now)
        })
        .await
        .expect("first execution should succeed");
    let second = pipeline
        .gateway
        .execute(&key, &principal, &payload, || {
            booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now)
        })
        .await
        .expect("replay should succeed");

    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.response, first.response);
    assert_eq!(pipeline.outbox.snapshot().len(), 1, "one event per mutation");
}

#[tokio::test]
async fn payload_reuse_conflicts_without_touching_the_outbox() {
    let pipeline = pipeline();
    let key = IdempotencyKey::random();
    let principal = PrincipalId::random();
    let executions = Arc::new(AtomicUsize::new(0));
    let now = pipeline.clock.utc();

    pipeline
        .gateway
        .execute(
            &key,
            &principal,
            &json!({"listingId": "a", "checkIn": "2025-07-04"}),
            || booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now),
        )
        .await
        .expect("first execution should succeed");
    let error = pipeline
        .gateway
        .execute(
            &key,
            &principal,
            &json!({"listingId": "b", "checkIn": "2025-07-05"}),
            || booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now),
        )
        .await
        .expect_err("payload reuse should conflict");

    assert_eq!(error.code(), ErrorCode::Conflict);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.outbox.snapshot().len(), 1);
}

#[tokio::test]
async fn foreign_principal_replay_is_forbidden() {
    let pipeline = pipeline();
    let key = IdempotencyKey::random();
    let owner = PrincipalId::random();
    let intruder = PrincipalId::random();
    let payload = json!({"listingId": Uuid::new_v4()});
    let executions = Arc::new(AtomicUsize::new(0));
    let now = pipeline.clock.utc();

    pipeline
        .gateway
        .execute(&key, &owner, &payload, || {
            booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now)
        })
        .await
        .expect("first execution should succeed");
    let error = pipeline
        .gateway
        .execute(&key, &intruder, &payload, || {
            booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now)
        })
        .await
        .expect_err("foreign principal should be rejected");

    assert_eq!(error.code(), ErrorCode::Forbidden);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stampeding_requests_execute_the_mutation_exactly_once() {
    let pipeline = pipeline();
    let key = IdempotencyKey::random();
    let principal = PrincipalId::random();
    let payload = json!({"listingId": Uuid::new_v4(), "checkIn": "2025-07-04"});
    let executions = Arc::new(AtomicUsize::new(0));
    let now = pipeline.clock.utc();

    let slow_mutation = || {
        let outbox = Arc::clone(&pipeline.outbox);
        let executions = Arc::clone(&executions);
        async move {
            executions.fetch_add(1, Ordering::SeqCst);
            // Hold the lock long enough for the rivals to collide with it.
            tokio::time::sleep(Duration::from_millis(50)).await;
            let event = OutboxEvent::new(
                "booking",
                Uuid::new_v4(),
                EventType::BookingCreated,
                json!({"bookingId": Uuid::new_v4()}),
                now,
            );
            outbox.append(event);
            CapturedResponse::json(201, r#"{"status":"confirmed"}"#)
        }
    };

    let (first, second, third) = tokio::join!(
        pipeline.gateway.execute(&key, &principal, &payload, slow_mutation),
        pipeline.gateway.execute(&key, &principal, &payload, slow_mutation),
        pipeline.gateway.execute(&key, &principal, &payload, slow_mutation),
    );

    let outcomes = [first, second, third];
    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| {
            outcome
                .as_ref()
                .is_err_and(|error| error.code() == ErrorCode::Conflict)
        })
        .count();

    assert_eq!(executions.load(Ordering::SeqCst), 1, "winner runs alone");
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 2, "losers are told to retry");
    assert_eq!(pipeline.outbox.snapshot().len(), 1);

    // Losers retrying after the winner finishes get the recorded replay.
    let replay = pipeline
        .gateway
        .execute(&key, &principal, &payload, slow_mutation)
        .await
        .expect("retry should replay");
    assert!(replay.replayed);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn in_flight_conflicts_carry_a_retry_hint() {
    let pipeline = pipeline();
    let key = IdempotencyKey::random();
    let principal = PrincipalId::random();
    let payload = json!({"listingId": Uuid::new_v4()});

    // Simulate a rival's in-progress execution by holding the lock.
    let acquisition = pipeline
        .lock
        .acquire(&key, &principal, Duration::from_secs(30))
        .await
        .expect("lock fake should acquire");
    assert!(matches!(acquisition, LockAcquisition::Acquired));

    let error = pipeline
        .gateway
        .execute(&key, &principal, &payload, || async {
            CapturedResponse::json(201, "{}")
        })
        .await
        .expect_err("held lock should conflict");

    assert_eq!(error.code(), ErrorCode::Conflict);
    let hint = error
        .details()
        .and_then(|details| details.get("retry_after_secs"))
        .and_then(serde_json::Value::as_u64);
    assert!(hint.is_some(), "conflict should carry a retry hint");
}

#[tokio::test]
async fn cache_outages_degrade_to_the_durable_store() {
    let pipeline = pipeline();
    let key = IdempotencyKey::random();
    let principal = PrincipalId::random();
    let payload = json!({"listingId": Uuid::new_v4()});
    let executions = Arc::new(AtomicUsize::new(0));
    let now = pipeline.clock.utc();

    pipeline.local.set_failing(true);
    pipeline.distributed.set_failing(true);
    pipeline.lock.set_failing(true);

    let first = pipeline
        .gateway
        .execute(&key, &principal, &payload, || {
            booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now)
        })
        .await
        .expect("execution should proceed lock-less");
    let second = pipeline
        .gateway
        .execute(&key, &principal, &payload, || {
            booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now)
        })
        .await
        .expect("replay should come from the durable store");

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.outbox.snapshot().len(), 1);
}

#[tokio::test]
async fn full_outage_degrades_to_best_effort_execution() {
    let pipeline = pipeline();
    let key = IdempotencyKey::random();
    let principal = PrincipalId::random();
    let payload = json!({"listingId": Uuid::new_v4()});
    let executions = Arc::new(AtomicUsize::new(0));
    let now = pipeline.clock.utc();

    pipeline.local.set_failing(true);
    pipeline.distributed.set_failing(true);
    pipeline.lock.set_failing(true);
    pipeline.store.set_failing(true);

    let first = pipeline
        .gateway
        .execute(&key, &principal, &payload, || {
            booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now)
        })
        .await
        .expect("mutation should run despite the outage");

    // With nothing recorded anywhere, the retry executes again; the
    // natural-key constraint in storage is what rejects the duplicate,
    // surfacing as a captured 409 with no second event.
    let retries = Arc::clone(&executions);
    let second = pipeline
        .gateway
        .execute(&key, &principal, &payload, move || async move {
            retries.fetch_add(1, Ordering::SeqCst);
            CapturedResponse::json(409, r#"{"code":"conflict"}"#)
        })
        .await
        .expect("duplicate should surface the storage conflict");

    assert_eq!(first.response.status, 201);
    assert_eq!(second.response.status, 409);
    assert!(!second.replayed);
    assert_eq!(executions.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.outbox.snapshot().len(), 1);
}

#[tokio::test]
async fn committed_events_flow_to_the_registered_consumer() {
    let pipeline = pipeline();
    let key = IdempotencyKey::random();
    let principal = PrincipalId::random();
    let payload = json!({"listingId": Uuid::new_v4()});
    let executions = Arc::new(AtomicUsize::new(0));
    let now = pipeline.clock.utc();

    pipeline
        .gateway
        .execute(&key, &principal, &payload, || {
            booking_mutation(Arc::clone(&pipeline.outbox), Arc::clone(&executions), now)
        })
        .await
        .expect("mutation should succeed");

    let pass = pipeline
        .worker
        .process_batch()
        .await
        .expect("delivery pass should succeed");

    assert_eq!(pass.claimed, 1);
    assert_eq!(pass.delivered, 1);
    let events = pipeline.outbox.snapshot();
    assert_eq!(pipeline.consumer.consumed(), vec![events[0].id]);
    assert_eq!(events[0].status, OutboxStatus::Delivered);
    assert_eq!(events[0].processed_at, Some(pipeline.clock.utc()));

    // Delivered rows are never claimed again.
    pipeline.clock.advance(chrono::Duration::hours(1));
    let idle = pipeline
        .worker
        .process_batch()
        .await
        .expect("idle pass should succeed");
    assert_eq!(idle.claimed, 0);
}

#[tokio::test]
async fn transient_failures_retry_with_growing_backoff_until_delivered() {
    let pipeline = pipeline_with_consumer(RecordingConsumer::failing_first(2));
    let now = pipeline.clock.utc();
    let event = OutboxEvent::new(
        "booking",
        Uuid::new_v4(),
        EventType::BookingCreated,
        json!({"bookingId": Uuid::new_v4()}),
        now,
    );
    let event_id = event.id;
    pipeline.outbox.append(event);

    // First attempt fails: rescheduled 60s out (base delay).
    let pass = pipeline.worker.process_batch().await.expect("first pass");
    assert_eq!((pass.claimed, pass.retried), (1, 1));
    let row = pipeline.outbox.by_id(event_id).expect("row should exist");
    assert_eq!(row.status, OutboxStatus::Pending);
    assert_eq!(row.retry_count, 1);
    assert_eq!(row.next_retry_at, now + chrono::Duration::seconds(60));

    // Not yet due: nothing to claim.
    pipeline.clock.advance(chrono::Duration::seconds(30));
    let idle = pipeline.worker.process_batch().await.expect("idle pass");
    assert_eq!(idle.claimed, 0);

    // Second attempt fails: the delay quadruples.
    pipeline.clock.set(row.next_retry_at);
    let pass = pipeline.worker.process_batch().await.expect("second pass");
    assert_eq!((pass.claimed, pass.retried), (1, 1));
    let row = pipeline.outbox.by_id(event_id).expect("row should exist");
    assert_eq!(row.retry_count, 2);
    assert_eq!(
        row.next_retry_at,
        pipeline.clock.utc() + chrono::Duration::seconds(240)
    );

    // Third attempt succeeds.
    pipeline.clock.set(row.next_retry_at);
    let pass = pipeline.worker.process_batch().await.expect("third pass");
    assert_eq!((pass.claimed, pass.delivered), (1, 1));
    let row = pipeline.outbox.by_id(event_id).expect("row should exist");
    assert_eq!(row.status, OutboxStatus::Delivered);
    assert_eq!(pipeline.consumer.consumed(), vec![event_id]);
}

#[tokio::test]
async fn exhausted_retry_budgets_park_events_as_dead_letters() {
    let pipeline = pipeline_with_consumer(RecordingConsumer::always_failing());
    let now = pipeline.clock.utc();
    let event = OutboxEvent::new(
        "booking",
        Uuid::new_v4(),
        EventType::BookingCreated,
        json!({"bookingId": Uuid::new_v4()}),
        now,
    );
    let event_id = event.id;
    let max_retries = event.max_retries;
    pipeline.outbox.append(event);

    // Burn the whole retry budget, then one final attempt dead-letters.
    for attempt in 1..=max_retries {
        let pass = pipeline.worker.process_batch().await.expect("retry pass");
        assert_eq!(pass.retried, 1, "attempt {attempt} should reschedule");
        let row = pipeline.outbox.by_id(event_id).expect("row should exist");
        assert_eq!(row.retry_count, attempt);
        pipeline.clock.set(row.next_retry_at);
    }
    let pass = pipeline.worker.process_batch().await.expect("final pass");
    assert_eq!(pass.dead_lettered, 1);

    let row = pipeline.outbox.by_id(event_id).expect("row should exist");
    assert_eq!(row.status, OutboxStatus::DeadLetter);
    assert!(
        row.last_error
            .as_deref()
            .is_some_and(|error| error.contains("offline")),
        "dead letter should keep the final failure reason"
    );
    assert!(pipeline.consumer.consumed().is_empty());

    // Dead letters are out of the claim set for good.
    pipeline.clock.advance(chrono::Duration::days(1));
    let idle = pipeline.worker.process_batch().await.expect("idle pass");
    assert_eq!(idle.claimed, 0);
}

#[tokio::test]
async fn events_without_a_registered_consumer_park_as_failed() {
    let pipeline = pipeline();
    let now = pipeline.clock.utc();
    let orphan = OutboxEvent::new(
        "booking",
        Uuid::new_v4(),
        EventType::BookingStatusChanged,
        json!({"status": "cancelled"}),
        now,
    );
    let orphan_id = orphan.id;
    pipeline.outbox.append(orphan);

    let pass = pipeline
        .worker
        .process_batch()
        .await
        .expect("pass should succeed");

    assert_eq!(pass.unroutable, 1);
    let row = pipeline.outbox.by_id(orphan_id).expect("row should exist");
    assert_eq!(row.status, OutboxStatus::Failed);
    assert!(
        row.last_error
            .as_deref()
            .is_some_and(|error| error.contains("booking_status_changed")),
        "parked events should name the unroutable type"
    );
    assert_eq!(row.retry_count, 0, "no retry budget is burned");
}

//! Booking API handlers.
//!
//! ```text
//! POST /api/v1/bookings {"listingId":"3fa85f64-5717-4562-b3fc-2c963f66afa6","checkIn":"2025-07-01","checkOut":"2025-07-04"}
//! ```
//!
//! The handler runs the booking mutation through the gateway, so identical
//! retries replay the captured response instead of re-executing.

use actix_web::{HttpRequest, HttpResponse, post, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Booking, BookingRequest, BookingStatus, CapturedResponse, Error};
use crate::inbound::http::ApiResult;
use crate::inbound::http::error::captured_error;
use crate::inbound::http::idempotency::{require_idempotency_key, respond_with_outcome};
use crate::inbound::http::principal::require_principal;
use crate::inbound::http::state::HttpState;

/// Response body for a created booking.
///
/// Serialized once when the booking is created; replays return the captured
/// text verbatim.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    /// Server-assigned booking identifier.
    #[schema(example = "7c9e6679-7425-40de-944b-e07fc1f90ae7")]
    pub id: Uuid,
    /// Listing that was booked.
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    pub listing_id: Uuid,
    /// Principal who made the booking.
    #[schema(value_type = String, example = "ff6f2a4c-1c4e-4dab-ae52-1f3cbd7c9c8a")]
    pub guest_id: String,
    /// First night of the stay.
    #[schema(value_type = String, example = "2025-07-01")]
    pub check_in: NaiveDate,
    /// Day of departure (exclusive).
    #[schema(value_type = String, example = "2025-07-04")]
    pub check_out: NaiveDate,
    /// Lifecycle state.
    #[schema(value_type = String, example = "confirmed")]
    pub status: BookingStatus,
    /// When the booking was created.
    #[schema(value_type = String, example = "2025-06-01T12:00:00Z")]
    pub created_at: DateTime<Utc>,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        Self {
            id: *booking.id.as_uuid(),
            listing_id: booking.listing_id,
            guest_id: booking.guest_id.to_string(),
            check_in: booking.check_in,
            check_out: booking.check_out,
            status: booking.status,
            created_at: booking.created_at,
        }
    }
}

/// Create a booking, deduplicated by the idempotency key.
///
/// The raw JSON payload is fingerprinted before parsing so key reuse with a
/// different body is detected even when both bodies parse to the same
/// request.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = BookingRequest,
    params(
        (
            "Idempotency-Key" = String,
            Header,
            description = "Client-generated v4 UUID deduplicating this mutation"
        ),
        (
            "X-Principal-Id" = String,
            Header,
            description = "Caller identity injected by the edge proxy"
        ),
    ),
    responses(
        (
            status = 201,
            description = "Booking created",
            body = BookingResponse,
            headers(
                (
                    "Idempotency-Replayed" = String,
                    description = "`true` when the response was replayed from a stored record"
                )
            )
        ),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Missing or invalid principal", body = Error),
        (status = 403, description = "Idempotency key owned by another principal", body = Error),
        (
            status = 409,
            description = "Payload conflict, in-flight duplicate, or double booking",
            body = Error
        ),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["bookings"],
    operation_id = "createBooking",
    security([])
)]
#[post("/bookings")]
pub async fn create_booking(
    state: web::Data<HttpState>,
    request: HttpRequest,
    payload: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    let key = require_idempotency_key(request.headers())?;
    let principal = require_principal(request.headers())?;
    let payload = payload.into_inner();
    let booking_request = parse_booking_request(&payload)?;

    let service = state.bookings.clone();
    let guest = principal.clone();
    let outcome = state
        .gateway
        .execute(&key, &principal, &payload, move || async move {
            match service.create_booking(&guest, booking_request).await {
                Ok(booking) => created_response(&booking),
                Err(error) => captured_error(&error),
            }
        })
        .await?;

    Ok(respond_with_outcome(outcome))
}

fn parse_booking_request(payload: &Value) -> Result<BookingRequest, Error> {
    serde_json::from_value(payload.clone())
        .map_err(|error| Error::invalid_request(format!("invalid booking request: {error}")))
}

fn created_response(booking: &Booking) -> CapturedResponse {
    match serde_json::to_string(&BookingResponse::from(booking)) {
        Ok(body) => CapturedResponse::json(201, body),
        Err(error) => captured_error(&Error::internal(format!(
            "booking response serialization failed: {error}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test, web};
    use mockable::{Clock, DefaultClock};
    use serde_json::json;

    use super::*;
    use crate::domain::ports::{
        BookingRepository, BookingRepositoryError, IdempotencyStore, IdempotencyStoreError,
        LockAcquisition, MutationLock, MutationLockError, NoOpGatewayMetrics, NoOpMutationLock,
        NoOpResponseCache,
    };
    use crate::domain::{
        GatewayConfig, IdempotencyKey, IdempotencyRecord, MutationGateway, MutationGatewayPorts,
        OutboxEvent, PrincipalId,
    };
    use crate::inbound::http::idempotency::{IDEMPOTENCY_KEY_HEADER, IDEMPOTENCY_REPLAYED_HEADER};
    use crate::inbound::http::principal::PRINCIPAL_ID_HEADER;

    const PRINCIPAL: &str = "ff6f2a4c-1c4e-4dab-ae52-1f3cbd7c9c8a";
    const OTHER_PRINCIPAL: &str = "0b9f4ce2-93ab-4c08-9d66-57f6e7ecb0d7";

    /// In-memory durable tier with real duplicate-key semantics.
    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<Uuid, IdempotencyRecord>>,
    }

    #[async_trait::async_trait]
    impl IdempotencyStore for MemoryStore {
        async fn find(
            &self,
            key: &IdempotencyKey,
        ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError> {
            Ok(self
                .records
                .lock()
                .expect("store lock")
                .get(key.as_uuid())
                .cloned())
        }

        async fn insert(&self, record: &IdempotencyRecord) -> Result<(), IdempotencyStoreError> {
            let mut records = self.records.lock().expect("store lock");
            if records.contains_key(record.key.as_uuid()) {
                return Err(IdempotencyStoreError::duplicate_key(record.key.as_ref()));
            }
            records.insert(*record.key.as_uuid(), record.clone());
            Ok(())
        }

        async fn remove(&self, key: &IdempotencyKey) -> Result<(), IdempotencyStoreError> {
            self.records
                .lock()
                .expect("store lock")
                .remove(key.as_uuid());
            Ok(())
        }

        async fn sweep_expired(
            &self,
            now: chrono::DateTime<Utc>,
        ) -> Result<u64, IdempotencyStoreError> {
            let mut records = self.records.lock().expect("store lock");
            let before = records.len();
            records.retain(|_, record| record.expires_at > now);
            Ok((before - records.len()) as u64)
        }
    }

    /// Booking repository counting executions and optionally conflicting.
    #[derive(Default)]
    struct RecordingRepository {
        creates: AtomicUsize,
        duplicate: AtomicBool,
    }

    impl RecordingRepository {
        fn creates(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }

        fn set_duplicate(&self) {
            self.duplicate.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl BookingRepository for RecordingRepository {
        async fn create_with_event(
            &self,
            _booking: &Booking,
            _event: &OutboxEvent,
        ) -> Result<(), BookingRepositoryError> {
            if self.duplicate.load(Ordering::SeqCst) {
                return Err(BookingRepositoryError::duplicate_booking(
                    "listing already booked for this check-in",
                ));
            }
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Lock that always reports another holder.
    struct HeldLock;

    #[async_trait::async_trait]
    impl MutationLock for HeldLock {
        async fn acquire(
            &self,
            _key: &IdempotencyKey,
            _holder: &PrincipalId,
            _ttl: std::time::Duration,
        ) -> Result<LockAcquisition, MutationLockError> {
            Ok(LockAcquisition::Held)
        }

        async fn release(&self, _key: &IdempotencyKey) -> Result<(), MutationLockError> {
            Ok(())
        }
    }

    fn test_state(
        repository: Arc<RecordingRepository>,
        lock: Arc<dyn MutationLock>,
    ) -> web::Data<HttpState> {
        let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
        let ports = MutationGatewayPorts::new(
            Arc::new(NoOpResponseCache),
            Arc::new(NoOpResponseCache),
            Arc::new(MemoryStore::default()),
            lock,
            Arc::new(NoOpGatewayMetrics),
        );
        let gateway = Arc::new(MutationGateway::new(
            ports,
            clock.clone(),
            GatewayConfig::default(),
        ));
        let bookings = crate::domain::BookingService::new(repository, clock);
        web::Data::new(HttpState::new(gateway, bookings))
    }

    fn test_app(
        state: web::Data<HttpState>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(state)
            .service(web::scope("/api/v1").service(create_booking))
    }

    fn booking_payload() -> Value {
        json!({
            "listingId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "checkIn": "2025-07-01",
            "checkOut": "2025-07-04",
        })
    }

    fn post_booking(key: &str, principal: &str, payload: &Value) -> actix_test::TestRequest {
        actix_test::TestRequest::post()
            .uri("/api/v1/bookings")
            .insert_header((IDEMPOTENCY_KEY_HEADER, key))
            .insert_header((PRINCIPAL_ID_HEADER, principal))
            .set_json(payload)
    }

    fn fresh_key() -> String {
        Uuid::new_v4().to_string()
    }

    #[actix_web::test]
    async fn creates_a_booking_and_returns_201() {
        let repository = Arc::new(RecordingRepository::default());
        let state = test_state(repository.clone(), Arc::new(NoOpMutationLock));
        let app = actix_test::init_service(test_app(state)).await;

        let response = actix_test::call_service(
            &app,
            post_booking(&fresh_key(), PRINCIPAL, &booking_payload()).to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(
            !response.headers().contains_key(IDEMPOTENCY_REPLAYED_HEADER),
            "a fresh execution must not carry the replay marker"
        );
        let body = actix_test::read_body(response).await;
        let value: Value = serde_json::from_slice(&body).expect("booking JSON");
        assert_eq!(
            value.get("listingId").and_then(Value::as_str),
            Some("3fa85f64-5717-4562-b3fc-2c963f66afa6")
        );
        assert_eq!(value.get("guestId").and_then(Value::as_str), Some(PRINCIPAL));
        assert_eq!(
            value.get("status").and_then(Value::as_str),
            Some("confirmed")
        );
        let id = value.get("id").and_then(Value::as_str).expect("id");
        Uuid::parse_str(id).expect("id is a UUID");
        assert_eq!(repository.creates(), 1);
    }

    #[actix_web::test]
    async fn identical_retries_replay_without_re_executing() {
        let repository = Arc::new(RecordingRepository::default());
        let state = test_state(repository.clone(), Arc::new(NoOpMutationLock));
        let app = actix_test::init_service(test_app(state)).await;
        let key = fresh_key();
        let payload = booking_payload();

        let first = actix_test::call_service(
            &app,
            post_booking(&key, PRINCIPAL, &payload).to_request(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let first_body = actix_test::read_body(first).await;

        let second = actix_test::call_service(
            &app,
            post_booking(&key, PRINCIPAL, &payload).to_request(),
        )
        .await;
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(
            second
                .headers()
                .get(IDEMPOTENCY_REPLAYED_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("true")
        );
        let second_body = actix_test::read_body(second).await;

        assert_eq!(first_body, second_body, "replays must be byte-identical");
        assert_eq!(repository.creates(), 1, "the mutation must run exactly once");
    }

    #[actix_web::test]
    async fn key_order_in_the_payload_does_not_break_replay() {
        let repository = Arc::new(RecordingRepository::default());
        let state = test_state(repository.clone(), Arc::new(NoOpMutationLock));
        let app = actix_test::init_service(test_app(state)).await;
        let key = fresh_key();

        let first = actix_test::call_service(
            &app,
            post_booking(&key, PRINCIPAL, &booking_payload()).to_request(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::CREATED);

        let reordered = json!({
            "checkOut": "2025-07-04",
            "checkIn": "2025-07-01",
            "listingId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
        });
        let second = actix_test::call_service(
            &app,
            post_booking(&key, PRINCIPAL, &reordered).to_request(),
        )
        .await;

        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(repository.creates(), 1);
    }

    #[actix_web::test]
    async fn missing_idempotency_key_is_rejected() {
        let state = test_state(
            Arc::new(RecordingRepository::default()),
            Arc::new(NoOpMutationLock),
        );
        let app = actix_test::init_service(test_app(state)).await;

        let request = actix_test::TestRequest::post()
            .uri("/api/v1/bookings")
            .insert_header((PRINCIPAL_ID_HEADER, PRINCIPAL))
            .set_json(booking_payload())
            .to_request();
        let response = actix_test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value: Value = serde_json::from_slice(&actix_test::read_body(response).await)
            .expect("error payload");
        assert_eq!(
            value.get("code").and_then(Value::as_str),
            Some("invalid_request")
        );
    }

    #[actix_web::test]
    async fn missing_principal_is_unauthorized() {
        let state = test_state(
            Arc::new(RecordingRepository::default()),
            Arc::new(NoOpMutationLock),
        );
        let app = actix_test::init_service(test_app(state)).await;

        let request = actix_test::TestRequest::post()
            .uri("/api/v1/bookings")
            .insert_header((IDEMPOTENCY_KEY_HEADER, fresh_key()))
            .set_json(booking_payload())
            .to_request();
        let response = actix_test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let value: Value = serde_json::from_slice(&actix_test::read_body(response).await)
            .expect("error payload");
        assert_eq!(
            value.get("code").and_then(Value::as_str),
            Some("unauthorized")
        );
    }

    #[actix_web::test]
    async fn reusing_a_key_with_a_different_payload_conflicts() {
        let repository = Arc::new(RecordingRepository::default());
        let state = test_state(repository.clone(), Arc::new(NoOpMutationLock));
        let app = actix_test::init_service(test_app(state)).await;
        let key = fresh_key();

        let first = actix_test::call_service(
            &app,
            post_booking(&key, PRINCIPAL, &booking_payload()).to_request(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::CREATED);

        let different = json!({
            "listingId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "checkIn": "2025-08-01",
            "checkOut": "2025-08-04",
        });
        let second = actix_test::call_service(
            &app,
            post_booking(&key, PRINCIPAL, &different).to_request(),
        )
        .await;

        assert_eq!(second.status(), StatusCode::CONFLICT);
        let value: Value = serde_json::from_slice(&actix_test::read_body(second).await)
            .expect("error payload");
        assert_eq!(value.get("code").and_then(Value::as_str), Some("conflict"));
        assert_eq!(repository.creates(), 1);
    }

    #[actix_web::test]
    async fn reusing_a_key_as_another_principal_is_forbidden() {
        let repository = Arc::new(RecordingRepository::default());
        let state = test_state(repository.clone(), Arc::new(NoOpMutationLock));
        let app = actix_test::init_service(test_app(state)).await;
        let key = fresh_key();
        let payload = booking_payload();

        let first = actix_test::call_service(
            &app,
            post_booking(&key, PRINCIPAL, &payload).to_request(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = actix_test::call_service(
            &app,
            post_booking(&key, OTHER_PRINCIPAL, &payload).to_request(),
        )
        .await;

        assert_eq!(second.status(), StatusCode::FORBIDDEN);
        let value: Value = serde_json::from_slice(&actix_test::read_body(second).await)
            .expect("error payload");
        assert_eq!(value.get("code").and_then(Value::as_str), Some("forbidden"));
        assert_eq!(repository.creates(), 1);
    }

    #[actix_web::test]
    async fn double_bookings_surface_as_conflicts() {
        let repository = Arc::new(RecordingRepository::default());
        repository.set_duplicate();
        let state = test_state(repository.clone(), Arc::new(NoOpMutationLock));
        let app = actix_test::init_service(test_app(state)).await;

        let response = actix_test::call_service(
            &app,
            post_booking(&fresh_key(), PRINCIPAL, &booking_payload()).to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let value: Value = serde_json::from_slice(&actix_test::read_body(response).await)
            .expect("error payload");
        assert_eq!(value.get("code").and_then(Value::as_str), Some("conflict"));
        assert_eq!(repository.creates(), 0);
    }

    #[actix_web::test]
    async fn in_flight_duplicates_conflict_with_a_retry_hint() {
        let repository = Arc::new(RecordingRepository::default());
        let state = test_state(repository.clone(), Arc::new(HeldLock));
        let app = actix_test::init_service(test_app(state)).await;

        let response = actix_test::call_service(
            &app,
            post_booking(&fresh_key(), PRINCIPAL, &booking_payload()).to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let value: Value = serde_json::from_slice(&actix_test::read_body(response).await)
            .expect("error payload");
        assert_eq!(value.get("code").and_then(Value::as_str), Some("conflict"));
        let details = value
            .get("details")
            .and_then(Value::as_object)
            .expect("details present");
        assert_eq!(
            details.get("reason").and_then(Value::as_str),
            Some("request_in_flight")
        );
        assert!(details.get("retryAfterSecs").is_none(), "hint is snake_case");
        assert!(
            details
                .get("retry_after_secs")
                .and_then(Value::as_u64)
                .is_some()
        );
        assert_eq!(repository.creates(), 0, "a held lock must block execution");
    }

    #[actix_web::test]
    async fn malformed_payloads_are_rejected_before_execution() {
        let repository = Arc::new(RecordingRepository::default());
        let state = test_state(repository.clone(), Arc::new(NoOpMutationLock));
        let app = actix_test::init_service(test_app(state)).await;

        let incomplete = json!({ "listingId": "3fa85f64-5717-4562-b3fc-2c963f66afa6" });
        let response = actix_test::call_service(
            &app,
            post_booking(&fresh_key(), PRINCIPAL, &incomplete).to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value: Value = serde_json::from_slice(&actix_test::read_body(response).await)
            .expect("error payload");
        assert_eq!(
            value.get("code").and_then(Value::as_str),
            Some("invalid_request")
        );
        assert_eq!(repository.creates(), 0);
    }
}

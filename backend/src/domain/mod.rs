//! Domain primitives, ports, and services for the mutation pipeline.
//!
//! Purpose: Define strongly typed domain entities and the hexagonal port
//! traits the adapters implement. Keep types immutable and document
//! invariants and serialisation contracts (serde) in each type's Rustdoc.
//!
//! The slices:
//! - [`idempotency`] — keys, payload fingerprints, captured responses, and
//!   stored records for exactly-once mutation semantics.
//! - [`gateway`] — the tiered read-through/write-through orchestrator that
//!   wraps every idempotent mutation.
//! - [`outbox`] — transactional events written alongside mutations.
//! - [`delivery`] — the worker that drains the outbox to consumers.
//! - [`bookings`] — the booking aggregate and its service.
//! - [`ports`] — traits implemented by outbound adapters.

pub mod bookings;
pub mod config;
pub mod delivery;
pub mod error;
pub mod gateway;
pub mod idempotency;
pub mod outbox;
pub mod ports;
pub mod principal;
pub mod trace_id;

pub use self::bookings::{
    Booking, BookingId, BookingRequest, BookingService, BookingStatus, ParseBookingStatusError,
};
pub use self::delivery::{
    DeliveryConfig, DeliveryPass, DeliverySleeper, DeliveryWorker, DeliveryWorkerPorts,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError, TRACE_ID_HEADER};
pub use self::gateway::{
    CircuitBreaker, CircuitBreakerConfig, GatewayOutcome, MutationGateway, MutationGatewayPorts,
};
pub use self::idempotency::{
    CacheEntry, CapturedResponse, FingerprintError, GatewayConfig, IdempotencyKey,
    IdempotencyKeyValidationError, IdempotencyRecord, PayloadFingerprint, ReplayDecision,
};
pub use self::outbox::{DEFAULT_MAX_RETRIES, EventType, OutboxEvent, OutboxStatus};
pub use self::principal::{PrincipalId, PrincipalIdValidationError};
pub use self::trace_id::TraceId;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;

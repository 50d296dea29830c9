//! Idempotency plumbing for gateway-wrapped HTTP handlers.
//!
//! Handlers behind the mutation gateway extract the client's idempotency key
//! here and render the gateway's outcome back into an HTTP response,
//! including the replay marker header.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::http::header::HeaderMap;

use crate::domain::{Error, GatewayOutcome, IdempotencyKey, IdempotencyKeyValidationError};

/// HTTP header carrying the client's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// HTTP header marking a response replayed from a stored record.
pub const IDEMPOTENCY_REPLAYED_HEADER: &str = "Idempotency-Replayed";

/// Extract the mandatory idempotency key from request headers.
///
/// # Errors
///
/// Returns an invalid-request error when the header is absent, not valid
/// UTF-8, or not a version-4 UUID. Rejection happens before any business
/// logic runs.
pub fn require_idempotency_key(headers: &HeaderMap) -> Result<IdempotencyKey, Error> {
    let Some(header_value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Err(Error::invalid_request(
            "idempotency-key header is required for this endpoint",
        ));
    };

    let key_str = header_value
        .to_str()
        .map_err(|_| map_idempotency_key_error(&IdempotencyKeyValidationError::InvalidKey))?;

    IdempotencyKey::new(key_str).map_err(|err| map_idempotency_key_error(&err))
}

/// Map idempotency key validation errors to domain errors.
pub fn map_idempotency_key_error(err: &IdempotencyKeyValidationError) -> Error {
    match err {
        IdempotencyKeyValidationError::EmptyKey => {
            Error::invalid_request("idempotency-key header must not be empty")
        }
        IdempotencyKeyValidationError::InvalidKey => {
            Error::invalid_request("idempotency-key header must be a valid uuid")
        }
        IdempotencyKeyValidationError::NotVersion4 => {
            Error::invalid_request("idempotency-key header must be a version-4 uuid")
        }
    }
}

/// Render a gateway outcome into the HTTP response.
///
/// The stored status, content type, and body are emitted exactly as
/// captured; replays additionally carry `Idempotency-Replayed: true`.
pub fn respond_with_outcome(outcome: GatewayOutcome) -> HttpResponse {
    let status =
        StatusCode::from_u16(outcome.response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    builder.content_type(outcome.response.content_type);
    if outcome.replayed {
        builder.insert_header((IDEMPOTENCY_REPLAYED_HEADER, "true"));
    }
    builder.body(outcome.response.body)
}

//! HTTP adapter mapping for domain errors.
//!
//! Purpose: keep the domain error type HTTP-agnostic while allowing Actix
//! handlers to turn domain failures into consistent JSON responses and status
//! codes.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use tracing::error;

use crate::domain::{CapturedResponse, Error, ErrorCode, TRACE_ID_HEADER};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

/// HTTP status corresponding to a domain error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn redact_server_faults(error: &Error) -> Error {
    let generic = match error.code() {
        ErrorCode::InternalError => Some(Error::internal("Internal server error")),
        ErrorCode::ServiceUnavailable => {
            Some(Error::service_unavailable("Service temporarily unavailable"))
        }
        _ => None,
    };
    let Some(mut redacted) = generic else {
        return error.clone();
    };
    if let Some(id) = error.trace_id() {
        redacted = redacted.with_trace_id(id.to_owned());
    }
    redacted
}

/// Render an error into a [`CapturedResponse`] suitable for gateway storage.
///
/// The trace identifier is omitted: a stored response is replayed to later
/// requests that carry their own trace identifiers, so one request's
/// identifier must not be baked into the body.
pub fn captured_error(error: &Error) -> CapturedResponse {
    let redacted = redact_server_faults(error);
    let mut body = json!({
        "code": redacted.code(),
        "message": redacted.message(),
    });
    if let (Some(object), Some(details)) = (body.as_object_mut(), redacted.details()) {
        object.insert("details".to_owned(), details.clone());
    }
    CapturedResponse::json(status_for(error.code()).as_u16(), body.to_string())
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id.to_owned()));
        }

        builder.json(redact_server_faults(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Do not leak implementation details to clients.
        error!(error = %err, "actix error promoted to domain error");
        Error::internal("Internal server error")
    }
}

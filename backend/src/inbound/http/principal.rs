//! Principal identity extraction for HTTP handlers.
//!
//! Authentication happens at the deployment edge; the proxy verifies the
//! caller and injects their identifier in `X-Principal-Id`. Handlers only
//! need to lift that header into a [`PrincipalId`]. A missing or garbled
//! header means no verified identity reached us, so both map to 401.

use actix_web::http::header::HeaderMap;

use crate::domain::{Error, PrincipalId};

/// HTTP header carrying the edge-authenticated principal identifier.
pub const PRINCIPAL_ID_HEADER: &str = "X-Principal-Id";

/// Extract the mandatory principal identity from request headers.
///
/// # Errors
///
/// Returns an unauthorized error when the header is absent or does not hold
/// a valid UUID.
pub fn require_principal(headers: &HeaderMap) -> Result<PrincipalId, Error> {
    let Some(header_value) = headers.get(PRINCIPAL_ID_HEADER) else {
        return Err(Error::unauthorized("x-principal-id header is required"));
    };

    let raw = header_value
        .to_str()
        .map_err(|_| Error::unauthorized("x-principal-id header must be a valid uuid"))?;

    PrincipalId::new(raw)
        .map_err(|_| Error::unauthorized("x-principal-id header must be a valid uuid"))
}

#[cfg(test)]
mod tests {
    use actix_web::http::header::{HeaderName, HeaderValue};
    use rstest::rstest;

    use super::*;
    use crate::domain::ErrorCode;

    fn headers_with_principal(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-principal-id"),
            HeaderValue::from_str(value).expect("header value"),
        );
        headers
    }

    #[test]
    fn accepts_a_uuid_principal() {
        let headers = headers_with_principal("3fa85f64-5717-4562-b3fc-2c963f66afa6");
        let principal = require_principal(&headers).expect("valid principal");
        assert_eq!(principal.as_ref(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
    }

    #[test]
    fn rejects_a_missing_header_as_unauthorized() {
        let error = require_principal(&HeaderMap::new()).expect_err("missing header");
        assert_eq!(error.code(), ErrorCode::Unauthorized);
        assert!(error.message().contains("required"));
    }

    #[rstest]
    #[case("")]
    #[case("guest-42")]
    #[case("3fa85f64-5717-4562-b3fc")]
    fn rejects_malformed_principals_as_unauthorized(#[case] raw: &str) {
        let headers = headers_with_principal(raw);
        let error = require_principal(&headers).expect_err("malformed principal");
        assert_eq!(error.code(), ErrorCode::Unauthorized);
    }
}

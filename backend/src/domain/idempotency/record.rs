//! Stored idempotency records, cached entries, and replay decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::PrincipalId;
use super::super::principal::PrincipalIdValidationError;
use super::{FingerprintError, IdempotencyKey, PayloadFingerprint};

/// Snapshot of an HTTP response captured for replay.
///
/// Replays must be bit-for-bit identical to the original response, so the
/// body is stored as the exact text that was sent, not re-serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedResponse {
    /// HTTP status code of the original response.
    pub status: u16,
    /// Content type of the original response body.
    pub content_type: String,
    /// Exact body text of the original response.
    pub body: String,
}

impl CapturedResponse {
    /// Create a captured response.
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Create a captured JSON response.
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "application/json", body)
    }

    /// Whether this response should be recorded for replay.
    ///
    /// Server errors are transient by definition; recording one would pin a
    /// failure to the key and block the client's retry from ever succeeding.
    pub fn is_storable(&self) -> bool {
        self.status < 500
    }
}

/// Outcome of comparing a stored record against an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDecision {
    /// Same principal, same payload: replay the stored response.
    Replay,
    /// The key belongs to a different principal.
    OwnershipConflict,
    /// Same principal but the payload differs.
    PayloadConflict,
}

/// Compare stored identity and fingerprint against an incoming request.
///
/// Ownership is evaluated before payload identity so that a key probe by
/// another principal is rejected without revealing whether the payload
/// matched.
fn decide_replay(
    stored_principal: &PrincipalId,
    stored_fingerprint: &PayloadFingerprint,
    principal: &PrincipalId,
    fingerprint: &PayloadFingerprint,
) -> ReplayDecision {
    if stored_principal != principal {
        ReplayDecision::OwnershipConflict
    } else if stored_fingerprint != fingerprint {
        ReplayDecision::PayloadConflict
    } else {
        ReplayDecision::Replay
    }
}

/// Durable idempotency record linking a key to its response snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    /// The idempotency key provided by the client.
    pub key: IdempotencyKey,
    /// Principal who made the original request.
    pub principal: PrincipalId,
    /// Fingerprint of the canonicalized request payload.
    pub fingerprint: PayloadFingerprint,
    /// Snapshot of the original response to replay.
    pub response: CapturedResponse,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record stops being authoritative.
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Whether the record has passed its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Decide how an incoming request relates to this record.
    pub fn decide(
        &self,
        principal: &PrincipalId,
        fingerprint: &PayloadFingerprint,
    ) -> ReplayDecision {
        decide_replay(&self.principal, &self.fingerprint, principal, fingerprint)
    }

    /// Project the record into the form cached by the faster tiers.
    pub fn to_cache_entry(&self) -> CacheEntry {
        CacheEntry {
            principal: self.principal.clone(),
            fingerprint: self.fingerprint,
            response: self.response.clone(),
            cached_at: self.created_at,
        }
    }
}

/// Errors decoding a serialized [`CacheEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntryDecodeError {
    /// The stored principal was not a valid identifier.
    Principal(PrincipalIdValidationError),
    /// The stored fingerprint was not valid hex.
    Fingerprint(FingerprintError),
}

impl std::fmt::Display for CacheEntryDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Principal(err) => write!(f, "invalid cached principal: {err}"),
            Self::Fingerprint(err) => write!(f, "invalid cached fingerprint: {err}"),
        }
    }
}

impl std::error::Error for CacheEntryDecodeError {}

/// Cached projection of an [`IdempotencyRecord`] held by the fast tiers.
///
/// Carries everything needed to replay without touching the record store:
/// the response snapshot plus the identity and fingerprint needed to evaluate
/// ownership and payload conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CacheEntryDto", into = "CacheEntryDto")]
pub struct CacheEntry {
    /// Principal who made the original request.
    pub principal: PrincipalId,
    /// Fingerprint of the canonicalized request payload.
    pub fingerprint: PayloadFingerprint,
    /// Snapshot of the original response to replay.
    pub response: CapturedResponse,
    /// When the source record was created.
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Decide how an incoming request relates to this cached entry.
    pub fn decide(
        &self,
        principal: &PrincipalId,
        fingerprint: &PayloadFingerprint,
    ) -> ReplayDecision {
        decide_replay(&self.principal, &self.fingerprint, principal, fingerprint)
    }
}

/// Serialization shape for [`CacheEntry`].
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntryDto {
    principal: String,
    fingerprint: String,
    response: CapturedResponse,
    cached_at: DateTime<Utc>,
}

impl From<CacheEntry> for CacheEntryDto {
    fn from(entry: CacheEntry) -> Self {
        Self {
            principal: entry.principal.into(),
            fingerprint: entry.fingerprint.to_hex(),
            response: entry.response,
            cached_at: entry.cached_at,
        }
    }
}

impl TryFrom<CacheEntryDto> for CacheEntry {
    type Error = CacheEntryDecodeError;

    fn try_from(dto: CacheEntryDto) -> Result<Self, Self::Error> {
        let principal =
            PrincipalId::new(dto.principal).map_err(CacheEntryDecodeError::Principal)?;
        let fingerprint = PayloadFingerprint::from_hex(&dto.fingerprint)
            .map_err(CacheEntryDecodeError::Fingerprint)?;
        Ok(Self {
            principal,
            fingerprint,
            response: dto.response,
            cached_at: dto.cached_at,
        })
    }
}

//! Payload fingerprinting for duplicate-request detection.
//!
//! Two requests carrying the same idempotency key are only treated as
//! retries of one another when their payloads are semantically identical.
//! Semantic identity is decided by canonicalizing the JSON payload (object
//! keys sorted recursively, array order preserved) and hashing the result
//! with SHA-256, so formatting noise such as key order or whitespace never
//! causes a false conflict.

use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Errors produced while fingerprinting a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// The canonical form could not be serialized.
    Serialization(String),
    /// A stored fingerprint string was not 64 hex characters.
    InvalidEncoding,
}

impl fmt::Display for FingerprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization(message) => {
                write!(f, "failed to serialize canonical payload: {message}")
            }
            Self::InvalidEncoding => {
                write!(f, "fingerprint must be 64 lowercase hex characters")
            }
        }
    }
}

impl std::error::Error for FingerprintError {}

/// SHA-256 digest of a canonicalized JSON payload.
///
/// Stored and compared as raw bytes; rendered as lowercase hex for
/// persistence and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadFingerprint([u8; 32]);

impl PayloadFingerprint {
    /// Compute the fingerprint of a JSON payload.
    ///
    /// Object keys are sorted recursively before hashing; array element
    /// order is preserved because it is semantically significant.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::Serialization`] if the canonical value
    /// cannot be rendered to bytes. `serde_json` only fails here for
    /// non-string map keys, which cannot occur in a [`Value`], so this is
    /// effectively unreachable but still propagated rather than panicking.
    pub fn of(payload: &Value) -> Result<Self, FingerprintError> {
        let canonical = canonicalize(payload);
        let bytes = serde_json::to_vec(&canonical)
            .map_err(|err| FingerprintError::Serialization(err.to_string()))?;
        let digest = Sha256::digest(&bytes);
        Ok(Self(digest.into()))
    }

    /// Render the fingerprint as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a fingerprint from its hex representation.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::InvalidEncoding`] if the input is not
    /// exactly 64 hex characters.
    pub fn from_hex(raw: &str) -> Result<Self, FingerprintError> {
        let bytes = hex::decode(raw).map_err(|_| FingerprintError::InvalidEncoding)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| FingerprintError::InvalidEncoding)?;
        Ok(Self(array))
    }
}

impl fmt::Display for PayloadFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Rebuild a JSON value with object keys in sorted order at every level.
///
/// `serde_json::Map` preserves insertion order by default, so inserting keys
/// in sorted order yields deterministic serialization.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                if let Some(inner) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(inner));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

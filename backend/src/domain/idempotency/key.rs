//! Idempotency key validation and storage.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::{Uuid, Version};

/// Validation errors for [`IdempotencyKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyKeyValidationError {
    /// The key string was empty.
    EmptyKey,
    /// The key string was not a valid UUID.
    InvalidKey,
    /// The key parsed as a UUID but not as version 4.
    NotVersion4,
}

impl fmt::Display for IdempotencyKeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "idempotency key must not be empty"),
            Self::InvalidKey => write!(f, "idempotency key must be a valid UUID"),
            Self::NotVersion4 => write!(f, "idempotency key must be a version-4 UUID"),
        }
    }
}

impl std::error::Error for IdempotencyKeyValidationError {}

/// Client-provided idempotency key (UUID v4).
///
/// Clients send this via the `Idempotency-Key` HTTP header to enable safe
/// request retries. The server uses the key to detect duplicate requests and
/// replay previously captured responses. Only version-4 UUIDs are accepted;
/// sequential or name-based UUIDs suggest a caller deriving keys from data
/// that may collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(Uuid, String);

impl IdempotencyKey {
    /// Validate and construct an [`IdempotencyKey`] from a string.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyKeyValidationError::EmptyKey`] if the input is
    /// empty, [`IdempotencyKeyValidationError::InvalidKey`] if the input is
    /// not a valid UUID, or [`IdempotencyKeyValidationError::NotVersion4`]
    /// for any other UUID version.
    ///
    /// # Example
    ///
    /// ```
    /// # use backend::domain::idempotency::IdempotencyKey;
    /// let key = IdempotencyKey::new("11111111-1111-4111-8111-111111111111")
    ///     .expect("valid v4 UUID");
    /// assert_eq!(key.as_ref(), "11111111-1111-4111-8111-111111111111");
    /// ```
    pub fn new(key: impl AsRef<str>) -> Result<Self, IdempotencyKeyValidationError> {
        Self::from_owned(key.as_ref().to_owned())
    }

    /// Construct an [`IdempotencyKey`] directly from a UUID.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyKeyValidationError::NotVersion4`] unless the UUID
    /// carries the random (v4) version marker. Rows loaded from storage were
    /// validated on the way in, so adapters reading persisted keys can rely
    /// on this succeeding.
    pub fn from_uuid(uuid: Uuid) -> Result<Self, IdempotencyKeyValidationError> {
        if uuid.get_version() != Some(Version::Random) {
            return Err(IdempotencyKeyValidationError::NotVersion4);
        }
        let raw = uuid.to_string();
        Ok(Self(uuid, raw))
    }

    /// Generate a new random [`IdempotencyKey`].
    ///
    /// Primarily useful for testing.
    pub fn random() -> Self {
        let uuid = Uuid::new_v4();
        Self(uuid, uuid.to_string())
    }

    fn from_owned(key: String) -> Result<Self, IdempotencyKeyValidationError> {
        if key.is_empty() {
            return Err(IdempotencyKeyValidationError::EmptyKey);
        }
        if key.trim() != key {
            return Err(IdempotencyKeyValidationError::InvalidKey);
        }
        let parsed =
            Uuid::parse_str(&key).map_err(|_| IdempotencyKeyValidationError::InvalidKey)?;
        if parsed.get_version() != Some(Version::Random) {
            return Err(IdempotencyKeyValidationError::NotVersion4);
        }
        Ok(Self(parsed, key))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.1
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

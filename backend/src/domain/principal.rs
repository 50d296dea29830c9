//! Principal identity for mutation ownership checks.
//!
//! Authentication policy lives at the deployment edge; by the time a request
//! reaches this service the edge has already verified the caller and injected
//! their identifier. The pipeline only needs a stable identity to bind
//! idempotency records to and to detect cross-principal key reuse.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors for [`PrincipalId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalIdValidationError {
    /// The identifier string was empty.
    EmptyId,
    /// The identifier string was not a valid UUID.
    InvalidId,
}

impl fmt::Display for PrincipalIdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "principal id must not be empty"),
            Self::InvalidId => write!(f, "principal id must be a valid UUID"),
        }
    }
}

impl std::error::Error for PrincipalIdValidationError {}

/// Identity of the caller that owns a mutation.
///
/// Stored alongside every idempotency record; a key replayed by a different
/// principal is rejected rather than served.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(Uuid, String);

impl PrincipalId {
    /// Validate and construct a [`PrincipalId`] from a string.
    ///
    /// # Errors
    ///
    /// Returns [`PrincipalIdValidationError::EmptyId`] if the input is empty,
    /// or [`PrincipalIdValidationError::InvalidId`] if the input is not a
    /// valid UUID.
    ///
    /// # Example
    ///
    /// ```
    /// # use backend::domain::PrincipalId;
    /// let id = PrincipalId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6")
    ///     .expect("valid UUID");
    /// assert_eq!(id.as_ref(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
    /// ```
    pub fn new(id: impl AsRef<str>) -> Result<Self, PrincipalIdValidationError> {
        Self::from_owned(id.as_ref().to_owned())
    }

    /// Construct a [`PrincipalId`] directly from a UUID.
    ///
    /// Useful when the UUID is already validated (e.g., loaded from database).
    pub fn from_uuid(uuid: Uuid) -> Self {
        let raw = uuid.to_string();
        Self(uuid, raw)
    }

    /// Generate a new random [`PrincipalId`].
    ///
    /// Primarily useful for testing.
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    fn from_owned(id: String) -> Result<Self, PrincipalIdValidationError> {
        if id.is_empty() {
            return Err(PrincipalIdValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(PrincipalIdValidationError::InvalidId);
        }
        let parsed = Uuid::parse_str(&id).map_err(|_| PrincipalIdValidationError::InvalidId)?;
        Ok(Self(parsed, id))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.1
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = PrincipalIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

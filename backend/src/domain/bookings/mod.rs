//! Booking domain slice.
//!
//! Bookings are the demonstration mutation carried through the idempotent
//! gateway and the outbox: creating one persists the booking row and its
//! announcement event in a single transaction. The natural key
//! (listing, guest, check-in) is unique in storage, which backstops the
//! gateway when every cache tier is unavailable.

mod service;

pub use service::BookingService;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::PrincipalId;

/// Server-generated booking identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Generate a fresh booking identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID (for rows loaded from storage).
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Active reservation.
    Confirmed,
    /// Reservation withdrawn.
    Cancelled,
}

impl BookingStatus {
    /// All status variants.
    pub const ALL: [BookingStatus; 2] = [BookingStatus::Confirmed, BookingStatus::Cancelled];

    /// Returns the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an invalid booking status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBookingStatusError {
    /// The invalid input string.
    pub input: String,
}

impl fmt::Display for ParseBookingStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variants: Vec<_> = BookingStatus::ALL.iter().map(|v| v.as_str()).collect();
        write!(
            f,
            "invalid booking status '{}': expected one of {}",
            self.input,
            variants.join(", ")
        )
    }
}

impl std::error::Error for ParseBookingStatusError {}

impl FromStr for BookingStatus {
    type Err = ParseBookingStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ParseBookingStatusError {
                input: s.to_owned(),
            })
    }
}

/// Client request to create a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Listing being booked.
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    pub listing_id: Uuid,
    /// First night of the stay.
    #[schema(value_type = String, example = "2025-07-01")]
    pub check_in: NaiveDate,
    /// Day of departure (exclusive).
    #[schema(value_type = String, example = "2025-07-04")]
    pub check_out: NaiveDate,
}

/// A confirmed reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    /// Booking identity.
    pub id: BookingId,
    /// Listing being booked.
    pub listing_id: Uuid,
    /// Principal who made the booking.
    pub guest_id: PrincipalId,
    /// First night of the stay.
    pub check_in: NaiveDate,
    /// Day of departure (exclusive).
    pub check_out: NaiveDate,
    /// Lifecycle state.
    pub status: BookingStatus,
    /// When the booking was created.
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Build a confirmed booking from a validated request.
    pub fn new(request: BookingRequest, guest_id: PrincipalId, now: DateTime<Utc>) -> Self {
        Self {
            id: BookingId::generate(),
            listing_id: request.listing_id,
            guest_id,
            check_in: request.check_in,
            check_out: request.check_out,
            status: BookingStatus::Confirmed,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests;

//! Booking creation service composing validation, persistence, and outbox
//! announcement.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;

use crate::domain::ports::{BookingRepository, BookingRepositoryError};
use crate::domain::{Error, EventType, OutboxEvent, PrincipalId};

use super::{Booking, BookingRequest};

/// Aggregate type stamped on booking outbox events.
const BOOKING_AGGREGATE: &str = "booking";

/// Service creating bookings together with their announcement events.
///
/// The repository commits the booking row and the outbox row in a single
/// transaction, so a booking exists if and only if its `booking_created`
/// event does.
#[derive(Clone)]
pub struct BookingService {
    repository: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    /// Create a new booking service.
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use backend::domain::BookingService;
    /// # use backend::domain::ports::FixtureBookingRepository;
    /// # use mockable::DefaultClock;
    /// let service = BookingService::new(
    ///     Arc::new(FixtureBookingRepository),
    ///     Arc::new(DefaultClock),
    /// );
    /// ```
    pub fn new(repository: Arc<dyn BookingRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Validate and persist a booking, announcing it via the outbox.
    ///
    /// # Errors
    ///
    /// Returns an invalid-request error for malformed dates or a nil listing,
    /// a conflict error when the natural key is already taken, and an
    /// internal error for persistence failures.
    pub async fn create_booking(
        &self,
        guest: &PrincipalId,
        request: BookingRequest,
    ) -> Result<Booking, Error> {
        Self::validate(&request)?;
        let now = self.clock.utc();
        let booking = Booking::new(request, guest.clone(), now);
        let event = OutboxEvent::new(
            BOOKING_AGGREGATE,
            *booking.id.as_uuid(),
            EventType::BookingCreated,
            Self::event_payload(&booking),
            now,
        );
        self.repository
            .create_with_event(&booking, &event)
            .await
            .map_err(map_booking_repository_error)?;
        Ok(booking)
    }

    fn validate(request: &BookingRequest) -> Result<(), Error> {
        if request.listing_id.is_nil() {
            return Err(Error::invalid_request("listingId must not be nil"));
        }
        if request.check_out <= request.check_in {
            return Err(Error::invalid_request("checkOut must be after checkIn"));
        }
        Ok(())
    }

    fn event_payload(booking: &Booking) -> serde_json::Value {
        json!({
            "bookingId": booking.id,
            "listingId": booking.listing_id,
            "guestId": booking.guest_id,
            "checkIn": booking.check_in,
            "checkOut": booking.check_out,
            "status": booking.status,
        })
    }
}

fn map_booking_repository_error(err: BookingRepositoryError) -> Error {
    match err {
        BookingRepositoryError::DuplicateBooking { .. } => Error::conflict(
            "a booking already exists for this listing, guest, and check-in date",
        ),
        other => Error::internal(format!("booking persistence failed: {other}")),
    }
}

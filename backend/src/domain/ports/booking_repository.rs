//! Port abstraction for booking persistence.

use async_trait::async_trait;

use crate::domain::{Booking, OutboxEvent};

use super::define_port_error;

define_port_error! {
    /// Errors raised by booking repository adapters.
    pub enum BookingRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "booking repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "booking repository query failed: {message}",
        /// A booking with the same natural key already exists.
        DuplicateBooking { message: String } => "booking already exists: {message}",
    }
}

/// Port for booking persistence.
///
/// The booking insert and its announcement event are committed in one
/// transaction: if either fails, neither exists. The natural-key uniqueness
/// behind [`BookingRepositoryError::DuplicateBooking`] is the last line of
/// defence against double execution when every cache tier is unavailable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a booking together with its outbox event.
    async fn create_with_event(
        &self,
        booking: &Booking,
        event: &OutboxEvent,
    ) -> Result<(), BookingRepositoryError>;
}

/// Fixture implementation for testing without a real database.
#[derive(Debug, Default)]
pub struct FixtureBookingRepository;

#[async_trait]
impl BookingRepository for FixtureBookingRepository {
    async fn create_with_event(
        &self,
        _booking: &Booking,
        _event: &OutboxEvent,
    ) -> Result<(), BookingRepositoryError> {
        Ok(())
    }
}

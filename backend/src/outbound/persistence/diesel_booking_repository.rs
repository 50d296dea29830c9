//! PostgreSQL-backed `BookingRepository` implementation using Diesel.
//!
//! The booking row and its outbox event are written in a single transaction
//! so a crash between the two cannot strand a booking without its
//! announcement, or announce a booking that was never made.

use async_trait::async_trait;
use diesel_async::AsyncConnection as _;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt as _;

use crate::domain::ports::{BookingRepository, BookingRepositoryError};
use crate::domain::{Booking, OutboxEvent};

use super::diesel_helpers::{
    is_closed_connection, is_unique_violation, map_diesel_error_message, map_pool_error_message,
};
use super::models::NewBookingRow;
use super::outbox_writer::insert_outbox_event;
use super::pool::{DbPool, PoolError};
use super::schema::bookings;

/// Diesel-backed implementation of the `BookingRepository` port.
#[derive(Clone)]
pub struct DieselBookingRepository {
    pool: DbPool,
}

impl DieselBookingRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to booking repository errors.
fn map_pool_error(error: PoolError) -> BookingRepositoryError {
    BookingRepositoryError::connection(map_pool_error_message(error))
}

/// Map Diesel errors to booking repository errors.
///
/// Outbox event ids are freshly generated v4 UUIDs, so a unique violation in
/// this transaction can only come from the bookings natural key.
fn map_diesel_error(error: diesel::result::Error, operation: &str) -> BookingRepositoryError {
    if is_unique_violation(&error) {
        return BookingRepositoryError::duplicate_booking(
            "a booking for this listing, guest, and check-in date already exists",
        );
    }
    if is_closed_connection(&error) {
        return BookingRepositoryError::connection("database connection closed");
    }
    BookingRepositoryError::query(map_diesel_error_message(error, operation))
}

#[async_trait]
impl BookingRepository for DieselBookingRepository {
    async fn create_with_event(
        &self,
        booking: &Booking,
        event: &OutboxEvent,
    ) -> Result<(), BookingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let booking_row = NewBookingRow {
            id: *booking.id.as_uuid(),
            listing_id: booking.listing_id,
            guest_id: *booking.guest_id.as_uuid(),
            check_in: booking.check_in,
            check_out: booking.check_out,
            status: booking.status.as_str(),
            created_at: booking.created_at,
        };

        conn.transaction(|conn| {
            async move {
                diesel::insert_into(bookings::table)
                    .values(&booking_row)
                    .execute(conn)
                    .await?;
                insert_outbox_event(conn, event).await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| map_diesel_error(err, "create booking with outbox event"))?;

        Ok(())
    }
}

//! Unit tests for the booking domain slice.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use mockable::Clock;
use rstest::rstest;
use uuid::Uuid;

use super::*;
use crate::domain::ports::{BookingRepositoryError, MockBookingRepository};
use crate::domain::{ErrorCode, EventType, OutboxStatus};

fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

fn fixture_clock() -> Arc<dyn Clock> {
    Arc::new(FixtureClock {
        utc_now: fixture_timestamp(),
    })
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn valid_request() -> BookingRequest {
    BookingRequest {
        listing_id: Uuid::new_v4(),
        check_in: date(2025, 7, 1),
        check_out: date(2025, 7, 5),
    }
}

fn make_service(repository: MockBookingRepository) -> BookingService {
    BookingService::new(Arc::new(repository), fixture_clock())
}

#[tokio::test]
async fn create_booking_persists_booking_with_event() {
    let mut repository = MockBookingRepository::new();
    repository
        .expect_create_with_event()
        .withf(|booking, event| {
            event.event_type == EventType::BookingCreated
                && event.aggregate_type == "booking"
                && event.aggregate_id == *booking.id.as_uuid()
                && event.status == OutboxStatus::Pending
                && event.retry_count == 0
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let service = make_service(repository);
    let guest = PrincipalId::random();
    let booking = service
        .create_booking(&guest, valid_request())
        .await
        .expect("booking should be created");

    assert_eq!(booking.guest_id, guest);
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.created_at, fixture_timestamp());
}

#[tokio::test]
async fn create_booking_event_payload_is_camel_case() {
    let mut repository = MockBookingRepository::new();
    repository
        .expect_create_with_event()
        .withf(|booking, event| {
            let payload = &event.payload;
            payload["bookingId"] == booking.id.to_string()
                && payload["listingId"] == booking.listing_id.to_string()
                && payload["guestId"] == booking.guest_id.to_string()
                && payload["status"] == "confirmed"
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let service = make_service(repository);
    service
        .create_booking(&PrincipalId::random(), valid_request())
        .await
        .expect("booking should be created");
}

#[rstest]
#[case::reversed(date(2025, 7, 5), date(2025, 7, 1))]
#[case::same_day(date(2025, 7, 1), date(2025, 7, 1))]
#[tokio::test]
async fn create_booking_rejects_bad_dates(
    #[case] check_in: NaiveDate,
    #[case] check_out: NaiveDate,
) {
    let request = BookingRequest {
        listing_id: Uuid::new_v4(),
        check_in,
        check_out,
    };
    let service = make_service(MockBookingRepository::new());

    let error = service
        .create_booking(&PrincipalId::random(), request)
        .await
        .expect_err("bad dates should be rejected");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn create_booking_rejects_nil_listing() {
    let request = BookingRequest {
        listing_id: Uuid::nil(),
        check_in: date(2025, 7, 1),
        check_out: date(2025, 7, 5),
    };
    let service = make_service(MockBookingRepository::new());

    let error = service
        .create_booking(&PrincipalId::random(), request)
        .await
        .expect_err("nil listing should be rejected");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn create_booking_maps_duplicate_to_conflict() {
    let mut repository = MockBookingRepository::new();
    repository
        .expect_create_with_event()
        .returning(|_, _| {
            Err(BookingRepositoryError::duplicate_booking(
                "bookings_listing_guest_check_in_key",
            ))
        });

    let service = make_service(repository);
    let error = service
        .create_booking(&PrincipalId::random(), valid_request())
        .await
        .expect_err("duplicate should surface as conflict");
    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn create_booking_maps_query_failure_to_internal() {
    let mut repository = MockBookingRepository::new();
    repository
        .expect_create_with_event()
        .returning(|_, _| Err(BookingRepositoryError::query("connection reset")));

    let service = make_service(repository);
    let error = service
        .create_booking(&PrincipalId::random(), valid_request())
        .await
        .expect_err("query failure should surface as internal");
    assert_eq!(error.code(), ErrorCode::InternalError);
}

#[test]
fn booking_status_parses_from_storage_form() {
    for status in BookingStatus::ALL {
        let parsed: BookingStatus = status
            .as_str()
            .parse()
            .expect("storage form should parse back");
        assert_eq!(parsed, status);
    }
    assert!("unknown".parse::<BookingStatus>().is_err());
}

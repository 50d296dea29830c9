//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are used
//! by Diesel for compile-time query validation and type-safe SQL generation.
//!
//! # Maintenance
//!
//! When migrations change the schema, this file should be regenerated or
//! manually updated to reflect those changes. The `diesel print-schema`
//! command can generate these definitions from a live database.

diesel::table! {
    /// Durable idempotency records (the authoritative replay tier).
    ///
    /// One row per idempotency key; the primary key enforces the
    /// at-most-one-record-per-key invariant even when concurrent inserts
    /// bypass the stampede lock. Expired rows are removed by the periodic
    /// sweep (see the index on `expires_at`).
    idempotency_records (key) {
        /// Primary key: the client-supplied idempotency key (UUID v4).
        key -> Uuid,
        /// Principal that first used the key.
        principal_id -> Uuid,
        /// SHA-256 of the canonicalized request payload, lowercase hex.
        fingerprint_hex -> Varchar,
        /// HTTP status of the captured response.
        response_status -> Int2,
        /// Content type of the captured response body.
        response_content_type -> Text,
        /// Exact body text of the captured response.
        response_body -> Text,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Instant after which the record is no longer authoritative.
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    /// Transactional outbox events.
    ///
    /// Rows are inserted in the same transaction as the business mutation
    /// they announce and mutated only by the delivery worker afterwards.
    /// Delivered and parked rows are retained for audit. The composite index
    /// on `(status, next_retry_at)` serves the worker's poll.
    outbox_events (id) {
        /// Primary key: generated event identity (UUID v4).
        id -> Uuid,
        /// Kind of aggregate the event concerns (e.g. `booking`).
        aggregate_type -> Text,
        /// Identity of the aggregate instance.
        aggregate_id -> Uuid,
        /// Event kind used to route dispatch (e.g. `booking_created`).
        event_type -> Text,
        /// Consumer-facing event payload.
        payload -> Jsonb,
        /// Delivery state: pending, processing, delivered, failed, dead_letter.
        status -> Text,
        /// Number of failed delivery attempts so far.
        retry_count -> Int4,
        /// Retry budget before the event is dead-lettered.
        max_retries -> Int4,
        /// Earliest instant the event is eligible for (re)delivery.
        next_retry_at -> Timestamptz,
        /// Message from the most recent delivery failure.
        last_error -> Nullable<Text>,
        /// When the event was successfully delivered.
        processed_at -> Nullable<Timestamptz>,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp (stamped on every state transition).
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Booking aggregate rows for the demo mutation slice.
    ///
    /// `UNIQUE (listing_id, guest_id, check_in)` is the natural-key backstop
    /// the mutation gateway relies on when every cache tier is unavailable.
    bookings (id) {
        /// Primary key: generated booking identity (UUID v4).
        id -> Uuid,
        /// Listing being booked.
        listing_id -> Uuid,
        /// Guest who made the booking.
        guest_id -> Uuid,
        /// First night of the stay.
        check_in -> Date,
        /// Checkout date (exclusive).
        check_out -> Date,
        /// Booking lifecycle state: confirmed or cancelled.
        status -> Text,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

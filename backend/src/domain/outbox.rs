//! Transactional outbox events and their delivery lifecycle.
//!
//! An outbox event is inserted in the same database transaction as the
//! business mutation it announces, so an event row exists if and only if the
//! mutation committed. Rows are then owned by the delivery worker, which
//! moves them through `pending → processing → delivered`, reschedules
//! retries with exponential backoff, and parks exhausted events as
//! `dead_letter`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retry budget before an event is dead-lettered.
pub const DEFAULT_MAX_RETRIES: i32 = 5;

/// The kind of domain event carried by an outbox row.
///
/// Each variant corresponds to a registered downstream consumer. The string
/// form is what the database stores and what the dispatch registry keys on.
///
/// # Example
///
/// ```
/// # use backend::domain::outbox::EventType;
/// let event_type = EventType::BookingCreated;
/// assert_eq!(event_type.as_str(), "booking_created");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A booking was created (`POST /api/v1/bookings`).
    BookingCreated,
    /// A booking moved to a new status.
    BookingStatusChanged,
}

impl EventType {
    /// All event type variants.
    pub const ALL: [EventType; 2] = [EventType::BookingCreated, EventType::BookingStatusChanged];

    /// Returns the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingCreated => "booking_created",
            Self::BookingStatusChanged => "booking_status_changed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an invalid event type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventTypeError {
    /// The invalid input string.
    pub input: String,
}

impl fmt::Display for ParseEventTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variants: Vec<_> = EventType::ALL.iter().map(|v| v.as_str()).collect();
        write!(
            f,
            "invalid event type '{}': expected one of {}",
            self.input,
            variants.join(", ")
        )
    }
}

impl std::error::Error for ParseEventTypeError {}

impl FromStr for EventType {
    type Err = ParseEventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ParseEventTypeError {
                input: s.to_owned(),
            })
    }
}

/// Delivery state of an outbox event.
///
/// Only the delivery worker mutates status after insertion. `Failed` marks
/// events whose type has no registered consumer; unlike `DeadLetter` it is
/// reached without burning the retry budget, since retrying cannot help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Awaiting delivery (initial state, also re-entered on retry).
    Pending,
    /// Claimed by a worker; dispatch in progress.
    Processing,
    /// Successfully handed to the consumer.
    Delivered,
    /// Terminal: no consumer registered for the event type.
    Failed,
    /// Terminal: retry budget exhausted.
    DeadLetter,
}

impl OutboxStatus {
    /// All status variants.
    pub const ALL: [OutboxStatus; 5] = [
        OutboxStatus::Pending,
        OutboxStatus::Processing,
        OutboxStatus::Delivered,
        OutboxStatus::Failed,
        OutboxStatus::DeadLetter,
    ];

    /// Returns the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::DeadLetter => "dead_letter",
        }
    }

    /// Whether the status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed | Self::DeadLetter)
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an invalid outbox status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutboxStatusError {
    /// The invalid input string.
    pub input: String,
}

impl fmt::Display for ParseOutboxStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variants: Vec<_> = OutboxStatus::ALL.iter().map(|v| v.as_str()).collect();
        write!(
            f,
            "invalid outbox status '{}': expected one of {}",
            self.input,
            variants.join(", ")
        )
    }
}

impl std::error::Error for ParseOutboxStatusError {}

impl FromStr for OutboxStatus {
    type Err = ParseOutboxStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ParseOutboxStatusError {
                input: s.to_owned(),
            })
    }
}

/// A reliable event row written alongside its business mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEvent {
    /// Generated event identity.
    pub id: Uuid,
    /// Kind of aggregate the event concerns (e.g. `booking`).
    pub aggregate_type: String,
    /// Identity of the aggregate instance.
    pub aggregate_id: Uuid,
    /// Event kind used to route dispatch.
    pub event_type: EventType,
    /// Consumer-facing payload.
    pub payload: serde_json::Value,
    /// Current delivery state.
    pub status: OutboxStatus,
    /// Number of failed delivery attempts so far.
    pub retry_count: i32,
    /// Retry budget before dead-lettering.
    pub max_retries: i32,
    /// Earliest instant the event is eligible for (re)delivery.
    pub next_retry_at: DateTime<Utc>,
    /// Message from the most recent delivery failure.
    pub last_error: Option<String>,
    /// When the event reached a terminal success state.
    pub processed_at: Option<DateTime<Utc>>,
    /// When the event row was created.
    pub created_at: DateTime<Utc>,
    /// When the event row was last modified.
    pub updated_at: DateTime<Utc>,
}

impl OutboxEvent {
    /// Create a pending event, immediately eligible for delivery.
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: Uuid,
        event_type: EventType,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_type: aggregate_type.into(),
            aggregate_id,
            event_type,
            payload,
            status: OutboxStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            next_retry_at: now,
            last_error: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the event is eligible for a delivery attempt.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending && self.next_retry_at <= now
    }

    /// Whether one more failure would exhaust the retry budget.
    pub fn exhausts_budget_on_failure(&self) -> bool {
        self.retry_count + 1 > self.max_retries
    }
}

//! PostgreSQL-backed `OutboxRepository` implementation using Diesel.
//!
//! Claiming is the delicate operation: several worker instances may poll the
//! same table, and each due event must be dispatched exactly once. The claim
//! re-checks `status = 'pending'` inside the `UPDATE` that flips rows to
//! `processing`, so a row another worker claimed between the candidate read
//! and the update simply drops out of the result set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{OutboxRepository, OutboxRepositoryError};
use crate::domain::{OutboxEvent, OutboxStatus};

use super::diesel_helpers::{
    is_closed_connection, map_diesel_error_message, map_pool_error_message,
};
use super::models::OutboxEventRow;
use super::pool::{DbPool, PoolError};
use super::schema::outbox_events;

/// Diesel-backed implementation of the `OutboxRepository` port.
#[derive(Clone)]
pub struct DieselOutboxRepository {
    pool: DbPool,
}

impl DieselOutboxRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to outbox repository errors.
fn map_pool_error(error: PoolError) -> OutboxRepositoryError {
    OutboxRepositoryError::connection(map_pool_error_message(error))
}

/// Map Diesel errors to outbox repository errors.
fn map_diesel_error(error: diesel::result::Error, operation: &str) -> OutboxRepositoryError {
    if is_closed_connection(&error) {
        return OutboxRepositoryError::connection("database connection closed");
    }
    OutboxRepositoryError::query(map_diesel_error_message(error, operation))
}

/// Rebuild a domain event from a database row.
///
/// `event_type` and `status` are stored as text; unknown values mean the
/// table was written by something newer (or broken) and map to serialization
/// errors so the worker skips the batch instead of panicking.
fn row_to_event(row: OutboxEventRow) -> Result<OutboxEvent, OutboxRepositoryError> {
    let event_type = row.event_type.parse().map_err(|_| {
        OutboxRepositoryError::serialization(format!(
            "unknown event type '{}' in outbox row {}",
            row.event_type, row.id
        ))
    })?;
    let status = row.status.parse().map_err(|_| {
        OutboxRepositoryError::serialization(format!(
            "unknown status '{}' in outbox row {}",
            row.status, row.id
        ))
    })?;
    Ok(OutboxEvent {
        id: row.id,
        aggregate_type: row.aggregate_type,
        aggregate_id: row.aggregate_id,
        event_type,
        payload: row.payload,
        status,
        retry_count: row.retry_count,
        max_retries: row.max_retries,
        next_retry_at: row.next_retry_at,
        last_error: row.last_error,
        processed_at: row.processed_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl OutboxRepository for DieselOutboxRepository {
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, OutboxRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let candidate_ids: Vec<Uuid> = outbox_events::table
            .filter(outbox_events::status.eq(OutboxStatus::Pending.as_str()))
            .filter(outbox_events::next_retry_at.le(now))
            .order_by(outbox_events::created_at.asc())
            .limit(limit)
            .select(outbox_events::id)
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "select due outbox events"))?;

        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        // The status guard makes the claim atomic: rows a competing worker
        // already flipped to processing no longer match and are not returned.
        let mut rows: Vec<OutboxEventRow> = diesel::update(
            outbox_events::table
                .filter(outbox_events::id.eq_any(&candidate_ids))
                .filter(outbox_events::status.eq(OutboxStatus::Pending.as_str())),
        )
        .set((
            outbox_events::status.eq(OutboxStatus::Processing.as_str()),
            outbox_events::updated_at.eq(now),
        ))
        .returning(OutboxEventRow::as_returning())
        .get_results(&mut conn)
        .await
        .map_err(|err| map_diesel_error(err, "claim due outbox events"))?;

        // RETURNING does not guarantee row order.
        rows.sort_by_key(|row| row.created_at);

        debug!(claimed = rows.len(), "claimed due outbox events");

        rows.into_iter().map(row_to_event).collect()
    }

    async fn mark_delivered(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), OutboxRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(outbox_events::table.filter(outbox_events::id.eq(id)))
            .set((
                outbox_events::status.eq(OutboxStatus::Delivered.as_str()),
                outbox_events::processed_at.eq(Some(processed_at)),
                outbox_events::updated_at.eq(processed_at),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "mark outbox event delivered"))?;

        Ok(())
    }

    async fn mark_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), OutboxRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(outbox_events::table.filter(outbox_events::id.eq(id)))
            .set((
                outbox_events::status.eq(OutboxStatus::Pending.as_str()),
                outbox_events::retry_count.eq(retry_count),
                outbox_events::next_retry_at.eq(next_retry_at),
                outbox_events::last_error.eq(Some(error)),
                outbox_events::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "mark outbox event for retry"))?;

        Ok(())
    }

    async fn mark_dead_letter(&self, id: Uuid, error: &str) -> Result<(), OutboxRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(outbox_events::table.filter(outbox_events::id.eq(id)))
            .set((
                outbox_events::status.eq(OutboxStatus::DeadLetter.as_str()),
                outbox_events::last_error.eq(Some(error)),
                outbox_events::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "mark outbox event dead-lettered"))?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), OutboxRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(outbox_events::table.filter(outbox_events::id.eq(id)))
            .set((
                outbox_events::status.eq(OutboxStatus::Failed.as_str()),
                outbox_events::last_error.eq(Some(error)),
                outbox_events::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "mark outbox event failed"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use rstest::rstest;
    use serde_json::json;

    use crate::domain::EventType;

    use super::*;

    fn sample_row(event_type: &str, status: &str) -> OutboxEventRow {
        let now = Utc::now();
        OutboxEventRow {
            id: Uuid::new_v4(),
            aggregate_type: "booking".to_string(),
            aggregate_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            payload: json!({"bookingId": "b-1"}),
            status: status.to_string(),
            retry_count: 0,
            max_retries: 5,
            next_retry_at: now,
            last_error: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let error = map_pool_error(PoolError::checkout("pool exhausted"));
        assert!(matches!(
            error,
            OutboxRepositoryError::Connection { message } if message == "pool exhausted"
        ));
    }

    #[rstest]
    fn closed_connection_maps_to_connection_error() {
        let error = DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("closed".to_string()),
        );
        assert!(matches!(
            map_diesel_error(error, "claim due outbox events"),
            OutboxRepositoryError::Connection { .. }
        ));
    }

    #[rstest]
    fn other_diesel_errors_map_to_query_error() {
        assert!(matches!(
            map_diesel_error(DieselError::NotFound, "mark outbox event delivered"),
            OutboxRepositoryError::Query { .. }
        ));
    }

    #[rstest]
    fn valid_row_decodes_to_domain_event() {
        let row = sample_row("booking_created", "processing");
        let event = row_to_event(row).expect("row should decode");
        assert_eq!(event.event_type, EventType::BookingCreated);
        assert_eq!(event.status, OutboxStatus::Processing);
    }

    #[rstest]
    #[case::unknown_event_type("listing_updated", "pending")]
    #[case::unknown_status("booking_created", "paused")]
    fn unknown_discriminants_map_to_serialization_error(
        #[case] event_type: &str,
        #[case] status: &str,
    ) {
        let row = sample_row(event_type, status);
        assert!(matches!(
            row_to_event(row),
            Err(OutboxRepositoryError::Serialization { .. })
        ));
    }
}

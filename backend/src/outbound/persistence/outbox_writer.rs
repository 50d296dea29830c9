//! Transactional outbox event insertion.
//!
//! The outbox pattern only holds if the event row commits or rolls back with
//! the business write it describes. This helper therefore takes a borrowed
//! connection rather than a pool: the caller opens the transaction, and the
//! event insert joins it.

use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::OutboxEvent;

use super::models::NewOutboxEventRow;
use super::schema::outbox_events;

/// Insert an outbox event on an existing connection.
///
/// Must be called inside the same transaction as the state change the event
/// announces; errors propagate raw so the caller's transaction closure can
/// roll back and map them once.
pub(crate) async fn insert_outbox_event(
    conn: &mut AsyncPgConnection,
    event: &OutboxEvent,
) -> Result<(), diesel::result::Error> {
    let new_row = NewOutboxEventRow {
        id: event.id,
        aggregate_type: &event.aggregate_type,
        aggregate_id: event.aggregate_id,
        event_type: event.event_type.as_str(),
        payload: &event.payload,
        status: event.status.as_str(),
        retry_count: event.retry_count,
        max_retries: event.max_retries,
        next_retry_at: event.next_retry_at,
        created_at: event.created_at,
        updated_at: event.updated_at,
    };

    diesel::insert_into(outbox_events::table)
        .values(&new_row)
        .execute(conn)
        .await?;

    Ok(())
}

//! Port abstraction for outbox event persistence and state transitions.
//!
//! The delivery worker drives events through their lifecycle exclusively via
//! this port. Claiming is atomic: an event returned by
//! [`OutboxRepository::claim_due`] has already been marked `processing`, so
//! two workers can never dispatch the same event concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::OutboxEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised by outbox repository adapters.
    pub enum OutboxRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "outbox repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "outbox repository query failed: {message}",
        /// Event row encoding or decoding failed.
        Serialization { message: String } => "outbox repository serialization failed: {message}",
    }
}

/// Port for outbox event persistence.
///
/// Insertion happens inside the business transaction (see the outbox writer
/// in the persistence layer); everything after insertion goes through here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Atomically claim up to `limit` due pending events, oldest first.
    ///
    /// Claimed events are marked `processing` in the same statement that
    /// selects them and are returned in creation order.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, OutboxRepositoryError>;

    /// Mark an event as successfully delivered.
    async fn mark_delivered(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), OutboxRepositoryError>;

    /// Return an event to `pending` with an updated retry count and
    /// eligibility time.
    async fn mark_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), OutboxRepositoryError>;

    /// Park an event as `dead_letter` after its retry budget is exhausted.
    async fn mark_dead_letter(&self, id: Uuid, error: &str) -> Result<(), OutboxRepositoryError>;

    /// Park an event as `failed` when no consumer is registered for its
    /// type.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), OutboxRepositoryError>;
}

/// Fixture implementation for testing without a real database.
///
/// Claims nothing and accepts every transition.
#[derive(Debug, Default)]
pub struct FixtureOutboxRepository;

#[async_trait]
impl OutboxRepository for FixtureOutboxRepository {
    async fn claim_due(
        &self,
        _now: DateTime<Utc>,
        _limit: i64,
    ) -> Result<Vec<OutboxEvent>, OutboxRepositoryError> {
        Ok(Vec::new())
    }

    async fn mark_delivered(
        &self,
        _id: Uuid,
        _processed_at: DateTime<Utc>,
    ) -> Result<(), OutboxRepositoryError> {
        Ok(())
    }

    async fn mark_retry(
        &self,
        _id: Uuid,
        _retry_count: i32,
        _next_retry_at: DateTime<Utc>,
        _error: &str,
    ) -> Result<(), OutboxRepositoryError> {
        Ok(())
    }

    async fn mark_dead_letter(&self, _id: Uuid, _error: &str) -> Result<(), OutboxRepositoryError> {
        Ok(())
    }

    async fn mark_failed(&self, _id: Uuid, _error: &str) -> Result<(), OutboxRepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_repository_claims_nothing() {
        let repository = FixtureOutboxRepository;
        let claimed = repository
            .claim_due(Utc::now(), 20)
            .await
            .expect("fixture claim should succeed");
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn fixture_repository_accepts_transitions() {
        let repository = FixtureOutboxRepository;
        let id = Uuid::new_v4();
        let now = Utc::now();

        repository
            .mark_delivered(id, now)
            .await
            .expect("fixture delivered mark should succeed");
        repository
            .mark_retry(id, 1, now, "transient failure")
            .await
            .expect("fixture retry mark should succeed");
        repository
            .mark_dead_letter(id, "budget exhausted")
            .await
            .expect("fixture dead-letter mark should succeed");
    }
}

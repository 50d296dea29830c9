//! Port abstraction for downstream event consumers.

use async_trait::async_trait;

use crate::domain::OutboxEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised by event consumer adapters.
    pub enum EventConsumerError {
        /// The downstream endpoint could not be reached.
        Unreachable { message: String } => "consumer unreachable: {message}",
        /// The downstream endpoint rejected the event.
        Rejected { message: String } => "consumer rejected event: {message}",
    }
}

/// Port for a downstream consumer of outbox events.
///
/// The delivery worker retries failed consumption with backoff, so a
/// consumer may see the same event more than once; implementations must be
/// idempotent (keyed on the event id).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Hand an event to the downstream system.
    async fn consume(&self, event: &OutboxEvent) -> Result<(), EventConsumerError>;
}

/// Consumer that acknowledges every event without side effects.
///
/// Used in environments where a downstream endpoint is not configured.
#[derive(Debug, Default)]
pub struct NoOpEventConsumer;

#[async_trait]
impl EventConsumer for NoOpEventConsumer {
    async fn consume(&self, _event: &OutboxEvent) -> Result<(), EventConsumerError> {
        Ok(())
    }
}

//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod booking_repository;
mod delivery_metrics;
mod event_consumer;
mod gateway_metrics;
mod idempotency_store;
mod mutation_lock;
mod outbox_repository;
mod response_cache;

#[cfg(test)]
pub use booking_repository::MockBookingRepository;
pub use booking_repository::{
    BookingRepository, BookingRepositoryError, FixtureBookingRepository,
};
#[cfg(test)]
pub use delivery_metrics::MockDeliveryMetrics;
pub use delivery_metrics::{DeliveryMetrics, DeliveryMetricsError, NoOpDeliveryMetrics};
#[cfg(test)]
pub use event_consumer::MockEventConsumer;
pub use event_consumer::{EventConsumer, EventConsumerError, NoOpEventConsumer};
#[cfg(test)]
pub use gateway_metrics::MockGatewayMetrics;
pub use gateway_metrics::{
    ConflictKind, GatewayMetrics, GatewayMetricsError, NoOpGatewayMetrics, ResponseTier,
};
#[cfg(test)]
pub use idempotency_store::MockIdempotencyStore;
pub use idempotency_store::{FixtureIdempotencyStore, IdempotencyStore, IdempotencyStoreError};
#[cfg(test)]
pub use mutation_lock::MockMutationLock;
pub use mutation_lock::{LockAcquisition, MutationLock, MutationLockError, NoOpMutationLock};
#[cfg(test)]
pub use outbox_repository::MockOutboxRepository;
pub use outbox_repository::{FixtureOutboxRepository, OutboxRepository, OutboxRepositoryError};
#[cfg(test)]
pub use response_cache::MockResponseCache;
pub use response_cache::{NoOpResponseCache, ResponseCache, ResponseCacheError};

//! Builders selecting real adapters or fixtures for the gateway and worker.
//!
//! Every backend is optional: a missing database pool selects in-memory
//! fixtures, a missing Redis pool selects no-op cache and lock adapters,
//! and a missing webhook endpoint selects the no-op event consumer. The
//! server boots in any combination, degrading rather than refusing.

use std::sync::Arc;

use actix_web::web;
use mockable::DefaultClock;

use backend::domain::gateway::{MutationGateway, MutationGatewayPorts};
use backend::domain::ports::{
    BookingRepository, DeliveryMetrics, EventConsumer, FixtureBookingRepository,
    FixtureIdempotencyStore, GatewayMetrics, IdempotencyStore, MutationLock, NoOpDeliveryMetrics,
    NoOpEventConsumer, NoOpGatewayMetrics, NoOpMutationLock, NoOpResponseCache, ResponseCache,
};
use backend::domain::{BookingService, DeliveryWorker, DeliveryWorkerPorts, EventType};
use backend::inbound::http::state::HttpState;
use backend::outbound::cache::MokaResponseCache;
#[cfg(feature = "metrics")]
use backend::outbound::metrics::{PrometheusDeliveryMetrics, PrometheusGatewayMetrics};
use backend::outbound::persistence::{
    DieselBookingRepository, DieselIdempotencyStore, DieselOutboxRepository,
};
use backend::outbound::redis::{RedisMutationLock, RedisResponseCache};
use backend::outbound::webhook::WebhookEventConsumer;

use super::ServerConfig;

/// Select the database-backed adapter when a pool is available, otherwise
/// the in-memory fixture.
fn select_adapter<Pool, T: ?Sized>(
    pool: &Option<Pool>,
    real: impl FnOnce(&Pool) -> Arc<T>,
    fixture: impl FnOnce() -> Arc<T>,
) -> Arc<T> {
    match pool {
        Some(pool) => real(pool),
        None => fixture(),
    }
}

fn build_idempotency_store(config: &ServerConfig) -> Arc<dyn IdempotencyStore> {
    select_adapter::<_, dyn IdempotencyStore>(
        &config.db_pool,
        |pool| Arc::new(DieselIdempotencyStore::new(pool.clone())),
        || Arc::new(FixtureIdempotencyStore),
    )
}

fn build_distributed_tier(
    config: &ServerConfig,
) -> (Arc<dyn ResponseCache>, Arc<dyn MutationLock>) {
    match &config.redis_pool {
        Some(pool) => (
            Arc::new(RedisResponseCache::new(pool.clone())),
            Arc::new(RedisMutationLock::new(pool.clone())),
        ),
        None => (Arc::new(NoOpResponseCache), Arc::new(NoOpMutationLock)),
    }
}

#[cfg(feature = "metrics")]
fn build_gateway_metrics(config: &ServerConfig) -> std::io::Result<Arc<dyn GatewayMetrics>> {
    match &config.prometheus {
        Some(prom) => {
            let metrics = PrometheusGatewayMetrics::new(&prom.registry).map_err(|e| {
                std::io::Error::other(format!("gateway metrics registration failed: {e}"))
            })?;
            Ok(Arc::new(metrics))
        }
        None => Ok(Arc::new(NoOpGatewayMetrics)),
    }
}

#[cfg(not(feature = "metrics"))]
fn build_gateway_metrics(_config: &ServerConfig) -> std::io::Result<Arc<dyn GatewayMetrics>> {
    Ok(Arc::new(NoOpGatewayMetrics))
}

#[cfg(feature = "metrics")]
fn build_delivery_metrics(config: &ServerConfig) -> std::io::Result<Arc<dyn DeliveryMetrics>> {
    match &config.prometheus {
        Some(prom) => {
            let metrics = PrometheusDeliveryMetrics::new(&prom.registry).map_err(|e| {
                std::io::Error::other(format!("delivery metrics registration failed: {e}"))
            })?;
            Ok(Arc::new(metrics))
        }
        None => Ok(Arc::new(NoOpDeliveryMetrics)),
    }
}

#[cfg(not(feature = "metrics"))]
fn build_delivery_metrics(_config: &ServerConfig) -> std::io::Result<Arc<dyn DeliveryMetrics>> {
    Ok(Arc::new(NoOpDeliveryMetrics))
}

fn build_event_consumer(config: &ServerConfig) -> std::io::Result<Arc<dyn EventConsumer>> {
    match &config.webhook_endpoint {
        Some(endpoint) => {
            let consumer = WebhookEventConsumer::new(endpoint.clone(), config.webhook_timeout)
                .map_err(|e| {
                    std::io::Error::other(format!("webhook client construction failed: {e}"))
                })?;
            Ok(Arc::new(consumer))
        }
        None => Ok(Arc::new(NoOpEventConsumer)),
    }
}

/// Assemble the mutation gateway over the configured tiers.
pub(super) fn build_gateway(config: &ServerConfig) -> std::io::Result<Arc<MutationGateway>> {
    let store = build_idempotency_store(config);
    let (distributed, lock) = build_distributed_tier(config);
    let metrics = build_gateway_metrics(config)?;
    let local = Arc::new(MokaResponseCache::new(config.gateway.local_capacity()));

    let ports = MutationGatewayPorts::new(local, distributed, store, lock, metrics);
    Ok(Arc::new(MutationGateway::new(
        ports,
        Arc::new(DefaultClock),
        config.gateway.clone(),
    )))
}

/// Build the shared HTTP state from the gateway and booking adapters.
pub(super) fn build_http_state(
    config: &ServerConfig,
    gateway: Arc<MutationGateway>,
) -> web::Data<HttpState> {
    let repository: Arc<dyn BookingRepository> = select_adapter::<_, dyn BookingRepository>(
        &config.db_pool,
        |pool| Arc::new(DieselBookingRepository::new(pool.clone())),
        || Arc::new(FixtureBookingRepository),
    );
    let bookings = BookingService::new(repository, Arc::new(DefaultClock));

    web::Data::new(HttpState::new(gateway, bookings))
}

/// Assemble the outbox delivery worker, or `None` when no database pool is
/// configured (there is no outbox to drain without one).
pub(super) fn build_delivery_worker(
    config: &ServerConfig,
) -> std::io::Result<Option<DeliveryWorker>> {
    let Some(pool) = &config.db_pool else {
        return Ok(None);
    };

    let repository = Arc::new(DieselOutboxRepository::new(pool.clone()));
    let metrics = build_delivery_metrics(config)?;
    let consumer = build_event_consumer(config)?;

    let worker = DeliveryWorker::new(
        DeliveryWorkerPorts::new(repository, metrics),
        Arc::new(DefaultClock),
        config.delivery.clone(),
    )
    .register(EventType::BookingCreated, consumer);

    Ok(Some(worker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::domain::idempotency::{CapturedResponse, IdempotencyKey};
    use backend::domain::principal::PrincipalId;
    use rstest::rstest;
    use serde_json::json;
    use std::net::SocketAddr;
    use url::Url;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().expect("loopback address")
    }

    #[rstest]
    fn pool_present_selects_real_adapter() {
        let selected = select_adapter(&Some(()), |_| Arc::new("real"), || Arc::new("fixture"));
        assert_eq!(*selected, "real");
    }

    #[rstest]
    fn pool_absent_selects_fixture_adapter() {
        let selected =
            select_adapter::<(), &str>(&None, |_| Arc::new("real"), || Arc::new("fixture"));
        assert_eq!(*selected, "fixture");
    }

    #[rstest]
    fn delivery_worker_requires_a_database_pool() {
        let config = ServerConfig::new(loopback());

        let worker = build_delivery_worker(&config).expect("builder should succeed");

        assert!(worker.is_none());
    }

    #[rstest]
    fn event_consumer_builds_for_webhook_endpoints() {
        let endpoint = Url::parse("https://hooks.example.com/bookings").expect("endpoint url");
        let config = ServerConfig::new(loopback()).with_webhook_endpoint(endpoint);

        assert!(build_event_consumer(&config).is_ok());
    }

    /// Without any backends the gateway still serves replays from the local
    /// tier and the fixture store.
    #[rstest]
    #[tokio::test]
    async fn degraded_gateway_replays_through_local_tier() {
        let config = ServerConfig::new(loopback());
        let gateway = build_gateway(&config).expect("gateway should build");

        let key = IdempotencyKey::random();
        let principal = PrincipalId::random();
        let payload = json!({"listingId": "11e4b3a0-0c34-4f88-a1a7-2ff326a3f3f1"});

        let first = gateway
            .execute(&key, &principal, &payload, || async {
                CapturedResponse::json(201, r#"{"ok":true}"#)
            })
            .await
            .expect("first execution should succeed");
        let second = gateway
            .execute(&key, &principal, &payload, || async {
                CapturedResponse::json(201, r#"{"ok":false}"#)
            })
            .await
            .expect("replay should succeed");

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(second.response, first.response);
    }
}

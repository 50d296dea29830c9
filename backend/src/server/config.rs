//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::time::Duration;

use backend::domain::{DeliveryConfig, GatewayConfig};
use backend::outbound::persistence::DbPool;
use backend::outbound::redis::RedisPool;
use url::Url;

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;

/// Default timeout for webhook delivery requests.
const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder-style configuration for creating the HTTP server.
///
/// The database pool, Redis pool, and webhook endpoint are all optional:
/// absent backends degrade to fixture or no-op adapters so the server can
/// still boot in development and test environments.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) redis_pool: Option<RedisPool>,
    pub(crate) webhook_endpoint: Option<Url>,
    pub(crate) webhook_timeout: Duration,
    pub(crate) gateway: GatewayConfig,
    pub(crate) delivery: DeliveryConfig,
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl ServerConfig {
    /// Construct a server configuration with default gateway and delivery
    /// settings.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            db_pool: None,
            redis_pool: None,
            webhook_endpoint: None,
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
            gateway: GatewayConfig::default(),
            delivery: DeliveryConfig::default(),
            #[cfg(feature = "metrics")]
            prometheus: None,
        }
    }

    /// Attach a database connection pool for persistence adapters.
    ///
    /// When provided, the server uses the Diesel-backed idempotency store,
    /// booking repository, and outbox repository, and starts the delivery
    /// worker and record sweeper.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Attach a Redis connection pool for the distributed cache tier and
    /// the stampede lock.
    #[must_use]
    pub fn with_redis_pool(mut self, pool: RedisPool) -> Self {
        self.redis_pool = Some(pool);
        self
    }

    /// Route delivered outbox events to a webhook endpoint.
    #[must_use]
    pub fn with_webhook_endpoint(mut self, endpoint: Url) -> Self {
        self.webhook_endpoint = Some(endpoint);
        self
    }

    /// Override the webhook request timeout.
    #[must_use]
    pub fn with_webhook_timeout(mut self, timeout: Duration) -> Self {
        self.webhook_timeout = timeout;
        self
    }

    /// Override the gateway tier configuration.
    #[must_use]
    pub fn with_gateway_config(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    /// Override the outbox delivery configuration.
    #[must_use]
    pub fn with_delivery_config(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = delivery;
        self
    }

    /// Return the socket address the server will bind to.
    #[cfg_attr(
        not(any(test, doctest)),
        expect(
            dead_code,
            reason = "Exercised by integration tests; retained for fixture access"
        )
    )]
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, prometheus: Option<PrometheusMetrics>) -> Self {
        self.prometheus = prometheus;
        self
    }

    #[cfg(feature = "metrics")]
    /// Return the configured Prometheus middleware, if any.
    #[cfg_attr(
        not(any(test, doctest)),
        expect(
            dead_code,
            reason = "Exercised by integration tests behind feature flags"
        )
    )]
    #[must_use]
    pub fn metrics(&self) -> Option<&PrometheusMetrics> {
        self.prometheus.as_ref()
    }
}

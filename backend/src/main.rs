//! Backend entry-point: wires the booking API, background workers, and OpenAPI docs.

mod server;

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use actix_web::web;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use backend::domain::{DeliveryConfig, GatewayConfig};
use backend::inbound::http::health::HealthState;
use backend::outbound::persistence::{DbPool, PoolConfig, run_migrations};
use backend::outbound::redis::{RedisPool, RedisPoolConfig};
use server::{ServerConfig, create_server};

#[cfg(feature = "metrics")]
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let bind_addr = parse_bind_addr()?;
    let mut config = ServerConfig::new(bind_addr)
        .with_gateway_config(GatewayConfig::from_env())
        .with_delivery_config(DeliveryConfig::from_env());

    match env::var("DATABASE_URL") {
        Ok(database_url) => {
            run_migrations(&database_url)
                .await
                .map_err(|e| std::io::Error::other(format!("database migrations failed: {e}")))?;
            let pool = DbPool::new(PoolConfig::new(database_url)).await.map_err(|e| {
                std::io::Error::other(format!("database pool construction failed: {e}"))
            })?;
            config = config.with_db_pool(pool);
        }
        Err(_) => warn!("DATABASE_URL not set; serving with in-memory fixtures (dev only)"),
    }

    match env::var("REDIS_URL") {
        Ok(redis_url) => match RedisPool::new(RedisPoolConfig::new(redis_url)).await {
            Ok(pool) => config = config.with_redis_pool(pool),
            Err(e) => {
                warn!(error = %e, "redis pool construction failed; distributed tier disabled");
            }
        },
        Err(_) => warn!("REDIS_URL not set; distributed cache and stampede lock disabled"),
    }

    match env::var("WEBHOOK_URL") {
        Ok(raw) => {
            let endpoint = Url::parse(&raw)
                .map_err(|e| std::io::Error::other(format!("invalid WEBHOOK_URL '{raw}': {e}")))?;
            config = config.with_webhook_endpoint(endpoint);
        }
        Err(_) => warn!("WEBHOOK_URL not set; outbox events will be consumed by a no-op sink"),
    }

    if let Ok(raw) = env::var("WEBHOOK_TIMEOUT_SECS") {
        match raw.parse::<u64>() {
            Ok(secs) => config = config.with_webhook_timeout(Duration::from_secs(secs)),
            Err(_) => warn!(value = %raw, "ignoring unparseable WEBHOOK_TIMEOUT_SECS"),
        }
    }

    #[cfg(feature = "metrics")]
    {
        config = config.with_metrics(Some(make_metrics()?));
    }

    let health_state = web::Data::new(HealthState::new());
    create_server(health_state, config)?.await
}

fn parse_bind_addr() -> std::io::Result<SocketAddr> {
    let raw = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    raw.parse()
        .map_err(|e| std::io::Error::other(format!("invalid BIND_ADDR '{raw}': {e}")))
}

#[cfg(feature = "metrics")]
fn make_metrics() -> std::io::Result<PrometheusMetrics> {
    PrometheusMetricsBuilder::new("hearth")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::other(format!("prometheus metrics construction failed: {e}")))
}

//! Server construction and middleware wiring.

mod config;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::ServerConfig;

#[cfg(feature = "metrics")]
use metrics::MetricsLayer;
use state_builders::{build_delivery_worker, build_gateway, build_http_state};

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use backend::domain::gateway::MutationGateway;
use backend::inbound::http::bookings::create_booking;
use backend::inbound::http::health::{HealthState, live, ready};
use backend::inbound::http::state::HttpState;
#[cfg(debug_assertions)]
use backend::doc::ApiDoc;
use backend::{Trace, TraceId};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
    } = deps;

    let api = web::scope("/api/v1").service(create_booking);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(api)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app;

    app
}

/// Periodically delete expired idempotency records from the durable tier.
///
/// Lookups already evict expired records lazily; the sweep bounds table
/// growth for keys that are never retried. Failures are logged and the
/// loop keeps polling.
fn spawn_record_sweeper(gateway: Arc<MutationGateway>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            // The first tick completes immediately, sweeping once at boot.
            ticker.tick().await;
            TraceId::scope(TraceId::generate(), async {
                match gateway.sweep_expired_records().await {
                    Ok(0) => {}
                    Ok(deleted) => info!(deleted, "expired idempotency records swept"),
                    Err(error) => warn!(%error, "idempotency record sweep failed"),
                }
            })
            .await;
        }
    });
}

/// Construct an Actix HTTP server using the provided health state and configuration.
///
/// Also spawns the background tasks owned by the process: the outbox
/// delivery worker and the idempotency record sweeper (both only when a
/// database pool is configured).
///
/// # Parameters
/// - `health_state`: shared readiness state updated once the server is initialised.
/// - `config`: pre-built [`ServerConfig`] containing binding, backend pools, and optional metrics settings.
///
/// # Returns
/// A spawned [`Server`] that must be awaited to drive the listener.
///
/// # Errors
/// Propagates [`std::io::Error`] when adapter construction, binding the
/// socket, or starting the server fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let gateway = build_gateway(&config)?;
    let http_state = build_http_state(&config, gateway.clone());

    if let Some(worker) = build_delivery_worker(&config)? {
        tokio::spawn(async move { worker.run().await });
    } else {
        warn!("no database pool configured; outbox delivery worker not started");
    }

    if config.db_pool.is_some() {
        spawn_record_sweeper(gateway, config.gateway.sweep_interval());
    }

    let ServerConfig {
        bind_addr,
        db_pool: _,
        redis_pool: _,
        webhook_endpoint: _,
        webhook_timeout: _,
        gateway: _,
        delivery: _,
        #[cfg(feature = "metrics")]
        prometheus,
    } = config;

    #[cfg(feature = "metrics")]
    let metrics_layer = MetricsLayer::from_option(prometheus);

    let server = HttpServer::new(move || {
        let app = build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
        });

        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics_layer.clone());

        app
    })
    .bind(bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}

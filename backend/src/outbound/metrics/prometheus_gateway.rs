//! Prometheus adapter for mutation gateway metrics.
//!
//! Exports gateway request outcomes via the `prometheus` crate. Metrics are
//! registered with a provided registry and exposed via the `/metrics`
//! endpoint.

use async_trait::async_trait;
use prometheus::{CounterVec, Opts, Registry};

use crate::domain::ports::{ConflictKind, GatewayMetrics, GatewayMetricsError, ResponseTier};

/// Prometheus-backed gateway metrics recorder.
///
/// Records replays, misses, conflicts, and degradations as increments to a
/// single counter metric with labels for outcome and serving tier.
///
/// # Metric Specification
///
/// - **Name**: `hearth_gateway_requests_total`
/// - **Type**: Counter
/// - **Labels**:
///   - `outcome`: `hit`, `miss`, `ownership_conflict`, `payload_conflict`,
///     `in_flight_conflict`, `fallback`, or `store_failure`
///   - `tier`: `local`, `distributed`, `durable`, or `n/a` when no tier
///     served the request
pub struct PrometheusGatewayMetrics {
    requests_total: CounterVec,
}

impl PrometheusGatewayMetrics {
    /// Create and register metrics with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric cannot be registered (e.g., if a metric
    /// with the same name already exists in the registry).
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new(
                "hearth_gateway_requests_total",
                "Total mutation gateway requests by outcome and serving tier",
            ),
            &["outcome", "tier"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;
        Ok(Self { requests_total })
    }

    /// Record a metric with the given outcome and tier labels.
    fn record(&self, outcome: &str, tier: &str) {
        self.requests_total.with_label_values(&[outcome, tier]).inc();
    }
}

#[async_trait]
impl GatewayMetrics for PrometheusGatewayMetrics {
    async fn record_hit(&self, tier: ResponseTier) -> Result<(), GatewayMetricsError> {
        self.record("hit", tier.as_str());
        Ok(())
    }

    async fn record_miss(&self) -> Result<(), GatewayMetricsError> {
        self.record("miss", "n/a");
        Ok(())
    }

    async fn record_conflict(&self, kind: ConflictKind) -> Result<(), GatewayMetricsError> {
        let outcome = match kind {
            ConflictKind::Ownership => "ownership_conflict",
            ConflictKind::Payload => "payload_conflict",
            ConflictKind::InFlight => "in_flight_conflict",
        };
        self.record(outcome, "n/a");
        Ok(())
    }

    async fn record_fallback(&self) -> Result<(), GatewayMetricsError> {
        self.record("fallback", "n/a");
        Ok(())
    }

    async fn record_store_failure(&self) -> Result<(), GatewayMetricsError> {
        self.record("store_failure", "n/a");
        Ok(())
    }
}

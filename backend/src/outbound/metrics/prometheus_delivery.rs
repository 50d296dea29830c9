//! Prometheus adapter for outbox delivery metrics.
//!
//! Exports delivery worker outcomes via the `prometheus` crate. Metrics are
//! registered with a provided registry and exposed via the `/metrics`
//! endpoint.

use async_trait::async_trait;
use prometheus::{CounterVec, Opts, Registry};

use crate::domain::ports::{DeliveryMetrics, DeliveryMetricsError};

/// Prometheus-backed delivery metrics recorder.
///
/// # Metric Specification
///
/// - **Name**: `hearth_outbox_deliveries_total`
/// - **Type**: Counter
/// - **Labels**:
///   - `outcome`: `delivered`, `retried`, `dead_lettered`, or `unroutable`
pub struct PrometheusDeliveryMetrics {
    deliveries_total: CounterVec,
}

impl PrometheusDeliveryMetrics {
    /// Create and register metrics with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric cannot be registered (e.g., if a metric
    /// with the same name already exists in the registry).
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let deliveries_total = CounterVec::new(
            Opts::new(
                "hearth_outbox_deliveries_total",
                "Total outbox delivery attempts by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(deliveries_total.clone()))?;
        Ok(Self { deliveries_total })
    }

    /// Record a delivery outcome.
    fn record(&self, outcome: &str) {
        self.deliveries_total.with_label_values(&[outcome]).inc();
    }
}

#[async_trait]
impl DeliveryMetrics for PrometheusDeliveryMetrics {
    async fn record_delivered(&self) -> Result<(), DeliveryMetricsError> {
        self.record("delivered");
        Ok(())
    }

    async fn record_retried(&self) -> Result<(), DeliveryMetricsError> {
        self.record("retried");
        Ok(())
    }

    async fn record_dead_lettered(&self) -> Result<(), DeliveryMetricsError> {
        self.record("dead_lettered");
        Ok(())
    }

    async fn record_unroutable(&self) -> Result<(), DeliveryMetricsError> {
        self.record("unroutable");
        Ok(())
    }
}

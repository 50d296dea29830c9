//! Domain port surface for recording outbox delivery outcomes.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording delivery metrics.
    pub enum DeliveryMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "delivery metrics exporter failed: {message}",
    }
}

/// Metrics recording port for delivery worker outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryMetrics: Send + Sync {
    /// Record a successful delivery.
    async fn record_delivered(&self) -> Result<(), DeliveryMetricsError>;

    /// Record a failed attempt that was rescheduled.
    async fn record_retried(&self) -> Result<(), DeliveryMetricsError>;

    /// Record an event parked after exhausting its retry budget.
    async fn record_dead_lettered(&self) -> Result<(), DeliveryMetricsError>;

    /// Record an event with no registered consumer.
    async fn record_unroutable(&self) -> Result<(), DeliveryMetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpDeliveryMetrics;

#[async_trait]
impl DeliveryMetrics for NoOpDeliveryMetrics {
    async fn record_delivered(&self) -> Result<(), DeliveryMetricsError> {
        Ok(())
    }

    async fn record_retried(&self) -> Result<(), DeliveryMetricsError> {
        Ok(())
    }

    async fn record_dead_lettered(&self) -> Result<(), DeliveryMetricsError> {
        Ok(())
    }

    async fn record_unroutable(&self) -> Result<(), DeliveryMetricsError> {
        Ok(())
    }
}

//! Outbound adapters for metrics exporting.
//!
//! This module provides Prometheus-backed implementations of domain metrics
//! ports. All adapters here are feature-gated behind the `metrics` feature.

mod prometheus_delivery;
mod prometheus_gateway;

pub use prometheus_delivery::PrometheusDeliveryMetrics;
pub use prometheus_gateway::PrometheusGatewayMetrics;

//! Domain port surface for recording mutation gateway outcomes.
//!
//! This port enables observability of replay behaviour without coupling the
//! gateway to a specific metrics backend. Implementations may export to
//! Prometheus, log to structured output, or simply discard metrics in tests.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording gateway metrics.
    pub enum GatewayMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "gateway metrics exporter failed: {message}",
    }
}

/// The tier that served a replayed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTier {
    /// Process-local cache.
    Local,
    /// Distributed cache.
    Distributed,
    /// Durable record store.
    Durable,
}

impl ResponseTier {
    /// Label value used by metrics backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Distributed => "distributed",
            Self::Durable => "durable",
        }
    }
}

/// The kind of conflict that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Key reused by a different principal.
    Ownership,
    /// Key reused with a different payload.
    Payload,
    /// Another request for the key is in flight.
    InFlight,
}

impl ConflictKind {
    /// Label value used by metrics backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ownership => "ownership",
            Self::Payload => "payload",
            Self::InFlight => "in_flight",
        }
    }
}

/// Metrics recording port for gateway outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayMetrics: Send + Sync {
    /// Record a replay served from the given tier.
    async fn record_hit(&self, tier: ResponseTier) -> Result<(), GatewayMetricsError>;

    /// Record a full miss (the mutation executed).
    async fn record_miss(&self) -> Result<(), GatewayMetricsError>;

    /// Record a rejected request.
    async fn record_conflict(&self, kind: ConflictKind) -> Result<(), GatewayMetricsError>;

    /// Record a degraded tier being skipped (breaker open or tier failure).
    async fn record_fallback(&self) -> Result<(), GatewayMetricsError>;

    /// Record an absorbed record-store failure.
    async fn record_store_failure(&self) -> Result<(), GatewayMetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
///
/// All methods immediately return `Ok(())` without side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpGatewayMetrics;

#[async_trait]
impl GatewayMetrics for NoOpGatewayMetrics {
    async fn record_hit(&self, _tier: ResponseTier) -> Result<(), GatewayMetricsError> {
        Ok(())
    }

    async fn record_miss(&self) -> Result<(), GatewayMetricsError> {
        Ok(())
    }

    async fn record_conflict(&self, _kind: ConflictKind) -> Result<(), GatewayMetricsError> {
        Ok(())
    }

    async fn record_fallback(&self) -> Result<(), GatewayMetricsError> {
        Ok(())
    }

    async fn record_store_failure(&self) -> Result<(), GatewayMetricsError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Ensures NoOpGatewayMetrics accepts every outcome kind.
    use super::*;

    #[tokio::test]
    async fn noop_accepts_all_outcomes() {
        let metrics = NoOpGatewayMetrics;
        assert!(metrics.record_hit(ResponseTier::Local).await.is_ok());
        assert!(metrics.record_miss().await.is_ok());
        assert!(
            metrics
                .record_conflict(ConflictKind::InFlight)
                .await
                .is_ok()
        );
        assert!(metrics.record_fallback().await.is_ok());
        assert!(metrics.record_store_failure().await.is_ok());
    }

    #[test]
    fn tier_labels_are_stable() {
        assert_eq!(ResponseTier::Local.as_str(), "local");
        assert_eq!(ResponseTier::Distributed.as_str(), "distributed");
        assert_eq!(ResponseTier::Durable.as_str(), "durable");
    }

    #[test]
    fn error_constructor_accepts_str() {
        let err = GatewayMetricsError::export("test error");
        assert_eq!(err.to_string(), "gateway metrics exporter failed: test error");
    }
}

//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on the gateway and domain services and remain testable without
//! real infrastructure.

use std::sync::Arc;

use crate::domain::{BookingService, MutationGateway};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Idempotent mutation gateway wrapping every deduplicated endpoint.
    pub gateway: Arc<MutationGateway>,
    /// Booking creation service (the demo mutation).
    pub bookings: BookingService,
}

impl HttpState {
    /// Construct state from the gateway and the booking service.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use backend::domain::ports::{
    ///     FixtureBookingRepository, FixtureIdempotencyStore, NoOpGatewayMetrics,
    ///     NoOpMutationLock, NoOpResponseCache,
    /// };
    /// use backend::domain::{
    ///     BookingService, GatewayConfig, MutationGateway, MutationGatewayPorts,
    /// };
    /// use backend::inbound::http::state::HttpState;
    /// use mockable::DefaultClock;
    ///
    /// let clock = Arc::new(DefaultClock);
    /// let ports = MutationGatewayPorts::new(
    ///     Arc::new(NoOpResponseCache),
    ///     Arc::new(NoOpResponseCache),
    ///     Arc::new(FixtureIdempotencyStore),
    ///     Arc::new(NoOpMutationLock),
    ///     Arc::new(NoOpGatewayMetrics),
    /// );
    /// let gateway = Arc::new(MutationGateway::new(
    ///     ports,
    ///     clock.clone(),
    ///     GatewayConfig::default(),
    /// ));
    /// let bookings = BookingService::new(Arc::new(FixtureBookingRepository), clock);
    /// let state = HttpState::new(gateway, bookings);
    /// let _gateway = state.gateway.clone();
    /// ```
    pub fn new(gateway: Arc<MutationGateway>, bookings: BookingService) -> Self {
        Self { gateway, bookings }
    }
}

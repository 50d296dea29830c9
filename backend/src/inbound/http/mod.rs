//! HTTP inbound adapter exposing REST endpoints.

pub mod bookings;
pub mod error;
pub mod health;
pub mod idempotency;
pub mod principal;
pub mod state;

pub use error::ApiResult;

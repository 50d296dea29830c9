//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! This module provides concrete implementations of domain repository ports
//! backed by PostgreSQL via the Diesel ORM with async support through
//! `diesel-async` and `bb8` connection pooling.
//!
//! # Architecture
//!
//! The persistence layer follows these principles:
//!
//! - **Thin adapters**: Repository implementations only translate between
//!   Diesel models and domain types. No business logic resides here.
//! - **Internal models**: Diesel row structs (`models.rs`) and schema
//!   definitions (`schema.rs`) are internal implementation details, never
//!   exposed to the domain layer.
//! - **Async-safe pooling**: Connections are managed via `bb8` pools with
//!   proper async integration through `diesel-async`.
//! - **Strongly typed errors**: All database errors are mapped to domain
//!   port error types.
//!
//! # Example
//!
//! ```ignore
//! use backend::outbound::persistence::{DbPool, PoolConfig, DieselIdempotencyStore};
//!
//! let config = PoolConfig::new("postgres://localhost/hearth");
//! let pool = DbPool::new(config).await?;
//! let store = DieselIdempotencyStore::new(pool);
//! ```

mod diesel_booking_repository;
pub(crate) mod diesel_helpers;
mod diesel_idempotency_store;
mod diesel_outbox_repository;
mod migrations;
mod models;
mod outbox_writer;
mod pool;
mod schema;

pub use diesel_booking_repository::DieselBookingRepository;
pub use diesel_idempotency_store::DieselIdempotencyStore;
pub use diesel_outbox_repository::DieselOutboxRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};

//! Embedded Diesel migrations and startup application.
//!
//! Migrations are compiled into the binary so deployment never depends on a
//! migrations directory being present next to the executable. They run once
//! at startup, before the pool is handed to any adapter.

use diesel::Connection;
use diesel_async::AsyncPgConnection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

/// Embedded migrations from the backend/migrations directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Errors produced while applying migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Connecting to the database failed.
    #[error("migration connection failed: {message}")]
    Connection { message: String },
    /// A migration failed to apply.
    #[error("migration failed to apply: {message}")]
    Apply { message: String },
}

impl MigrationError {
    /// Create a connection error with the provided message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an apply error with the provided message.
    pub fn apply(message: impl Into<String>) -> Self {
        Self::Apply {
            message: message.into(),
        }
    }
}

/// Apply all pending migrations against the given database.
///
/// The migration harness is synchronous, so the work runs on a blocking
/// thread with a wrapped async connection rather than stalling the runtime.
pub async fn run_migrations(database_url: &str) -> Result<(), MigrationError> {
    let url = database_url.to_owned();

    let applied = tokio::task::spawn_blocking(move || {
        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&url)
            .map_err(|err| MigrationError::connection(err.to_string()))?;
        let versions = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| MigrationError::apply(err.to_string()))?;
        Ok::<usize, MigrationError>(versions.len())
    })
    .await
    .map_err(|err| MigrationError::apply(format!("migration task panicked: {err}")))??;

    info!(applied, "database migrations applied");
    Ok(())
}

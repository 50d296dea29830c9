//! Redis connection pool configuration and management.
//!
//! Wraps bb8-redis so the cache and lock adapters share one checkout
//! surface, mirroring the PostgreSQL pool on the persistence side.

use std::time::Duration;

use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection};

/// Errors that can occur when building or using the Redis pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RedisPoolError {
    /// Checking a connection out of the pool failed.
    #[error("failed to check out redis connection: {message}")]
    Checkout { message: String },
    /// Building the pool itself failed.
    #[error("failed to build redis pool: {message}")]
    Build { message: String },
}

impl RedisPoolError {
    /// Create a checkout error with the provided message.
    pub fn checkout(message: impl Into<String>) -> Self {
        Self::Checkout {
            message: message.into(),
        }
    }

    /// Create a build error with the provided message.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }
}

/// Configuration for the Redis connection pool.
///
/// The checkout timeout is short: the tiers behind this pool are
/// accelerators, and a slow checkout must surface as a tier failure the
/// gateway can route around rather than stall the request.
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    url: String,
    max_size: u32,
    connection_timeout: Duration,
}

impl RedisPoolConfig {
    /// Create a new pool configuration with default sizing.
    ///
    /// # Example
    ///
    /// ```
    /// use backend::outbound::redis::RedisPoolConfig;
    ///
    /// let config = RedisPoolConfig::new("redis://localhost:6379");
    /// ```
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_size: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }

    /// Set the maximum number of pooled connections.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the connection checkout timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Access the configured Redis URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Asynchronous Redis connection pool.
///
/// Cheap to clone; all clones share the same underlying pool.
#[derive(Clone)]
pub struct RedisPool {
    inner: Pool<RedisConnectionManager>,
}

impl RedisPool {
    /// Build a pool from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RedisPoolError::Build`] if the URL cannot be parsed or the
    /// pool cannot be constructed.
    pub async fn new(config: RedisPoolConfig) -> Result<Self, RedisPoolError> {
        let manager = RedisConnectionManager::new(config.url.as_str())
            .map_err(|err| RedisPoolError::build(err.to_string()))?;
        let inner = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|err| RedisPoolError::build(err.to_string()))?;
        Ok(Self { inner })
    }

    /// Check a connection out of the pool.
    ///
    /// # Errors
    ///
    /// Returns [`RedisPoolError::Checkout`] if no connection becomes
    /// available within the configured timeout.
    pub async fn get(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, RedisPoolError> {
        self.inner
            .get()
            .await
            .map_err(|err| RedisPoolError::checkout(err.to_string()))
    }
}

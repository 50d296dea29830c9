//! Redis-backed distributed response cache.
//!
//! The middle replay tier: slower than process memory, faster than the
//! database, and shared across server instances so a retry landing on a
//! different instance still replays the captured response.
//!
//! Entries are stored as JSON strings under a versioned namespace and expire
//! via Redis TTL with a small random reduction, so entries written in a
//! burst do not all expire in the same instant.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng as _};

use crate::domain::ports::{ResponseCache, ResponseCacheError};
use crate::domain::{CacheEntry, IdempotencyKey};

use super::pool::{RedisPool, RedisPoolError};

/// Key namespace for cached responses.
///
/// Versioned so a breaking change to the entry encoding rolls out by bumping
/// the namespace instead of flushing Redis.
const CACHE_NAMESPACE: &str = "idem:v1:";

/// Redis-backed implementation of the `ResponseCache` port.
#[derive(Clone)]
pub struct RedisResponseCache {
    pool: RedisPool,
}

impl RedisResponseCache {
    /// Create a new cache with the given connection pool.
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

fn storage_key(key: &IdempotencyKey) -> String {
    format!("{CACHE_NAMESPACE}{key}")
}

/// Map pool errors to response cache errors.
fn map_pool_error(error: RedisPoolError) -> ResponseCacheError {
    match error {
        RedisPoolError::Checkout { message } | RedisPoolError::Build { message } => {
            ResponseCacheError::connection(message)
        }
    }
}

/// Map Redis command errors to response cache errors.
fn map_redis_error(error: redis::RedisError) -> ResponseCacheError {
    ResponseCacheError::command(error.to_string())
}

/// Reduce a TTL by up to a tenth so co-written entries expire apart.
fn jittered_ttl_secs(ttl: Duration) -> u64 {
    let ttl_secs = ttl.as_secs().max(1);
    let budget = ttl_secs / 10;
    if budget == 0 {
        return ttl_secs;
    }
    let mut rng = SmallRng::from_entropy();
    let jitter = rng.gen_range(0..=budget);
    (ttl_secs - jitter).max(1)
}

#[async_trait]
impl ResponseCache for RedisResponseCache {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<CacheEntry>, ResponseCacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let storage_key = storage_key(key);

        let raw: Option<String> = redis::cmd("GET")
            .arg(&storage_key)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;

        match raw {
            Some(encoded) => {
                let entry = serde_json::from_str(&encoded).map_err(|err| {
                    ResponseCacheError::serialization(format!("corrupted cache entry: {err}"))
                })?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &IdempotencyKey,
        entry: &CacheEntry,
        ttl: Duration,
    ) -> Result<(), ResponseCacheError> {
        let encoded = serde_json::to_string(entry)
            .map_err(|err| ResponseCacheError::serialization(err.to_string()))?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let storage_key = storage_key(key);
        let ttl_secs = jittered_ttl_secs(ttl);

        let _: () = redis::cmd("SET")
            .arg(&storage_key)
            .arg(&encoded)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;

        Ok(())
    }
}

//! Redis-backed per-key stampede lock.
//!
//! Acquisition is a single `SET key holder NX PX ttl` round trip: atomic
//! set-if-absent with a millisecond expiry. The expiry bounds how long a
//! crashed holder can block the key, and the stored holder id identifies the
//! blocking principal when operators inspect a stuck key.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis;

use crate::domain::ports::{LockAcquisition, MutationLock, MutationLockError};
use crate::domain::{IdempotencyKey, PrincipalId};

use super::pool::{RedisPool, RedisPoolError};

/// Key namespace for stampede locks.
///
/// Distinct from the response cache namespace so a lock can never shadow a
/// cached entry.
const LOCK_NAMESPACE: &str = "idem:lock:v1:";

/// Redis-backed implementation of the `MutationLock` port.
#[derive(Clone)]
pub struct RedisMutationLock {
    pool: RedisPool,
}

impl RedisMutationLock {
    /// Create a new lock with the given connection pool.
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

fn storage_key(key: &IdempotencyKey) -> String {
    format!("{LOCK_NAMESPACE}{key}")
}

/// Map pool errors to mutation lock errors.
fn map_pool_error(error: RedisPoolError) -> MutationLockError {
    match error {
        RedisPoolError::Checkout { message } | RedisPoolError::Build { message } => {
            MutationLockError::connection(message)
        }
    }
}

/// Map Redis command errors to mutation lock errors.
fn map_redis_error(error: redis::RedisError) -> MutationLockError {
    MutationLockError::command(error.to_string())
}

#[async_trait]
impl MutationLock for RedisMutationLock {
    async fn acquire(
        &self,
        key: &IdempotencyKey,
        holder: &PrincipalId,
        ttl: Duration,
    ) -> Result<LockAcquisition, MutationLockError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let storage_key = storage_key(key);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        // NX makes this fail silently when the key exists; the nil reply is
        // how Redis says another holder got there first.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&storage_key)
            .arg(holder.as_uuid().to_string())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;

        Ok(match reply {
            Some(_) => LockAcquisition::Acquired,
            None => LockAcquisition::Held,
        })
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<(), MutationLockError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let storage_key = storage_key(key);

        let _: () = redis::cmd("DEL")
            .arg(&storage_key)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;

        Ok(())
    }
}

//! Port abstraction for durable idempotency record persistence.
//!
//! The [`IdempotencyStore`] trait defines the contract for the authoritative
//! response tier. Adapters implement this trait to provide durable storage
//! (e.g., PostgreSQL) that survives server restarts and cache flushes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{IdempotencyKey, IdempotencyRecord};

use super::define_port_error;

define_port_error! {
    /// Errors raised by idempotency store adapters.
    pub enum IdempotencyStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "idempotency store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "idempotency store query failed: {message}",
        /// Record encoding or decoding failed.
        Serialization { message: String } => "idempotency store serialization failed: {message}",
        /// A record with this key already exists (concurrent insert race).
        DuplicateKey { message: String } => "idempotency key already exists: {message}",
    }
}

/// Port for the durable idempotency record tier.
///
/// Lookups are by key alone; ownership and payload comparison happen in the
/// gateway so the conflict rules live in one place regardless of which tier
/// produced the record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Fetch the record for a key, if one exists.
    ///
    /// Expired records may still be returned; the gateway treats them as
    /// absent and calls [`IdempotencyStore::remove`] to evict lazily.
    async fn find(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError>;

    /// Insert a new record.
    ///
    /// Returns [`IdempotencyStoreError::DuplicateKey`] if a record for the
    /// key already exists, which signals a concurrent insert race.
    async fn insert(&self, record: &IdempotencyRecord) -> Result<(), IdempotencyStoreError>;

    /// Delete the record for a key.
    ///
    /// Used for lazy eviction when a lookup finds an expired record.
    async fn remove(&self, key: &IdempotencyKey) -> Result<(), IdempotencyStoreError>;

    /// Remove all records whose expiry has passed.
    ///
    /// Returns the number of records deleted.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, IdempotencyStoreError>;
}

/// Fixture implementation for testing without a real database.
///
/// Always reports no record and discards inserts. Use it in unit tests where
/// durable-tier behaviour is not under test.
#[derive(Debug, Default)]
pub struct FixtureIdempotencyStore;

#[async_trait]
impl IdempotencyStore for FixtureIdempotencyStore {
    async fn find(
        &self,
        _key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError> {
        Ok(None)
    }

    async fn insert(&self, _record: &IdempotencyRecord) -> Result<(), IdempotencyStoreError> {
        Ok(())
    }

    async fn remove(&self, _key: &IdempotencyKey) -> Result<(), IdempotencyStoreError> {
        Ok(())
    }

    async fn sweep_expired(&self, _now: DateTime<Utc>) -> Result<u64, IdempotencyStoreError> {
        Ok(0)
    }
}

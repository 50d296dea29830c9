//! Port abstraction for the fast response-replay tiers.
//!
//! Both the process-local tier and the distributed tier implement
//! [`ResponseCache`]; the gateway treats them uniformly and only their
//! lifetimes and failure modes differ. Cache tiers are accelerators, never
//! authoritative: a miss or failure here always falls through to the next
//! tier.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{CacheEntry, IdempotencyKey};

use super::define_port_error;

define_port_error! {
    /// Errors raised by response cache adapters.
    pub enum ResponseCacheError {
        /// Cache connection could not be established.
        Connection { message: String } => "response cache connection failed: {message}",
        /// Cache command failed during execution.
        Command { message: String } => "response cache command failed: {message}",
        /// Entry encoding or decoding failed.
        Serialization { message: String } => "response cache serialization failed: {message}",
    }
}

/// Port for a response-replay cache tier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Fetch the cached entry for a key, if present and unexpired.
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<CacheEntry>, ResponseCacheError>;

    /// Store an entry under a key with the given time-to-live.
    async fn put(
        &self,
        key: &IdempotencyKey,
        entry: &CacheEntry,
        ttl: Duration,
    ) -> Result<(), ResponseCacheError>;
}

/// Cache that stores nothing and never hits.
///
/// Used when a tier is not configured (e.g. no Redis URL); the gateway then
/// leans entirely on the remaining tiers.
#[derive(Debug, Default)]
pub struct NoOpResponseCache;

#[async_trait]
impl ResponseCache for NoOpResponseCache {
    async fn get(&self, _key: &IdempotencyKey) -> Result<Option<CacheEntry>, ResponseCacheError> {
        Ok(None)
    }

    async fn put(
        &self,
        _key: &IdempotencyKey,
        _entry: &CacheEntry,
        _ttl: Duration,
    ) -> Result<(), ResponseCacheError> {
        Ok(())
    }
}

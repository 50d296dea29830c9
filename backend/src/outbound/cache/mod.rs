//! Process-local response cache backed by moka.
//!
//! The fastest replay tier: a bounded in-process cache that answers most
//! immediate retries without any network round trip. Entries are evicted by
//! capacity and by per-entry time-to-live, so the tier never outlives the
//! durable record it mirrors.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use uuid::Uuid;

use crate::domain::ports::{ResponseCache, ResponseCacheError};
use crate::domain::{CacheEntry, IdempotencyKey};

/// Cached entry paired with the TTL it was stored under.
///
/// moka expiry policies are cache-wide, but the port hands each `put` its
/// own TTL; carrying the TTL in the value lets one policy honour them all.
#[derive(Clone)]
struct EntryWithTtl {
    entry: CacheEntry,
    ttl: Duration,
}

/// Expiry policy that reads each entry's own TTL.
struct PerEntryExpiry;

impl moka::Expiry<Uuid, EntryWithTtl> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &Uuid,
        value: &EntryWithTtl,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &Uuid,
        value: &EntryWithTtl,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Moka-backed implementation of the `ResponseCache` port.
///
/// Cheap to clone; all clones share the same underlying cache.
#[derive(Clone)]
pub struct MokaResponseCache {
    entries: Cache<Uuid, EntryWithTtl>,
}

impl MokaResponseCache {
    /// Create a cache bounded to `max_capacity` entries.
    pub fn new(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .build();
        Self { entries }
    }
}

#[async_trait]
impl ResponseCache for MokaResponseCache {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<CacheEntry>, ResponseCacheError> {
        Ok(self
            .entries
            .get(key.as_uuid())
            .await
            .map(|stored| stored.entry))
    }

    async fn put(
        &self,
        key: &IdempotencyKey,
        entry: &CacheEntry,
        ttl: Duration,
    ) -> Result<(), ResponseCacheError> {
        self.entries
            .insert(
                *key.as_uuid(),
                EntryWithTtl {
                    entry: entry.clone(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;

    use crate::domain::{CapturedResponse, PayloadFingerprint, PrincipalId};

    use super::*;

    fn sample_entry() -> CacheEntry {
        CacheEntry {
            principal: PrincipalId::random(),
            fingerprint: PayloadFingerprint::of(&json!({"listingId": "l-1"}))
                .expect("fingerprint should compute"),
            response: CapturedResponse::json(201, r#"{"bookingId":"b-1"}"#),
            cached_at: Utc::now(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn put_then_get_returns_entry() {
        let cache = MokaResponseCache::new(16);
        let key = IdempotencyKey::random();
        let entry = sample_entry();

        cache
            .put(&key, &entry, Duration::from_secs(60))
            .await
            .expect("put should succeed");
        let found = cache.get(&key).await.expect("get should succeed");
        assert_eq!(found, Some(entry));
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_key_misses() {
        let cache = MokaResponseCache::new(16);
        let found = cache
            .get(&IdempotencyKey::random())
            .await
            .expect("get should succeed");
        assert!(found.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn entries_expire_by_their_own_ttl() {
        let cache = MokaResponseCache::new(16);
        let short = IdempotencyKey::random();
        let long = IdempotencyKey::random();
        let entry = sample_entry();

        cache
            .put(&short, &entry, Duration::from_millis(20))
            .await
            .expect("put should succeed");
        cache
            .put(&long, &entry, Duration::from_secs(60))
            .await
            .expect("put should succeed");

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(
            cache
                .get(&short)
                .await
                .expect("get should succeed")
                .is_none()
        );
        assert!(
            cache
                .get(&long)
                .await
                .expect("get should succeed")
                .is_some()
        );
    }

    #[rstest]
    #[tokio::test]
    async fn overwrite_replaces_the_entry() {
        let cache = MokaResponseCache::new(16);
        let key = IdempotencyKey::random();
        let first = sample_entry();
        let second = CacheEntry {
            response: CapturedResponse::json(200, r#"{"bookingId":"b-2"}"#),
            ..sample_entry()
        };

        cache
            .put(&key, &first, Duration::from_secs(60))
            .await
            .expect("put should succeed");
        cache
            .put(&key, &second, Duration::from_secs(60))
            .await
            .expect("put should succeed");

        let found = cache.get(&key).await.expect("get should succeed");
        assert_eq!(found, Some(second));
    }
}

// ============================================================================
// DOCUMENT CACHE
// ============================================================================
// Time-based memoization of folder fetches. One entry per folder id, dropped
// when its TTL passes or when the user asks for a refresh.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

use super::document_fetcher::{DocumentFetcher, FetchOutcome};
use crate::core::auth::{AccessResolver, AuthError, DriveAccess};
use crate::core::clock::Clock;

/// How long a fetched folder stays cached.
pub const DEFAULT_TTL_SECS: i64 = 3600;

struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// A key/value cache whose entries expire after a fixed duration.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Returns the cached value if it has not expired yet.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // Re-checked under the write lock: a concurrent insert may have
        // replaced the stale entry.
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Stores `value`, replacing any previous entry for `key`.
    pub fn insert(&self, key: K, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The document fetcher with its results memoized per folder.
pub struct CachedDocuments<R: AccessResolver> {
    fetcher: DocumentFetcher<R>,
    cache: TtlCache<String, Arc<FetchOutcome>>,
}

impl<R: AccessResolver> CachedDocuments<R> {
    pub fn new(fetcher: DocumentFetcher<R>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(fetcher, Duration::seconds(DEFAULT_TTL_SECS), clock)
    }

    pub fn with_ttl(fetcher: DocumentFetcher<R>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            cache: TtlCache::new(ttl, clock),
        }
    }

    pub fn fetcher(&self) -> &DocumentFetcher<R> {
        &self.fetcher
    }

    /// Returns the cached outcome for `folder_id`, fetching it if needed.
    ///
    /// Credential errors are returned without touching the cache.
    pub async fn load(&self, folder_id: &str) -> Result<Arc<FetchOutcome>, AuthError> {
        let key = folder_id.to_string();
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!("Document cache hit for folder {}", folder_id);
            return Ok(hit);
        }

        let outcome = Arc::new(self.fetcher.fetch_all(folder_id).await?);
        self.cache.insert(key, Arc::clone(&outcome));
        Ok(outcome)
    }

    /// Like [`load`](Self::load), but a miss is fetched with `access`
    /// instead of resolving credentials again.
    pub async fn load_with(&self, folder_id: &str, access: &DriveAccess) -> Arc<FetchOutcome> {
        let key = folder_id.to_string();
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!("Document cache hit for folder {}", folder_id);
            return hit;
        }

        let outcome = Arc::new(self.fetcher.fetch_with(folder_id, access).await);
        self.cache.insert(key, Arc::clone(&outcome));
        outcome
    }

    /// Drops every cached folder so the next load fetches again.
    pub fn invalidate_all(&self) {
        tracing::info!("Clearing document cache ({} entries)", self.cache.len());
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::testing::ManualClock;
    use crate::core::drive::document_fetcher::tests::{file, FakeDrive, StaticResolver};
    use std::sync::atomic::Ordering;

    fn cached(drive: Arc<FakeDrive>, clock: Arc<ManualClock>) -> CachedDocuments<StaticResolver> {
        let fetcher = DocumentFetcher::new(StaticResolver {
            access: DriveAccess::Viewer(drive),
        });
        CachedDocuments::new(fetcher, clock)
    }

    fn drive_with_one_file() -> Arc<FakeDrive> {
        Arc::new(FakeDrive {
            files: vec![file("1", "notice.pdf", "application/pdf")],
            ..Default::default()
        })
    }

    #[test]
    fn test_ttl_cache_expiry() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::seconds(10), clock.clone());

        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));

        clock.advance(Duration::seconds(9));
        assert_eq!(cache.get(&"a"), Some(1));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_ttl_cache_one_entry_per_key() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::seconds(10), clock);

        cache.insert("a".to_string(), 1);
        cache.insert("a".to_string(), 2);
        cache.insert("b".to_string(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string()), Some(2));

        cache.invalidate_all();
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn test_expired_read_never_drops_a_fresh_insert() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::seconds(10), clock.clone());
        let stale_at = clock.now() - Duration::seconds(1);

        for round in 0..500 {
            cache.entries.insert(
                "a",
                CacheEntry {
                    value: 0,
                    expires_at: stale_at,
                },
            );

            std::thread::scope(|s| {
                s.spawn(|| cache.get(&"a"));
                s.spawn(|| cache.insert("a", round + 1));
            });

            assert_eq!(cache.get(&"a"), Some(round + 1), "round {round}");
        }
    }

    #[tokio::test]
    async fn test_second_load_within_ttl_is_served_from_cache() {
        let drive = drive_with_one_file();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let docs = cached(drive.clone(), clock.clone());

        let first = docs.load("folder").await.unwrap();
        clock.advance(Duration::seconds(DEFAULT_TTL_SECS - 1));
        let second = docs.load("folder").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(drive.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_after_expiry_fetches_once_more() {
        let drive = drive_with_one_file();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let docs = cached(drive.clone(), clock.clone());

        docs.load("folder").await.unwrap();
        clock.advance(Duration::seconds(DEFAULT_TTL_SECS));
        docs.load("folder").await.unwrap();
        docs.load("folder").await.unwrap();

        assert_eq!(drive.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidation_forces_one_new_fetch() {
        let drive = drive_with_one_file();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let docs = cached(drive.clone(), clock);

        docs.load("folder").await.unwrap();
        docs.invalidate_all();
        let reloaded = docs.load("folder").await.unwrap();
        docs.load("folder").await.unwrap();

        assert_eq!(drive.list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(reloaded.knowledge_base().names(), vec!["notice.pdf"]);
    }

    #[tokio::test]
    async fn test_load_with_resolved_access_fills_the_cache() {
        let drive = drive_with_one_file();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let docs = cached(drive.clone(), clock);

        let first = docs
            .load_with("folder", &DriveAccess::Viewer(drive.clone()))
            .await;
        let second = docs.load("folder").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(drive.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_are_cached_separately() {
        let drive = drive_with_one_file();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let docs = cached(drive.clone(), clock);

        docs.load("folder-a").await.unwrap();
        docs.load("folder-b").await.unwrap();
        docs.load("folder-a").await.unwrap();

        assert_eq!(drive.list_calls.load(Ordering::SeqCst), 2);
    }
}

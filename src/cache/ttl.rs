//! In-memory cache with a fixed time-to-live per entry, backed by moka.
//! Concurrent misses on one key share a single fetch.

use eyre::{eyre, Result};
use moka::future::Cache;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tracing::trace;

/// Distinct keys the dashboard can ask for stay small; this only bounds
/// memory if a caller misbehaves
const MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
pub struct TtlCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Fresh value if any
    pub async fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).await
    }

    #[cfg(test)]
    pub async fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value).await;
    }

    /// Cached value when younger than the TTL, otherwise await `fetch` and
    /// store its result. Callers racing on the same key wait for the one
    /// fetch in flight. Errors are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let label = format!("{:?}", key);
        self.entries
            .try_get_with(key, async move {
                trace!("TTL cache miss: {}", label);
                fetch().await
            })
            .await
            .map_err(|e| eyre!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fresh_entries_are_reused() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch("pools", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        let calls = &AtomicUsize::new(0);
        let slow_fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(11)
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch("dashboard", slow_fetch),
            cache.get_or_fetch("dashboard", slow_fetch),
            cache.get_or_fetch("dashboard", slow_fetch),
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (11, 11, 11));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_entries_are_refetched() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_millis(10));
        cache.insert("pools", 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get(&"pools").await, None);
        let value = cache.get_or_fetch("pools", || async { Ok(2) }).await.unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        let result = cache
            .get_or_fetch("pools", || async { Err(eyre!("index down")) })
            .await;
        assert!(result.unwrap_err().to_string().contains("index down"));
        assert_eq!(cache.get(&"pools").await, None);

        let value = cache.get_or_fetch("pools", || async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
    }
}

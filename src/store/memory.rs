use crate::core::cache::{Cache, CacheEntry, CacheStats};
use crate::core::holding::{Holding, Transaction};
use crate::core::ticker::Ticker;
use crate::store::{PortfolioStore, PriceUpdate};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::RwLock;
use tracing::debug;

/// In-memory cache on a sharded map: readers and writers of different keys
/// do not contend. Writes to the same key are last-write-wins.
pub struct MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: DashMap<K, CacheEntry<V>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<CacheEntry<V>> {
        match self.inner.get(key) {
            Some(entry) => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value().clone())
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    fn put_at(&self, key: K, value: V, fetched_at: DateTime<Utc>) {
        debug!("Cache PUT for key: {:?}", key);
        let mut entry = self.inner.entry(key).or_insert_with(|| CacheEntry {
            value: value.clone(),
            fetched_at,
        });
        // A late writer keeps the newer timestamp so freshness never regresses.
        entry.fetched_at = entry.fetched_at.max(fetched_at);
        entry.value = value;
    }

    fn remove(&self, key: &K) {
        self.inner.remove(key);
        debug!("Cache REMOVE for key: {:?}", key);
    }

    fn clear(&self) {
        self.inner.clear();
        debug!("Cache CLEAR");
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn stats(&self, ttl: Duration) -> CacheStats {
        let now = Utc::now();
        let fresh = self
            .inner
            .iter()
            .filter(|entry| entry.value().is_fresh_at(ttl, now))
            .count();
        CacheStats {
            total: self.inner.len(),
            fresh,
        }
    }
}

/// Holdings and transactions kept in memory, with written-back prices
/// recorded per ticker.
#[derive(Default)]
pub struct MemoryStore {
    holdings: RwLock<Vec<Holding>>,
    transactions: RwLock<Vec<Transaction>>,
    written: DashMap<Ticker, PriceUpdate>,
    rejected: DashSet<Ticker>,
}

impl MemoryStore {
    pub fn new(holdings: Vec<Holding>, transactions: Vec<Transaction>) -> Self {
        Self {
            holdings: RwLock::new(holdings),
            transactions: RwLock::new(transactions),
            ..Default::default()
        }
    }

    pub fn written_price(&self, ticker: &Ticker) -> Option<PriceUpdate> {
        self.written.get(ticker).map(|entry| entry.value().clone())
    }

    /// Makes every write for `ticker` fail, to exercise partial write-backs.
    pub fn reject_writes_for(&self, ticker: &Ticker) {
        self.rejected.insert(ticker.clone());
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn holdings(&self) -> Result<Vec<Holding>> {
        self.holdings
            .read()
            .map(|h| h.clone())
            .map_err(|_| anyhow!("Holdings lock poisoned"))
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.transactions
            .read()
            .map(|t| t.clone())
            .map_err(|_| anyhow!("Transactions lock poisoned"))
    }

    async fn write_price(&self, update: &PriceUpdate) -> Result<()> {
        if self.rejected.contains(&update.ticker) {
            return Err(anyhow!("Write rejected for {}", update.ticker));
        }
        self.written.insert(update.ticker.clone(), update.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cache_get_put() {
        let cache = MemoryCache::<String, i32>::new();

        // Initially, cache is empty
        assert!(cache.get(&"key1".to_string()).is_none());
        assert!(cache.is_empty());

        cache.put("key1".to_string(), 123);
        assert_eq!(cache.get(&"key1".to_string()).unwrap().value, 123);

        // Refresh replaces rather than appends
        cache.put("key1".to_string(), 456);
        assert_eq!(cache.get(&"key1".to_string()).unwrap().value, 456);
        assert_eq!(cache.len(), 1);

        assert!(cache.get(&"key2".to_string()).is_none());
    }

    #[test]
    fn test_expired_entries_are_still_readable() {
        let cache = MemoryCache::<String, i32>::new();
        let ttl = Duration::seconds(300);

        cache.put_at(
            "old".to_string(),
            1,
            Utc::now() - Duration::seconds(600),
        );
        cache.put("new".to_string(), 2);

        assert!(!cache.is_fresh(&"old".to_string(), ttl));
        assert!(cache.is_fresh(&"new".to_string(), ttl));
        assert!(!cache.is_fresh(&"missing".to_string(), ttl));
        // Lazy expiry: the stale value is still there for fallbacks
        assert_eq!(cache.get(&"old".to_string()).unwrap().value, 1);
        assert_eq!(cache.stats(ttl), CacheStats { total: 2, fresh: 1 });
    }

    #[test]
    fn test_fetched_at_never_moves_backwards() {
        let cache = MemoryCache::<String, i32>::new();
        let now = Utc::now();

        cache.put_at("key".to_string(), 1, now);
        cache.put_at("key".to_string(), 2, now - Duration::seconds(30));

        let entry = cache.get(&"key".to_string()).unwrap();
        assert_eq!(entry.value, 2);
        assert_eq!(entry.fetched_at, now);
    }

    #[test]
    fn test_cache_remove_and_clear() {
        let cache = MemoryCache::<String, i32>::new();

        cache.put("key1".to_string(), 123);
        cache.put("key2".to_string(), 456);
        cache.remove(&"key1".to_string());
        assert!(cache.get(&"key1".to_string()).is_none());

        cache.clear();
        assert!(cache.get(&"key2".to_string()).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_on_disjoint_keys() {
        let cache = Arc::new(MemoryCache::<String, usize>::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for n in 0..100 {
                        cache.put(format!("key{i}"), n);
                        let _ = cache.get(&format!("key{}", (i + 1) % 16));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 16);
        for i in 0..16 {
            assert_eq!(cache.get(&format!("key{i}")).unwrap().value, 99);
        }
    }
}

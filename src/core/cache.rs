use chrono::{DateTime, Duration, Utc};

/// A cached value and the time it was read from its source.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.fetched_at + ttl
    }

    pub fn is_fresh_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now < self.expires_at(ttl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
}

/// Key-value store of the latest known readings.
///
/// `get` returns entries regardless of age: expiry is checked lazily by the
/// caller through `is_fresh`, so an expired entry can still serve as a
/// fallback when a live fetch fails. Nothing is evicted in the background.
pub trait Cache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<CacheEntry<V>>;

    /// Stores `value` as read at `fetched_at`, replacing any older entry.
    fn put_at(&self, key: K, value: V, fetched_at: DateTime<Utc>);

    fn put(&self, key: K, value: V) {
        self.put_at(key, value, Utc::now());
    }

    fn is_fresh(&self, key: &K, ttl: Duration) -> bool {
        self.get(key)
            .is_some_and(|entry| entry.is_fresh_at(ttl, Utc::now()))
    }

    fn remove(&self, key: &K);

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self, ttl: Duration) -> CacheStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_freshness_window() {
        let fetched_at = Utc::now();
        let entry = CacheEntry {
            value: 1,
            fetched_at,
        };
        let ttl = Duration::seconds(300);

        assert_eq!(entry.expires_at(ttl), fetched_at + ttl);
        assert!(entry.is_fresh_at(ttl, fetched_at));
        assert!(entry.is_fresh_at(ttl, fetched_at + Duration::seconds(299)));
        assert!(!entry.is_fresh_at(ttl, fetched_at + Duration::seconds(300)));
    }
}

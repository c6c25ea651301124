//! Bounded, TTL-aware in-memory cache with approximate LRU eviction.
//!
//! TTL is checked when reading: an expired entry reads as absent but stays
//! in the map until the next [`CacheStore::prune`] or an overwrite. Eviction
//! runs after every `put` and drops the entries with the oldest `last_used`
//! until the store is back at capacity.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// A cached value with its creation and last-read times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub timestamp: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V) -> Self {
        let now = Utc::now();
        Self { value, timestamp: now, last_used: now }
    }

    /// Age since creation; never negative.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or_default()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Last recency stamp handed out; stamps are strictly increasing.
    clock: DateTime<Utc>,
}

impl<V> Inner<V> {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.clock = if now > self.clock { now } else { self.clock + TimeDelta::nanoseconds(1) };
        self.clock
    }

    fn prune(&mut self, capacity: usize, ttl: Duration) -> Vec<String> {
        let mut evicted: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &evicted {
            self.entries.remove(key);
        }

        if self.entries.len() > capacity {
            let mut by_recency: Vec<(String, DateTime<Utc>)> =
                self.entries.iter().map(|(k, e)| (k.clone(), e.last_used)).collect();
            by_recency.sort_by_key(|(_, last_used)| *last_used);

            let excess = self.entries.len() - capacity;
            for (key, _) in by_recency.into_iter().take(excess) {
                self.entries.remove(&key);
                evicted.push(key);
            }
        }

        evicted
    }
}

/// Key/value store used for both the page-content and summary caches.
pub struct CacheStore<V> {
    name: &'static str,
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(name: &'static str, capacity: usize, ttl: Duration) -> Self {
        Self { name, capacity, ttl, inner: Mutex::new(Inner { entries: HashMap::new(), clock: Utc::now() }) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read a fresh entry, refreshing its `last_used`.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.get_if(key, |_| true).await
    }

    /// Read a fresh entry that also satisfies `validator`, refreshing its `last_used`.
    pub async fn get_if(&self, key: &str, validator: impl FnOnce(&V) -> bool) -> Option<V> {
        let mut inner = self.inner.lock().await;
        let fresh = inner
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.ttl) && validator(&entry.value));
        if !fresh {
            tracing::debug!(cache = self.name, key, "cache miss");
            return None;
        }

        let stamp = inner.tick();
        let entry = inner.entries.get_mut(key)?;
        entry.last_used = stamp;
        tracing::debug!(cache = self.name, key, "cache hit");
        Some(entry.value.clone())
    }

    /// Whether `key` holds a fresh entry accepted by `validator`. Does not touch recency.
    pub async fn is_valid(&self, key: &str, validator: impl FnOnce(&V) -> bool) -> bool {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.ttl) && validator(&entry.value))
    }

    /// Insert or overwrite `key`, then prune. Returns the keys that were evicted.
    pub async fn put(&self, key: impl Into<String>, value: V) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let stamp = inner.tick();
        inner
            .entries
            .insert(key.into(), CacheEntry { value, timestamp: stamp, last_used: stamp });
        let evicted = inner.prune(self.capacity, self.ttl);
        if !evicted.is_empty() {
            tracing::debug!(cache = self.name, evicted = evicted.len(), "evicted cache entries");
        }
        evicted
    }

    /// Drop expired entries and enforce capacity. Returns the keys that were removed.
    pub async fn prune(&self) -> Vec<String> {
        self.inner.lock().await.prune(self.capacity, self.ttl)
    }

    /// Load previously persisted entries as-is, then prune.
    pub async fn restore(&self, entries: Vec<(String, CacheEntry<V>)>) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        for (key, entry) in entries {
            if entry.last_used > inner.clock {
                inner.clock = entry.last_used;
            }
            inner.entries.insert(key, entry);
        }
        inner.prune(self.capacity, self.ttl)
    }

    /// Copy of every entry, expired or not.
    pub async fn entries(&self) -> Vec<(String, CacheEntry<V>)> {
        let inner = self.inner.lock().await;
        inner.entries.iter().map(|(k, e)| (k.clone(), e.clone())).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.lock().await.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn stale_entry(value: &str, age: Duration) -> CacheEntry<String> {
        let created = Utc::now() - TimeDelta::from_std(age).unwrap();
        CacheEntry { value: value.to_string(), timestamp: created, last_used: Utc::now() }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = CacheStore::new("test", 4, TTL);
        cache.put("a", "alpha".to_string()).await;
        assert_eq!(cache.get("a").await, Some("alpha".to_string()));
        assert_eq!(cache.get("b").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss_regardless_of_last_used() {
        let cache = CacheStore::new("test", 4, Duration::from_millis(100));
        cache.put("a", "alpha".to_string()).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("a").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("a").await, None);
        assert!(!cache.is_valid("a", |_| true).await);
    }

    #[tokio::test]
    async fn test_expired_entry_removed_only_on_prune() {
        let cache = CacheStore::new("test", 4, Duration::from_millis(50));
        cache.put("a", "alpha".to_string()).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.len().await, 1);

        let removed = cache.prune().await;
        assert_eq!(removed, vec!["a".to_string()]);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_restore_drops_expired_entries() {
        let cache = CacheStore::new("test", 4, TTL);
        let removed = cache
            .restore(vec![("a".to_string(), stale_entry("old", TTL * 2))])
            .await;
        assert_eq!(removed, vec!["a".to_string()]);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_resets_timestamp() {
        let cache = CacheStore::new("test", 4, Duration::from_millis(100));
        cache.put("a", "old".to_string()).await;
        tokio::time::sleep(Duration::from_millis(70)).await;
        cache.put("a", "new".to_string()).await;
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(cache.get("a").await, Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_size_never_exceeds_capacity() {
        let cache = CacheStore::new("test", 3, TTL);
        for i in 0..20 {
            cache.put(format!("k{i}"), i.to_string()).await;
            assert!(cache.len().await <= 3);
        }

        for i in 17..20 {
            assert!(cache.get(&format!("k{i}")).await.is_some());
        }
        assert!(cache.get("k16").await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_by_last_access_not_insertion() {
        let cache = CacheStore::new("test", 2, TTL);
        cache.put("a", "alpha".to_string()).await;
        cache.put("b", "beta".to_string()).await;

        assert!(cache.get("a").await.is_some());

        let evicted = cache.put("c", "gamma".to_string()).await;
        assert_eq!(evicted, vec!["b".to_string()]);
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_validator_gates_hit() {
        let cache = CacheStore::new("test", 4, TTL);
        cache.put("a", "123:500".to_string()).await;

        assert!(cache.is_valid("a", |v| v == "123:500").await);
        assert!(!cache.is_valid("a", |v| v == "456:500").await);
        assert_eq!(cache.get_if("a", |v| v == "456:500").await, None);
        assert_eq!(cache.get_if("a", |v| v == "123:500").await, Some("123:500".to_string()));
    }

    #[tokio::test]
    async fn test_is_valid_does_not_touch_recency() {
        let cache = CacheStore::new("test", 2, TTL);
        cache.put("a", "alpha".to_string()).await;
        cache.put("b", "beta".to_string()).await;

        assert!(cache.is_valid("a", |_| true).await);

        let evicted = cache.put("c", "gamma".to_string()).await;
        assert_eq!(evicted, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_restore_prunes_to_capacity() {
        let cache = CacheStore::new("test", 1, TTL);
        let older = CacheEntry {
            value: "old".to_string(),
            timestamp: Utc::now(),
            last_used: Utc::now() - TimeDelta::seconds(10),
        };
        let newer = CacheEntry::new("new".to_string());

        let evicted = cache
            .restore(vec![("x".to_string(), older), ("y".to_string(), newer)])
            .await;
        assert_eq!(evicted, vec!["x".to_string()]);
        assert_eq!(cache.get("y").await, Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = CacheStore::new("test", 4, TTL);
        cache.put("a", "alpha".to_string()).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_entry_expiry() {
        let entry = stale_entry("x", Duration::from_secs(10));
        assert!(entry.is_expired(Duration::from_secs(5)));
        assert!(!entry.is_expired(Duration::from_secs(60)));
    }
}

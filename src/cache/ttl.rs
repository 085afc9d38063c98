//! Explicit TTL map.
//!
//! A concurrent map whose entries carry an insertion instant and expire
//! after a fixed TTL. Unlike the Moka caches, expiry here is part of the
//! component contract: `evict_expired` runs on a timer and tests can pass
//! an explicit `now`. Used by the message tracker, presence tracker, and
//! the sliding-window counters.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Concurrent map with per-entry age tracking and a sweep-based eviction.
pub struct TtlMap<K, V>
where
    K: Hash + Eq,
{
    inner: Arc<DashMap<K, Entry<V>>>,
    ttl: Duration,
}

impl<K, V> Clone for TtlMap<K, V>
where
    K: Hash + Eq,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ttl: self.ttl,
        }
    }
}

impl<K, V> TtlMap<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Insert or overwrite, stamping the entry with the current instant.
    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Insert with an explicit stored-at instant (test hook).
    pub fn insert_at(&self, key: K, value: V, stored_at: Instant) {
        self.inner.insert(key, Entry { value, stored_at });
    }

    /// Get a copy of a live entry. Entries past their TTL are treated as
    /// absent even before the sweep removes them.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        self.inner.get(key).and_then(|entry| {
            if now.duration_since(entry.stored_at) >= self.ttl {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, entry)| entry.value)
    }

    /// Mutate an entry in place without refreshing its age. Returns false
    /// if the key is absent.
    pub fn update<F: FnOnce(&mut V)>(&self, key: &K, f: F) -> bool {
        match self.inner.get_mut(key) {
            Some(mut entry) => {
                f(&mut entry.value);
                true
            }
            None => false,
        }
    }

    /// Remove all entries older than the TTL; returns how many were
    /// evicted. `retain` iterates shard by shard, so no collection is
    /// mutated while iterated.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.inner.len();
        self.inner
            .retain(|_, entry| now.duration_since(entry.stored_at) < self.ttl);
        before.saturating_sub(self.inner.len())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let map: TtlMap<String, u32> = TtlMap::new(Duration::from_secs(60));
        map.insert("a".to_string(), 1);
        assert_eq!(map.get(&"a".to_string()), Some(1));
        assert_eq!(map.remove(&"a".to_string()), Some(1));
        assert_eq!(map.get(&"a".to_string()), None);
    }

    #[test]
    fn expired_entries_are_absent_before_sweep() {
        let ttl = Duration::from_secs(3600);
        let map: TtlMap<String, u32> = TtlMap::new(ttl);
        let t0 = Instant::now();
        map.insert_at("a".to_string(), 1, t0);

        // Just before the TTL boundary the entry is visible.
        assert_eq!(map.get_at(&"a".to_string(), t0 + ttl - Duration::from_secs(1)), Some(1));
        // At and after the boundary it is not.
        assert_eq!(map.get_at(&"a".to_string(), t0 + ttl), None);
    }

    #[test]
    fn evict_expired_removes_only_old_entries() {
        let ttl = Duration::from_secs(3600);
        let map: TtlMap<String, u32> = TtlMap::new(ttl);
        let t0 = Instant::now();
        map.insert_at("old".to_string(), 1, t0);
        map.insert_at("new".to_string(), 2, t0 + Duration::from_secs(1800));

        let evicted = map.evict_expired_at(t0 + ttl);
        assert_eq!(evicted, 1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_at(&"new".to_string(), t0 + ttl), Some(2));
    }

    #[test]
    fn update_mutates_in_place() {
        let map: TtlMap<String, Vec<u32>> = TtlMap::new(Duration::from_secs(60));
        map.insert("k".to_string(), vec![1]);
        assert!(map.update(&"k".to_string(), |v| v.push(2)));
        assert_eq!(map.get(&"k".to_string()), Some(vec![1, 2]));
        assert!(!map.update(&"missing".to_string(), |v| v.push(3)));
    }
}

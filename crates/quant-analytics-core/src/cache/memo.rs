use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::keys::CacheKey;

/// Share of entries dropped in one eviction pass.
const EVICTION_FRACTION: f64 = 0.2;

pub struct CacheEntry {
    payload: Rc<dyn Any>,
    created_at: Instant,
    ttl: Duration,
    last_access: Instant,
    access_count: u64,
}

impl CacheEntry {
    fn new(payload: Rc<dyn Any>, ttl: Duration) -> Self {
        let now = Instant::now();
        CacheEntry {
            payload,
            created_at: now,
            ttl,
            last_access: now,
            access_count: 0,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Higher scores are evicted first: long idle and rarely read.
    fn eviction_score(&self, now: Instant) -> f64 {
        let idle_ms = now.saturating_duration_since(self.last_access).as_secs_f64() * 1_000.0;
        idle_ms / (1.0 + self.access_count as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Key/value store with per-entry TTL and LRU-biased eviction.
///
/// Payloads are type-erased `Rc`s, so a hit hands back the very object that
/// was stored. There is no locking; the cache belongs to one logical thread.
pub struct MemoCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    default_ttl: Duration,
    stats: CacheStats,
}

impl MemoCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        MemoCache {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            default_ttl,
            stats: CacheStats::default(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stored value when present, unexpired and of the requested type.
    pub fn get<T: Any>(&mut self, key: &CacheKey) -> Option<Rc<T>> {
        let now = Instant::now();
        let expired = match self.entries.get(key.as_str()) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            self.entries.remove(key.as_str());
            self.stats.expirations += 1;
            self.stats.misses += 1;
            debug!(key = %key, "cache entry expired");
            return None;
        }

        let entry = self.entries.get_mut(key.as_str())?;
        match Rc::clone(&entry.payload).downcast::<T>() {
            Ok(value) => {
                entry.last_access = now;
                entry.access_count += 1;
                self.stats.hits += 1;
                Some(value)
            }
            Err(_) => {
                // A payload of another type under this key is treated as absent.
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn set<T: Any>(&mut self, key: &CacheKey, value: Rc<T>, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.entries
            .insert(key.as_str().to_string(), CacheEntry::new(value, ttl));
        if self.entries.len() > self.capacity {
            self.evict();
        }
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key.as_str()).is_some()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .get(key.as_str())
            .is_some_and(|e| !e.is_expired(Instant::now()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop expired entries, then the ~20% with the worst idle/frequency score.
    fn evict(&mut self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let expired = before - self.entries.len();
        self.stats.expirations += expired as u64;

        let target = (before as f64 * EVICTION_FRACTION).ceil() as usize;
        let remaining = target.saturating_sub(expired);
        if remaining == 0 {
            return;
        }

        let mut scored: Vec<(String, f64)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.eviction_score(now)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        for (key, _) in scored.into_iter().take(remaining) {
            self.entries.remove(&key);
            self.stats.evictions += 1;
        }
        debug!(
            removed = before - self.entries.len(),
            remaining = self.entries.len(),
            "cache eviction pass"
        );
    }
}

impl std::fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache")
            .field("entries", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyStrategy;

    fn key(name: &str) -> CacheKey {
        CacheKey::new(name, KeyStrategy::ShapeDigest)
    }

    #[test]
    fn test_hit_returns_same_reference() {
        let mut cache = MemoCache::new(10, Duration::from_secs(60));
        let value = Rc::new(vec![1.0_f64, 2.0]);
        cache.set(&key("a"), Rc::clone(&value), None);
        let got: Rc<Vec<f64>> = cache.get(&key("a")).unwrap();
        assert!(Rc::ptr_eq(&got, &value));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_miss_on_absent_key() {
        let mut cache = MemoCache::new(10, Duration::from_secs(60));
        assert!(cache.get::<f64>(&key("missing")).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_wrong_type_degrades_to_miss() {
        let mut cache = MemoCache::new(10, Duration::from_secs(60));
        cache.set(&key("a"), Rc::new(1.5_f64), None);
        assert!(cache.get::<String>(&key("a")).is_none());
        assert!(cache.get::<f64>(&key("a")).is_some());
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let mut cache = MemoCache::new(10, Duration::from_secs(60));
        cache.set(&key("a"), Rc::new(1_u8), Some(Duration::from_millis(5)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get::<u8>(&key("a")).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_eviction_removes_about_twenty_percent() {
        let mut cache = MemoCache::new(10, Duration::from_secs(60));
        for i in 0..10 {
            cache.set(&key(&format!("k{i}")), Rc::new(i), None);
        }
        assert_eq!(cache.len(), 10);
        // The 11th insert pushes the count over capacity: ceil(11 * 0.2) = 3 go.
        cache.set(&key("k10"), Rc::new(10), None);
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn test_eviction_spares_frequently_read_entries() {
        let mut cache = MemoCache::new(5, Duration::from_secs(60));
        for i in 0..5 {
            cache.set(&key(&format!("k{i}")), Rc::new(i), None);
        }
        std::thread::sleep(Duration::from_millis(5));
        for _ in 0..5 {
            let _ = cache.get::<i32>(&key("k0"));
        }
        cache.set(&key("k5"), Rc::new(5), None);
        assert!(cache.contains(&key("k0")));
    }
}

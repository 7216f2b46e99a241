//! Short-lived in-memory memoization of aggregated snapshots
//!
//! Entries expire lazily: an expired entry is evicted by the read that finds
//! it, and nothing sweeps the table in the background. The table is bounded;
//! once full, an insert evicts the least recently used entry.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

use crate::metrics::DerivedMetrics;
use crate::models::Snapshot;

pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// One memoized aggregation, shared read-only between callers
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub snapshot: Arc<Snapshot>,
    pub metrics: Arc<DerivedMetrics>,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Fresh up to and including `expires_at`
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct SnapshotCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl SnapshotCache {
    /// A `max_entries` of zero is treated as one
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Retrieves an entry if it exists and has not expired.
    /// Returns `None` for cache misses; expired entries are evicted.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lookup(key, Instant::now())
    }

    fn lookup(&self, key: &str, now: Instant) -> Option<CacheEntry> {
        let mut entries = self.lock();
        match entries.get(key).cloned() {
            Some(entry) if !entry.is_expired(now) => {
                debug!("Key found and still fresh");
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry);
            }
            Some(_) => {
                debug!("Key found but expired");
                entries.pop(key);
            }
            None => debug!("Key not found"),
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores a snapshot and its metrics for the configured TTL
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, snapshot, metrics))]
    pub fn set(&self, key: &str, snapshot: Arc<Snapshot>, metrics: Arc<DerivedMetrics>) -> CacheEntry {
        let created_at = Instant::now();
        let entry = CacheEntry {
            key: key.to_string(),
            snapshot,
            metrics,
            created_at,
            expires_at: created_at + self.ttl,
        };
        if let Some((evicted, _)) = self.lock().push(key.to_string(), entry.clone()) {
            if evicted != key {
                debug!(evicted = %evicted, "Evicted least recently used entry");
            }
        }
        entry
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Query;
    use chrono::Utc;

    fn entry_parts() -> (Arc<Snapshot>, Arc<DerivedMetrics>) {
        let query = Query::new(48.8566, 2.3522).unwrap();
        let snapshot = Snapshot::assemble(query, Vec::new(), Utc::now());
        let metrics = DerivedMetrics::from_snapshot(&snapshot);
        (Arc::new(snapshot), Arc::new(metrics))
    }

    #[test]
    fn test_get_after_set_returns_entry() {
        let cache = SnapshotCache::default();
        let (snapshot, metrics) = entry_parts();
        cache.set("k", snapshot.clone(), metrics);

        let entry = cache.get("k").unwrap();
        assert!(Arc::ptr_eq(&entry.snapshot, &snapshot));
        assert_eq!(entry.key, "k");
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache = SnapshotCache::default();
        assert!(cache.get("absent").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let cache = SnapshotCache::new(Duration::from_millis(20), DEFAULT_MAX_ENTRIES);
        let (snapshot, metrics) = entry_parts();
        cache.set("k", snapshot, metrics);
        assert_eq!(cache.stats().entries, 1);

        std::thread::sleep(Duration::from_millis(40));

        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_set_overwrites_existing_key() {
        let cache = SnapshotCache::default();
        let (snapshot, metrics) = entry_parts();
        cache.set("k", snapshot.clone(), metrics.clone());
        let (newer, _) = entry_parts();
        cache.set("k", newer.clone(), metrics);
        assert_eq!(cache.stats().entries, 1);
        assert!(Arc::ptr_eq(&cache.get("k").unwrap().snapshot, &newer));
    }

    #[test]
    fn test_entry_is_fresh_until_expiry_instant() {
        let cache = SnapshotCache::new(Duration::from_secs(60), DEFAULT_MAX_ENTRIES);
        let (snapshot, metrics) = entry_parts();
        let entry = cache.set("k", snapshot, metrics);

        assert!(cache.lookup("k", entry.expires_at).is_some());
        assert!(
            cache
                .lookup("k", entry.expires_at + Duration::from_nanos(1))
                .is_none()
        );
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_full_cache_evicts_least_recently_used() {
        let cache = SnapshotCache::new(DEFAULT_TTL, 2);
        let (snapshot, metrics) = entry_parts();
        cache.set("a", snapshot.clone(), metrics.clone());
        cache.set("b", snapshot.clone(), metrics.clone());
        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.set("c", snapshot, metrics);

        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        let cache = SnapshotCache::new(DEFAULT_TTL, 0);
        let (snapshot, metrics) = entry_parts();
        cache.set("a", snapshot.clone(), metrics.clone());
        cache.set("b", snapshot, metrics);
        assert_eq!(cache.stats().entries, 1);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_concurrent_readers_share_entry() {
        let cache = Arc::new(SnapshotCache::default());
        let (snapshot, metrics) = entry_parts();
        cache.set("k", snapshot.clone(), metrics);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get("k").map(|e| e.snapshot))
            })
            .collect();
        for handle in handles {
            let shared = handle.join().unwrap().unwrap();
            assert!(Arc::ptr_eq(&shared, &snapshot));
        }
        assert_eq!(cache.stats().hits, 8);
    }
}

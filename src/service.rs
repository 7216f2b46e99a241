//! Environment report service
//!
//! Write-through composition of the [`Aggregator`] and the [`SnapshotCache`].

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::aggregator::Aggregator;
use crate::cache::{CacheEntry, CacheStats, SnapshotCache};
use crate::models::Query;

/// Whether a report was served from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

pub struct EnvironmentService {
    aggregator: Aggregator,
    cache: SnapshotCache,
    coordinate_precision: u32,
}

impl EnvironmentService {
    #[must_use]
    pub fn new(aggregator: Aggregator, cache: SnapshotCache, coordinate_precision: u32) -> Self {
        Self {
            aggregator,
            cache,
            coordinate_precision,
        }
    }

    /// Cached report for the query, aggregating on a miss
    #[instrument(skip(self, query), fields(coords = %query.format_coordinates()))]
    pub async fn report(&self, query: &Query) -> (CacheEntry, CacheStatus) {
        let key = query.fingerprint(self.coordinate_precision);
        if let Some(entry) = self.cache.get(&key) {
            debug!("Serving {} from cache", key);
            return (entry, CacheStatus::Hit);
        }

        let report = self.aggregator.aggregate(query).await;
        let snapshot = Arc::new(report.snapshot);
        let metrics = Arc::new(report.metrics);

        if snapshot.is_all_fallback() {
            info!("Every source fell back for {}; not caching", key);
            let now = std::time::Instant::now();
            let entry = CacheEntry {
                key,
                snapshot,
                metrics,
                created_at: now,
                expires_at: now,
            };
            return (entry, CacheStatus::Miss);
        }

        (self.cache.set(&key, snapshot, metrics), CacheStatus::Miss)
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

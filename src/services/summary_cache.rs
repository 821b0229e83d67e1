use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::models::PriceSummary;

pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Thread-safe memo of range statistics keyed by the store index bounds
/// `[lo, hi)` the request resolved to, so date ranges that select the same
/// prices share one entry.
///
/// The map holds at most `max_entries`; inserting a new key into a full map
/// drops every entry first.
#[derive(Clone)]
pub struct SummaryCache {
    cache: Arc<DashMap<(usize, usize), PriceSummary>>,
    max_entries: usize,
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, lo: usize, hi: usize) -> Option<PriceSummary> {
        self.cache.get(&(lo, hi)).map(|entry| *entry.value())
    }

    pub fn insert(&self, lo: usize, hi: usize, summary: PriceSummary) {
        if self.cache.len() >= self.max_entries && !self.cache.contains_key(&(lo, hi)) {
            debug!("Statistics cache full at {} entries, clearing", self.cache.len());
            self.cache.clear();
        }
        self.cache.insert((lo, hi), summary);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(count: usize) -> PriceSummary {
        PriceSummary {
            mean: 1.0,
            median: 1.0,
            std_dev: 0.0,
            volatility: 0.0,
            min: 1.0,
            max: 1.0,
            count,
        }
    }

    #[test]
    fn test_cache_stores_and_retrieves() {
        let cache = SummaryCache::new();
        cache.insert(0, 10, summary(10));
        assert_eq!(cache.get(0, 10).map(|s| s.count), Some(10));
        assert!(cache.get(0, 11).is_none());
    }

    #[test]
    fn test_cache_never_exceeds_max_entries() {
        let cache = SummaryCache::with_max_entries(4);
        for lo in 0..50 {
            cache.insert(lo, lo + 2, summary(2));
            assert!(cache.len() <= 4, "{} entries", cache.len());
        }
        assert_eq!(cache.get(49, 51).map(|s| s.count), Some(2));
    }

    #[test]
    fn test_overwriting_a_key_in_a_full_cache_keeps_the_rest() {
        let cache = SummaryCache::with_max_entries(2);
        cache.insert(0, 2, summary(2));
        cache.insert(1, 3, summary(2));
        cache.insert(0, 2, summary(2));
        assert_eq!(cache.len(), 2);
    }
}

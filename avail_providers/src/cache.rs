use std::collections::HashMap;
use std::sync::Mutex;

use avail_api::AvailabilityInfo;
use avail_provider_api::{CacheKey, ResultCache};

/// Process-local result cache. A poisoned lock degrades to cache misses.
#[derive(Debug, Default)]
pub struct MemoryResultCache {
    availability: Mutex<HashMap<CacheKey, AvailabilityInfo>>,
    node_graphs: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryResultCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries of either kind.
    #[must_use]
    pub fn len(&self) -> usize {
        let availability = self.availability.lock().map_or(0, |map| map.len());
        let graphs = self.node_graphs.lock().map_or(0, |map| map.len());
        availability + graphs
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryResultCache {
    fn availability(&self, key: &CacheKey) -> Option<AvailabilityInfo> {
        self.availability.lock().ok()?.get(key).copied()
    }

    fn store_availability(&self, key: CacheKey, info: AvailabilityInfo) {
        if let Ok(mut map) = self.availability.lock() {
            map.insert(key, info);
        }
    }

    fn node_graph(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.node_graphs.lock().ok()?.get(key).cloned()
    }

    fn store_node_graph(&self, key: CacheKey, graph: Vec<u8>) {
        if let Ok(mut map) = self.node_graphs.lock() {
            map.insert(key, graph);
        }
    }
}

#[cfg(test)]
mod tests {
    use avail_api::{ChannelInfo, Platform};

    use super::*;

    #[test]
    fn keys_differ_by_fingerprint() {
        let cache = MemoryResultCache::new();
        let key = CacheKey::new("tabs", Platform::Extensions, "abc");
        cache.store_availability(key.clone(), AvailabilityInfo::new(ChannelInfo::trunk()));

        assert!(cache.availability(&key).is_some());
        assert!(cache
            .availability(&CacheKey::new("tabs", Platform::Extensions, "def"))
            .is_none());
        assert!(cache
            .availability(&CacheKey::new("tabs", Platform::Apps, "abc"))
            .is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn node_graphs_are_stored_as_bytes() {
        let cache = MemoryResultCache::new();
        let key = CacheKey::new("tabs", Platform::Apps, "abc");
        assert!(cache.node_graph(&key).is_none());
        cache.store_node_graph(key.clone(), b"{}".to_vec());
        assert_eq!(cache.node_graph(&key).as_deref(), Some(&b"{}"[..]));
    }
}

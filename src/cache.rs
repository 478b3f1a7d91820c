//! Run-scoped cache of fully fetched finding details.
//!
//! Batch queries return minimal records that are enriched one detail
//! fetch per identifier; the same identifier often appears across many
//! batched packages, so the first fetch is memoized for the lifetime of
//! one run. Nothing is persisted and there is no eviction: the cache is
//! bounded by the distinct identifiers seen in a single invocation.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::osv::Vuln;

#[derive(Debug, Default)]
pub struct DetailCache {
    entries: Mutex<HashMap<String, Vuln>>,
}

impl DetailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Vuln> {
        self.entries.lock().ok()?.get(id).cloned()
    }

    pub fn insert(&self, id: &str, vuln: Vuln) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id.to_string(), vuln);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vuln(id: &str) -> Vuln {
        serde_json::from_value(serde_json::json!({"id": id})).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = DetailCache::new();
        assert!(cache.get("MAL-1").is_none());
        assert!(cache.is_empty());

        cache.insert("MAL-1", vuln("MAL-1"));
        assert_eq!(cache.get("MAL-1").unwrap().id, "MAL-1");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = DetailCache::new();
        cache.insert("GHSA-1", vuln("GHSA-1"));
        cache.insert("GHSA-1", vuln("GHSA-1"));
        assert_eq!(cache.len(), 1);
    }
}

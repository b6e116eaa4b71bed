//! Time-bounded cache of geolocation payloads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use super::store::{CacheEntry, CacheStore, MemoryStore};

/// Geolocation payloads keyed by client IP, with a fixed TTL.
///
/// Constructed once and shared by `Arc` with whichever component performs
/// lookups. Expired entries are dropped when loading, ignored on read and
/// evicted on every insert. Persistence failures are logged and never fail
/// a lookup.
pub struct GeoCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    /// Serializes saves so snapshots reach the store in insert order.
    persist: Mutex<()>,
    store: Box<dyn CacheStore>,
}

impl GeoCache {
    pub fn new(ttl: Duration, store: Box<dyn CacheStore>) -> Self {
        Self::new_at(ttl, store, now_secs())
    }

    /// Cache that lives only in process memory.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(ttl, Box::new(MemoryStore))
    }

    fn new_at(ttl: Duration, store: Box<dyn CacheStore>, now: f64) -> Self {
        let ttl_secs = ttl.as_secs_f64();
        let entries = match store.load() {
            Ok(loaded) => {
                let total = loaded.len();
                let fresh: HashMap<String, CacheEntry> = loaded
                    .into_iter()
                    .filter(|(_, entry)| now - entry.ts < ttl_secs)
                    .collect();
                tracing::info!(loaded = fresh.len(), expired = total - fresh.len(), "Geo cache loaded");
                fresh
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load geo cache, starting empty");
                HashMap::new()
            }
        };

        Self {
            ttl,
            entries: Mutex::new(entries),
            persist: Mutex::new(()),
            store,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, now_secs())
    }

    fn get_at(&self, key: &str, now: f64) -> Option<Value> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|entry| now - entry.ts < self.ttl.as_secs_f64())
            .map(|entry| entry.data.clone())
    }

    /// Store a payload, evict expired entries and persist the live set.
    ///
    /// Blocks on store I/O; call it from a blocking context.
    pub fn insert(&self, key: &str, data: Value) {
        self.insert_at(key, data, now_secs());
    }

    fn insert_at(&self, key: &str, data: Value, now: f64) {
        let Ok(_persist) = self.persist.lock() else {
            tracing::warn!("Geo cache lock poisoned, skipping insert");
            return;
        };
        let snapshot = {
            let Ok(mut entries) = self.entries.lock() else {
                tracing::warn!("Geo cache lock poisoned, skipping insert");
                return;
            };
            let ttl_secs = self.ttl.as_secs_f64();
            let before = entries.len();
            entries.retain(|_, entry| now - entry.ts < ttl_secs);
            let evicted = before - entries.len();
            if evicted > 0 {
                tracing::debug!(evicted, "Evicted expired geo cache entries");
            }
            entries.insert(key.to_string(), CacheEntry { ts: now, data });
            entries.clone()
        };
        // Readers only wait on `entries`, never on store I/O.
        if let Err(e) = self.store.save(&snapshot) {
            tracing::warn!(error = %e, "Failed to persist geo cache");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for GeoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapabilityError;
    use crate::geo::store::JsonFileStore;
    use serde_json::json;

    const DAY: Duration = Duration::from_secs(60 * 60 * 24);

    struct FailingStore;

    impl CacheStore for FailingStore {
        fn load(&self) -> Result<HashMap<String, CacheEntry>, CapabilityError> {
            Err(CapabilityError::Cache("unreadable".into()))
        }

        fn save(&self, _entries: &HashMap<String, CacheEntry>) -> Result<(), CapabilityError> {
            Err(CapabilityError::Cache("read-only".into()))
        }
    }

    #[test]
    fn test_insert_then_get() {
        let cache = GeoCache::in_memory(DAY);
        assert!(cache.get("local").is_none());
        cache.insert("local", json!({"city": "Lisbon"}));
        assert_eq!(cache.get("local").unwrap()["city"], "Lisbon");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_ignored_on_read() {
        let cache = GeoCache::in_memory(Duration::from_secs(60));
        cache.insert_at("local", json!({"city": "Lisbon"}), 1000.0);
        assert!(cache.get_at("local", 1059.0).is_some());
        assert!(cache.get_at("local", 1060.0).is_none());
    }

    #[test]
    fn test_expired_entries_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.json");
        let mut entries = HashMap::new();
        entries.insert(
            "old".to_string(),
            CacheEntry {
                ts: 0.0,
                data: json!({"city": "Gone"}),
            },
        );
        entries.insert(
            "fresh".to_string(),
            CacheEntry {
                ts: 90_000.0,
                data: json!({"city": "Kept"}),
            },
        );
        JsonFileStore::new(&path).save(&entries).unwrap();

        let cache = GeoCache::new_at(DAY, Box::new(JsonFileStore::new(&path)), 100_000.0);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at("fresh", 100_000.0).is_some());
    }

    #[test]
    fn test_insert_persists_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.json");
        let cache = GeoCache::new(DAY, Box::new(JsonFileStore::new(&path)));
        cache.insert("198.51.100.7", json!({"city": "Quito"}));

        let reloaded = GeoCache::new(DAY, Box::new(JsonFileStore::new(&path)));
        assert_eq!(reloaded.get("198.51.100.7").unwrap()["city"], "Quito");
    }

    #[test]
    fn test_insert_evicts_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.json");
        let cache = GeoCache::new_at(
            Duration::from_secs(60),
            Box::new(JsonFileStore::new(&path)),
            0.0,
        );
        for i in 0..100 {
            cache.insert_at(&format!("198.51.100.{}", i), json!({"city": "Old"}), 0.0);
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(JsonFileStore::new(&path).load().unwrap().len(), 100);

        cache.insert_at("203.0.113.4", json!({"city": "New"}), 1_000_000.0);
        assert_eq!(cache.len(), 1);
        let persisted = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(persisted.len(), 1);
        assert!(persisted.contains_key("203.0.113.4"));
    }

    #[test]
    fn test_insert_keeps_live_entries() {
        let cache = GeoCache::in_memory(Duration::from_secs(60));
        cache.insert_at("a", json!({"city": "A"}), 1000.0);
        cache.insert_at("b", json!({"city": "B"}), 1030.0);
        cache.insert_at("c", json!({"city": "C"}), 1070.0);
        assert_eq!(cache.len(), 2);
        assert!(cache.get_at("a", 1070.0).is_none());
        assert_eq!(cache.get_at("b", 1070.0).unwrap()["city"], "B");
    }

    #[test]
    fn test_store_failures_do_not_break_cache() {
        let cache = GeoCache::new(DAY, Box::new(FailingStore));
        assert!(cache.is_empty());
        cache.insert("local", json!({"city": "Lima"}));
        assert_eq!(cache.get("local").unwrap()["city"], "Lima");
    }
}

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use crate::cache::{system_clock, CacheEntry, CacheStore, Clock, CursorState, CursorStore};

/// Process-local cache. Cheap to build; everything is gone on exit.
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String), CacheEntry<Value>>>,
    cursors: Mutex<HashMap<String, CursorState>>,
    clock: Clock,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A poisoned lock only means another thread panicked mid-operation; the map
// itself is still usable.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl CursorStore for MemoryCache {
    fn get_cursor(&self, key: &str) -> Option<CursorState> {
        lock(&self.cursors).get(key).cloned()
    }

    fn set_cursor(&self, key: &str, cursor: &CursorState) {
        lock(&self.cursors).insert(key.to_string(), cursor.clone());
    }
}

impl CacheStore for MemoryCache {
    fn set(&self, key: &str, subkey: &str, value: Value, ttl: Option<Duration>) {
        let entry = CacheEntry::new(value, ttl, (self.clock)());
        lock(&self.entries).insert((key.to_string(), subkey.to_string()), entry);
    }

    fn get(&self, key: &str, subkey: &str) -> Option<Value> {
        let now = (self.clock)();
        let mut entries = lock(&self.entries);
        let k = (key.to_string(), subkey.to_string());

        if entries.get(&k)?.is_expired(now) {
            entries.remove(&k);
            return None;
        }
        entries.get(&k).map(|e| e.value.clone())
    }

    fn del(&self, key: &str, subkey: &str) {
        lock(&self.entries).remove(&(key.to_string(), subkey.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn manual_clock() -> (Arc<AtomicI64>, Clock) {
        let now = Arc::new(AtomicI64::new(1_000_000));
        let handle = now.clone();
        (now, Arc::new(move || handle.load(Ordering::SeqCst)))
    }

    #[test]
    fn test_set_get_del() {
        let cache = MemoryCache::new();
        cache.set("twitter:alice", "2024-01-01", json!([1, 2]), None);
        assert_eq!(cache.get("twitter:alice", "2024-01-01"), Some(json!([1, 2])));
        assert_eq!(cache.get("twitter:alice", "2024-01-02"), None);

        cache.del("twitter:alice", "2024-01-01");
        assert_eq!(cache.get("twitter:alice", "2024-01-01"), None);
    }

    #[test]
    fn test_expired_entry_evicted_on_read() {
        let (now, clock) = manual_clock();
        let cache = MemoryCache::with_clock(clock);
        cache.set("k", "s", json!("v"), Some(Duration::from_secs(300)));

        now.fetch_add(299_999, Ordering::SeqCst);
        assert_eq!(cache.get("k", "s"), Some(json!("v")));
        assert_eq!(cache.len(), 1);

        now.fetch_add(1, Ordering::SeqCst);
        assert_eq!(cache.get("k", "s"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let (now, clock) = manual_clock();
        let cache = MemoryCache::with_clock(clock);
        cache.set("k", "s", json!(1), None);
        now.fetch_add(10_000_000_000, Ordering::SeqCst);
        assert_eq!(cache.get("k", "s"), Some(json!(1)));
    }

    #[test]
    fn test_overwrite_resets_ttl() {
        let (now, clock) = manual_clock();
        let cache = MemoryCache::with_clock(clock);
        cache.set("k", "s", json!(1), Some(Duration::from_secs(1)));
        now.fetch_add(900, Ordering::SeqCst);
        cache.set("k", "s", json!(2), Some(Duration::from_secs(1)));
        now.fetch_add(900, Ordering::SeqCst);
        assert_eq!(cache.get("k", "s"), Some(json!(2)));
    }

    #[test]
    fn test_cursor_slot() {
        let cache = MemoryCache::new();
        assert!(cache.get_cursor("twitter:alice").is_none());
        cache.set_cursor("twitter:alice", &CursorState::new("5", 50));
        assert_eq!(
            cache.get_cursor("twitter:alice"),
            Some(CursorState::new("5", 50))
        );
    }
}

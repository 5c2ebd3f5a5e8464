//! TTL key/value cache with a cursor slot.
//!
//! Keys are composite: an entity key (usually `source:account`) plus a
//! logical subkey such as a `YYYY-MM-DD` day or `"profile"`. Entries expire
//! lazily: `get` checks the deadline and evicts on the way out. Nothing in
//! here returns an error; a backend failure is logged and reads as absent.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// Source of "now" in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp_millis())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    /// Epoch millis; `None` never expires.
    pub expires_at: Option<i64>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Option<Duration>, now_ms: i64) -> Self {
        let expires_at = ttl.map(|ttl| now_ms.saturating_add(ttl.as_millis() as i64));
        Self { value, expires_at }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| now_ms >= at)
    }
}

/// Forward-only position in a paginated remote feed. Several records can
/// share the newest second, so every id seen at `last_timestamp` is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    pub last_ids: Vec<String>,
    pub last_timestamp: i64,
}

impl CursorState {
    pub fn new(last_id: &str, last_timestamp: i64) -> Self {
        Self::at(last_timestamp, [last_id])
    }

    /// Cursor at `last_timestamp` covering `ids`. Ids are kept sorted and
    /// deduplicated.
    pub fn at<I, S>(last_timestamp: i64, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut last_ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        last_ids.sort();
        last_ids.dedup();
        Self {
            last_ids,
            last_timestamp,
        }
    }

    /// True when a record at `(id, timestamp)` has not been seen yet.
    pub fn is_unseen(&self, id: &str, timestamp: i64) -> bool {
        timestamp > self.last_timestamp
            || (timestamp == self.last_timestamp && !self.last_ids.iter().any(|seen| seen == id))
    }

    /// The cursor after also seeing `candidate`, or `None` when it adds
    /// nothing. Older candidates never move the cursor; one at the same
    /// second adds its ids.
    pub fn merged(&self, candidate: &CursorState) -> Option<CursorState> {
        if candidate.last_timestamp > self.last_timestamp {
            return Some(candidate.clone());
        }
        if candidate.last_timestamp < self.last_timestamp
            || candidate.last_ids.iter().all(|id| self.last_ids.contains(id))
        {
            return None;
        }
        Some(Self::at(
            self.last_timestamp,
            self.last_ids.iter().chain(&candidate.last_ids).cloned(),
        ))
    }
}

/// Cursor persistence. Implemented by both caches so either can act as the
/// storage collaborator for continuous polling.
pub trait CursorStore: Send + Sync {
    fn get_cursor(&self, key: &str) -> Option<CursorState>;
    fn set_cursor(&self, key: &str, cursor: &CursorState);
}

pub trait CacheStore: CursorStore {
    fn set(&self, key: &str, subkey: &str, value: Value, ttl: Option<Duration>);
    fn get(&self, key: &str, subkey: &str) -> Option<Value>;
    fn del(&self, key: &str, subkey: &str);
}

/// Typed access on top of the JSON values a [`CacheStore`] holds.
pub trait CacheStoreExt: CacheStore {
    /// Values that no longer decode as `T` read as absent.
    fn get_as<T: DeserializeOwned>(&self, key: &str, subkey: &str) -> Option<T> {
        let value = self.get(key, subkey)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, subkey, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    fn set_as<T: Serialize>(&self, key: &str, subkey: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, subkey, v, ttl),
            Err(e) => tracing::warn!(key, subkey, error = %e, "value not cacheable"),
        }
    }
}

impl<C: CacheStore + ?Sized> CacheStoreExt for C {}

/// Move the cursor at `key` forward to cover `candidate`. Returns whether
/// the stored cursor changed.
pub fn advance_cursor<S: CursorStore + ?Sized>(store: &S, key: &str, candidate: &CursorState) -> bool {
    let next = match store.get_cursor(key) {
        None => candidate.clone(),
        Some(current) => match current.merged(candidate) {
            Some(next) => next,
            None => return false,
        },
    };
    store.set_cursor(key, &next);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry::new(1, Some(Duration::from_secs(10)), 1_000);
        assert_eq!(entry.expires_at, Some(11_000));
        assert!(!entry.is_expired(10_999));
        assert!(entry.is_expired(11_000));

        let forever = CacheEntry::new(1, None, 1_000);
        assert!(!forever.is_expired(i64::MAX));
    }

    #[test]
    fn test_cursor_unseen() {
        let cursor = CursorState::new("10", 500);
        assert!(cursor.is_unseen("11", 501));
        assert!(cursor.is_unseen("12", 500));
        assert!(!cursor.is_unseen("10", 500));
        assert!(!cursor.is_unseen("9", 499));

        let tied = CursorState::at(500, ["10", "12"]);
        assert!(!tied.is_unseen("12", 500));
        assert!(tied.is_unseen("11", 500));
    }

    #[test]
    fn test_cursor_ids_sorted_and_deduplicated() {
        let cursor = CursorState::at(7, ["b", "a", "b"]);
        assert_eq!(cursor.last_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_advance_cursor_is_forward_only() {
        let cache = MemoryCache::new();
        assert!(advance_cursor(&cache, "twitter:alice", &CursorState::new("2", 200)));
        assert!(!advance_cursor(&cache, "twitter:alice", &CursorState::new("1", 100)));
        assert_eq!(
            cache.get_cursor("twitter:alice"),
            Some(CursorState::new("2", 200))
        );
        assert!(advance_cursor(&cache, "twitter:alice", &CursorState::new("4", 300)));
        assert_eq!(
            cache.get_cursor("twitter:alice"),
            Some(CursorState::new("4", 300))
        );
    }

    #[test]
    fn test_advance_cursor_unions_ids_at_same_second() {
        let cache = MemoryCache::new();
        assert!(advance_cursor(&cache, "twitter:alice", &CursorState::new("2", 200)));
        assert!(advance_cursor(&cache, "twitter:alice", &CursorState::new("3", 200)));
        assert!(!advance_cursor(&cache, "twitter:alice", &CursorState::new("2", 200)));
        assert_eq!(
            cache.get_cursor("twitter:alice"),
            Some(CursorState::at(200, ["2", "3"]))
        );
    }

    #[test]
    fn test_typed_helpers() {
        let cache = MemoryCache::new();
        cache.set_as("k", "s", &vec![1u32, 2, 3], None);
        assert_eq!(cache.get_as::<Vec<u32>>("k", "s"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get_as::<String>("k", "s"), None);
    }
}

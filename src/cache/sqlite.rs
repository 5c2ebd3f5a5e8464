use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use serde_json::Value;

use crate::app::{Result, SluiceError};
use crate::cache::{system_clock, CacheEntry, CacheStore, Clock, CursorState, CursorStore};

/// SQLite-backed cache. Survives restarts, so cached credentials and
/// continuous-mode cursors outlive the process.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    clock: Clock,
}

impl SqliteCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, system_clock())
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, system_clock())
    }

    pub fn in_memory_with_clock(clock: Clock) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, clock)
    }

    fn from_connection(conn: Connection, clock: Clock) -> Result<Self> {
        let cache = Self {
            conn: Mutex::new(conn),
            clock,
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock();
        migrations
            .to_latest(&mut conn)
            .map_err(|e| SluiceError::Other(format!("cache migration failed: {}", e)))?;

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delete every expired entry. Returns how many rows went away.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = (self.clock)();
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
        )?;
        Ok(removed)
    }

    fn try_set(&self, key: &str, subkey: &str, value: &Value, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(value, ttl, (self.clock)());
        let conn = self.lock();
        conn.execute(
            "INSERT INTO cache_entries (key, subkey, value, expires_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key, subkey) DO UPDATE SET value = ?3, expires_at = ?4",
            params![key, subkey, serde_json::to_string(entry.value)?, entry.expires_at],
        )?;
        Ok(())
    }

    fn try_get(&self, key: &str, subkey: &str) -> Result<Option<Value>> {
        let now = (self.clock)();
        let conn = self.lock();

        let row = conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE key = ?1 AND subkey = ?2",
                params![key, subkey],
                |row| {
                    Ok(CacheEntry {
                        value: row.get::<_, String>(0)?,
                        expires_at: row.get::<_, Option<i64>>(1)?,
                    })
                },
            )
            .optional()?;

        let Some(entry) = row else {
            return Ok(None);
        };

        if entry.is_expired(now) {
            conn.execute(
                "DELETE FROM cache_entries WHERE key = ?1 AND subkey = ?2",
                params![key, subkey],
            )?;
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&entry.value)?))
    }

    fn try_del(&self, key: &str, subkey: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM cache_entries WHERE key = ?1 AND subkey = ?2",
            params![key, subkey],
        )?;
        Ok(())
    }

    fn try_get_cursor(&self, key: &str) -> Result<Option<CursorState>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT last_ids, last_timestamp FROM cursors WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let Some((ids, last_timestamp)) = row else {
            return Ok(None);
        };
        let ids: Vec<String> = serde_json::from_str(&ids)?;
        Ok(Some(CursorState::at(last_timestamp, ids)))
    }

    fn try_set_cursor(&self, key: &str, cursor: &CursorState) -> Result<()> {
        let ids = serde_json::to_string(&cursor.last_ids)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO cursors (key, last_ids, last_timestamp, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET last_ids = ?2, last_timestamp = ?3, updated_at = ?4",
            params![key, ids, cursor.last_timestamp, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl CursorStore for SqliteCache {
    fn get_cursor(&self, key: &str) -> Option<CursorState> {
        self.try_get_cursor(key).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "cursor read failed");
            None
        })
    }

    fn set_cursor(&self, key: &str, cursor: &CursorState) {
        if let Err(e) = self.try_set_cursor(key, cursor) {
            tracing::warn!(key, error = %e, "cursor write failed");
        }
    }
}

impl CacheStore for SqliteCache {
    fn set(&self, key: &str, subkey: &str, value: Value, ttl: Option<Duration>) {
        if let Err(e) = self.try_set(key, subkey, &value, ttl) {
            tracing::warn!(key, subkey, error = %e, "cache write failed");
        }
    }

    fn get(&self, key: &str, subkey: &str) -> Option<Value> {
        self.try_get(key, subkey).unwrap_or_else(|e| {
            tracing::warn!(key, subkey, error = %e, "cache read failed");
            None
        })
    }

    fn del(&self, key: &str, subkey: &str) {
        if let Err(e) = self.try_del(key, subkey) {
            tracing::warn!(key, subkey, error = %e, "cache delete failed");
        }
    }
}

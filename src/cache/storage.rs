use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, OptionalExtension, params};
use serde_json::{Map, Value};

use crate::cache::query::validate_read_only;
use crate::cache::types::{
    CacheConfig, CacheEntryInfo, CacheLookup, CacheStats, QueryRows, datetime_from_millis,
};
use crate::config::MAX_QUERY_ROWS;
use crate::error::{CacheError, DocsError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        stored_at INTEGER NOT NULL,
        ttl INTEGER NOT NULL,
        last_accessed INTEGER NOT NULL,
        access_seq INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cache_entries_access ON cache_entries(access_seq);
    CREATE INDEX IF NOT EXISTS idx_cache_entries_stored ON cache_entries(stored_at);
";

/// SQLite-backed document cache with TTL expiry and LRU eviction.
///
/// All statements go through one connection guarded by a mutex, so size
/// bookkeeping and eviction never interleave. Hit and miss counters are
/// atomics and can be read without the lock.
#[derive(Debug)]
pub struct PersistentCache {
    conn: Mutex<Option<Connection>>,
    config: CacheConfig,
    /// Monotonic access counter; orders entries for LRU eviction
    access_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PersistentCache {
    /// Open the cache, creating the database file and schema if needed
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        let conn = match &config.db_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                tracing::info!("Opening cache database at {}", path.display());
                Connection::open(path)?
            }
            None => {
                tracing::info!("Using in-memory cache");
                Connection::open_in_memory()?
            }
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;

        let last_seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(access_seq), 0) FROM cache_entries",
            [],
            |row| row.get(0),
        )?;

        // a database written with a larger capacity is trimmed on open
        let evicted = evict_lru(&conn, config.max_size, None)?;
        if evicted > 0 {
            tracing::info!(
                "Evicted {} cache entries to fit max size {}",
                evicted,
                config.max_size
            );
        }

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            config,
            access_seq: AtomicU64::new(u64::try_from(last_seq).unwrap_or(0)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Open a memory-only cache
    pub fn in_memory(max_size: usize) -> Result<Self, CacheError> {
        Self::open(CacheConfig {
            db_path: None,
            max_size,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up `key`. Expired entries are deleted and reported as a miss, and
    /// storage failures also degrade to a miss.
    pub fn get(&self, key: &str) -> CacheLookup {
        match self.try_get(key) {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache hit for {}", key);
                CacheLookup::hit(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache miss for {}", key);
                CacheLookup::miss()
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Cache read failed for {}, treating as miss: {}", key, e);
                CacheLookup::miss()
            }
        }
    }

    fn try_get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let Some(text) = self.read_entry(key)? else {
            return Ok(None);
        };
        // documents can be large; parse after the connection is released
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Fetch the stored text for `key` and touch it, or remove it if expired
    fn read_entry(&self, key: &str) -> Result<Option<String>, CacheError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(CacheError::Closed)?;

        let row = conn
            .query_row(
                "SELECT value, stored_at, ttl FROM cache_entries WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((text, stored_at, ttl)) = row else {
            return Ok(None);
        };

        let now = now_millis();
        if now > stored_at.saturating_add(ttl) {
            tracing::debug!("Cache entry for {} expired", key);
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            return Ok(None);
        }

        conn.execute(
            "UPDATE cache_entries SET last_accessed = ?1, access_seq = ?2 WHERE key = ?3",
            params![now, self.next_seq(), key],
        )?;

        Ok(Some(text))
    }

    /// Insert or overwrite `key`, evicting least-recently-accessed entries
    /// first so the entry count stays within `max_size`.
    pub fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let max_size = self.config.max_size;
        if max_size == 0 {
            return Ok(());
        }

        let text = serde_json::to_string(value)?;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let now = now_millis();

        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or(CacheError::Closed)?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM cache_entries WHERE key = ?1)",
            params![key],
            |row| row.get(0),
        )?;

        // an overwrite keeps its own row; a new key needs room for one more
        let evicted = if exists {
            evict_lru(&tx, max_size, Some(key))?
        } else {
            evict_lru(&tx, max_size - 1, None)?
        };
        if evicted > 0 {
            tracing::debug!("Evicted {} least recently used cache entries", evicted);
        }

        tx.execute(
            "INSERT INTO cache_entries (key, value, stored_at, ttl, last_accessed, access_seq)
             VALUES (?1, ?2, ?3, ?4, ?3, ?5)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                stored_at = excluded.stored_at,
                ttl = excluded.ttl,
                last_accessed = excluded.last_accessed,
                access_seq = excluded.access_seq",
            params![key, text, now, ttl_ms, self.next_seq()],
        )?;
        tx.commit()?;

        tracing::debug!("Cached {} ({} bytes)", key, text.len());
        Ok(())
    }

    /// Remove a single entry; returns whether it existed
    pub fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(CacheError::Closed)?;
        let removed = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Delete every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(CacheError::Closed)?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE stored_at + ttl < ?1",
            params![now_millis()],
        )?;
        if removed > 0 {
            tracing::info!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }

    /// Remove all entries and reset the counters. The store stays usable.
    pub fn clear(&self) -> Result<(), CacheError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(CacheError::Closed)?;
        conn.execute("DELETE FROM cache_entries", [])?;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        tracing::info!("Cache cleared");
        Ok(())
    }

    /// Release the database connection. Calling it again is a no-op.
    pub fn close(&self) -> Result<(), CacheError> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| CacheError::Sqlite(e))?;
            tracing::info!("Cache closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }

    /// Snapshot of entry counts, sizes and hit statistics
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(CacheError::Closed)?;

        let (entry_count, total_bytes, oldest, newest): (i64, i64, Option<i64>, Option<i64>) =
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(value)), 0), MIN(stored_at), MAX(stored_at)
                 FROM cache_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        let expired_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE stored_at + ttl < ?1",
            params![now_millis()],
            |row| row.get(0),
        )?;
        drop(guard);

        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        let lookups = hit_count + miss_count;

        Ok(CacheStats {
            entry_count: usize::try_from(entry_count).unwrap_or(0),
            expired_count: usize::try_from(expired_count).unwrap_or(0),
            max_size: self.config.max_size,
            hit_count,
            miss_count,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hit_count as f64 / lookups as f64
            },
            total_bytes: u64::try_from(total_bytes).unwrap_or(0),
            oldest_entry: oldest.map(datetime_from_millis),
            newest_entry: newest.map(datetime_from_millis),
            db_path: self
                .config
                .db_path
                .as_ref()
                .map(|p| p.display().to_string()),
        })
    }

    /// Page through entry metadata, newest first with ties broken by key
    pub fn list_entries(&self, limit: usize, offset: usize) -> Result<Vec<CacheEntryInfo>, CacheError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(CacheError::Closed)?;
        let now = now_millis();

        let mut stmt = conn.prepare(
            "SELECT key, stored_at, ttl, last_accessed, LENGTH(value)
             FROM cache_entries
             ORDER BY stored_at DESC, key ASC
             LIMIT ?1 OFFSET ?2",
        )?;
        let entries = stmt
            .query_map(params![sql_int(limit), sql_int(offset)], |row| {
                let stored_at: i64 = row.get(1)?;
                let ttl: i64 = row.get(2)?;
                let last_accessed: i64 = row.get(3)?;
                let size: i64 = row.get(4)?;
                let expires_at = stored_at.saturating_add(ttl);
                Ok(CacheEntryInfo {
                    key: row.get(0)?,
                    stored_at: datetime_from_millis(stored_at),
                    ttl_ms: u64::try_from(ttl).unwrap_or(0),
                    last_accessed: datetime_from_millis(last_accessed),
                    expires_at: datetime_from_millis(expires_at),
                    expired: now > expires_at,
                    size_bytes: u64::try_from(size).unwrap_or(0),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Run a single read-only statement against the cache database.
    ///
    /// The leading keyword is validated before the connection is touched.
    /// SQLite then splits the text: a second statement is rejected, and so is
    /// a first statement it does not report as read-only.
    pub fn query(&self, sql: &str) -> Result<QueryRows, DocsError> {
        let statement = validate_read_only(sql)?;

        let guard = self
            .lock()
            .map_err(|e| DocsError::cache_validation(e.to_string()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| DocsError::cache_validation(CacheError::Closed.to_string()))?;

        let prepare_error =
            |e: rusqlite::Error| DocsError::cache_validation(format!("Failed to prepare query: {e}"));
        let mut batch = Batch::new(conn, statement);
        let mut stmt = batch
            .next()
            .map_err(prepare_error)?
            .ok_or_else(|| DocsError::cache_validation("Query is empty"))?;
        // preparing the remainder runs nothing; it only tells whether more follows
        if batch.next().map_err(prepare_error)?.is_some() {
            return Err(DocsError::cache_validation(
                "Multiple statements are not allowed",
            ));
        }
        if !stmt.readonly() {
            return Err(DocsError::cache_validation(
                "Statement would modify the database",
            ));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query([])
            .map_err(|e| DocsError::cache_validation(format!("Query failed: {e}")))?;

        let mut result = QueryRows {
            columns: columns.clone(),
            ..Default::default()
        };
        while let Some(row) = rows
            .next()
            .map_err(|e| DocsError::cache_validation(format!("Query failed: {e}")))?
        {
            if result.rows.len() >= MAX_QUERY_ROWS {
                result.truncated = true;
                break;
            }
            let mut record = Map::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                let value = row
                    .get_ref(idx)
                    .map(json_from_sql)
                    .map_err(|e| DocsError::cache_validation(format!("Query failed: {e}")))?;
                record.insert(name.clone(), value);
            }
            result.rows.push(record);
        }

        Ok(result)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    fn next_seq(&self) -> i64 {
        i64::try_from(self.access_seq.fetch_add(1, Ordering::Relaxed) + 1).unwrap_or(i64::MAX)
    }
}

/// Delete least recently accessed rows until at most `limit` remain.
/// `spare` is never chosen for eviction.
fn evict_lru(conn: &Connection, limit: usize, spare: Option<&str>) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
    let overflow = count.saturating_sub(sql_int(limit));
    if overflow <= 0 {
        return Ok(0);
    }
    conn.execute(
        "DELETE FROM cache_entries WHERE key IN (
            SELECT key FROM cache_entries WHERE key IS NOT ?2
            ORDER BY access_seq ASC LIMIT ?1
        )",
        params![overflow, spare],
    )
}

fn sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn json_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(format!("<blob {} bytes>", blob.len())),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

//! Type definitions shared by the cache store and its callers

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DEFAULT_MAX_CACHE_SIZE;

/// Construction-time settings for [`PersistentCache`](super::PersistentCache)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// SQLite file; `None` keeps everything in memory
    pub db_path: Option<PathBuf>,
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            max_size: DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub value: Option<Value>,
    pub hit: bool,
}

impl CacheLookup {
    pub fn hit(value: Value) -> Self {
        Self {
            value: Some(value),
            hit: true,
        }
    }

    pub fn miss() -> Self {
        Self {
            value: None,
            hit: false,
        }
    }
}

/// Point-in-time statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub expired_count: usize,
    pub max_size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
    pub total_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<DateTime<Utc>>,
    /// `None` when the cache is memory-only
    pub db_path: Option<String>,
}

/// Metadata for one stored document, without its payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntryInfo {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub ttl_ms: u64,
    pub last_accessed: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
    pub size_bytes: u64,
}

/// Rows returned from an ad-hoc read-only query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    /// Set when the result was cut at the row limit
    pub truncated: bool,
}

/// Convert a stored millisecond timestamp, clamping out-of-range values
pub(crate) fn datetime_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

//! # Cache Module
//!
//! Persistent storage for fetched rustdoc JSON documents.
//!
//! ## Key Components
//!
//! - [`storage`] - SQLite-backed store with TTL expiry and LRU eviction
//! - [`query`] - Validation for the read-only ad-hoc query surface
//! - [`types`] - Configuration, lookup results, statistics and entry metadata

pub mod query;
pub mod storage;
pub mod types;

pub use storage::PersistentCache;
pub use types::{CacheConfig, CacheEntryInfo, CacheLookup, CacheStats, QueryRows};

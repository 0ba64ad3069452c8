//! # Configuration Module
//!
//! Default values and the construction-time configuration for [`DocsFetcher`].
//!
//! [`DocsFetcher`]: crate::fetcher::DocsFetcher

use std::path::PathBuf;
use std::time::Duration;

/// Base URL of the documentation host
pub const DEFAULT_BASE_URL: &str = "https://docs.rs";

/// Default time-to-live for cached documents (1 hour)
pub const DEFAULT_CACHE_TTL_MS: u64 = 3_600_000;

/// Default maximum number of cached documents
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;

/// Default deadline for a single network request (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Encodings advertised to the server. zstd is left out on purpose: docs.rs
/// serves zstd regardless and we decode it ourselves.
pub const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Directory and file names for the on-disk cache
pub const CACHE_ROOT_DIR: &str = "docsrs-mcp";
pub const CACHE_DB_FILE: &str = "cache.db";

/// Maximum number of rows returned from an ad-hoc cache query
pub const MAX_QUERY_ROWS: usize = 1000;

/// Maximum characters of a response body kept in a JSON parse error
pub const ERROR_SNIPPET_LEN: usize = 200;

/// Default page size when listing cache entries
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Configuration for the fetcher and its cache
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
    pub cache_ttl: Duration,
    pub max_cache_size: usize,
    pub request_timeout: Duration,
    /// Location of the SQLite database; `None` keeps the cache in memory
    pub db_path: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            db_path: None,
            user_agent: default_user_agent(),
        }
    }
}

impl FetcherConfig {
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_max_cache_size(mut self, size: usize) -> Self {
        self.max_cache_size = size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Format the user-agent string sent with every request
pub fn default_user_agent() -> String {
    format!(
        "{}/{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_REPOSITORY")
    )
}

/// Default location of the on-disk cache database
pub fn default_db_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(CACHE_ROOT_DIR).join(CACHE_DB_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.base_url, "https://docs.rs");
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_cache_size, 100);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.db_path.is_none());
        assert!(config.user_agent.starts_with("docsrs-mcp/"));
    }

    #[test]
    fn test_builder_methods() {
        let config = FetcherConfig::default()
            .with_cache_ttl(Duration::from_millis(10))
            .with_max_cache_size(3)
            .with_request_timeout(Duration::from_millis(50))
            .with_db_path("/tmp/cache.db");
        assert_eq!(config.cache_ttl, Duration::from_millis(10));
        assert_eq!(config.max_cache_size, 3);
        assert_eq!(config.request_timeout, Duration::from_millis(50));
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/cache.db")));
    }
}

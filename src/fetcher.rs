//! Cache-first fetching of rustdoc JSON from docs.rs

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheConfig, CacheEntryInfo, CacheStats, PersistentCache, QueryRows};
use crate::config::{ACCEPT_ENCODING, ERROR_SNIPPET_LEN, FetcherConfig};
use crate::decompress::{Encoding, decompress};
use crate::error::{CacheError, DocsError, ErrorContext, log_error};
use crate::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::url::FetchRequest;

/// A fetched document and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub data: Value,
    pub from_cache: bool,
}

/// Fetches rustdoc JSON, serving repeated requests from a persistent cache.
///
/// Cloning is cheap; clones share the cache and the transport.
#[derive(Clone)]
pub struct DocsFetcher {
    config: Arc<FetcherConfig>,
    cache: Arc<PersistentCache>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for DocsFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocsFetcher")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl DocsFetcher {
    /// Create a fetcher talking to docs.rs over HTTPS
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let transport = ReqwestTransport::new().context("Failed to create HTTP transport")?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a fetcher that sends requests through `transport`
    pub fn with_transport(config: FetcherConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let cache = PersistentCache::open(CacheConfig {
            db_path: config.db_path.clone(),
            max_size: config.max_cache_size,
        })
        .context("Failed to open documentation cache")?;

        Ok(Self {
            config: Arc::new(config),
            cache: Arc::new(cache),
            transport,
        })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch the rustdoc JSON for a crate.
    ///
    /// `version` defaults to `latest`; `target` and `format_version` are only
    /// part of the request when given.
    pub async fn fetch_crate_json(
        &self,
        crate_name: &str,
        version: Option<&str>,
        target: Option<&str>,
        format_version: Option<u32>,
    ) -> Result<FetchResult, DocsError> {
        let request = FetchRequest {
            crate_name: crate_name.to_string(),
            version: version.map(String::from),
            target: target.map(String::from),
            format_version,
        };
        self.fetch(&request).await
    }

    /// Fetch the document described by `request`
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DocsError> {
        let url = request.url(&self.config.base_url);

        if let Some(data) = self.cache.get(&url).value {
            return Ok(FetchResult {
                data,
                from_cache: true,
            });
        }

        let data = match self.fetch_remote(request, &url).await {
            Ok(data) => data,
            Err(e) => {
                log_error(
                    &e,
                    ErrorContext {
                        url: Some(&url),
                        crate_name: Some(&request.crate_name),
                        version: request.version.as_deref(),
                        target: request.target.as_deref(),
                    },
                );
                return Err(e);
            }
        };

        if let Err(e) = self.cache.set(&url, &data, self.config.cache_ttl) {
            tracing::warn!(url = url.as_str(), "Failed to cache documentation: {}", e);
        }

        Ok(FetchResult {
            data,
            from_cache: false,
        })
    }

    async fn fetch_remote(&self, request: &FetchRequest, url: &str) -> Result<Value, DocsError> {
        tracing::info!("Fetching documentation from {}", url);

        let http_request = HttpRequest::get(url)
            .header("Accept-Encoding", ACCEPT_ENCODING)
            .header("User-Agent", self.config.user_agent.as_str());

        // dropping the pending future on timeout cancels the request and its timer
        let timeout = self.config.request_timeout;
        let response = tokio::time::timeout(timeout, self.transport.send(http_request))
            .await
            .map_err(|_| DocsError::Timeout {
                url: url.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        if response.status == 404 {
            return Err(DocsError::CrateNotFound {
                crate_name: request.crate_name.clone(),
                version: request.version.clone().filter(|v| !v.is_empty()),
            });
        }
        if !response.is_success() {
            return Err(DocsError::http_status(
                url,
                response.status,
                response.status_text.as_deref(),
            ));
        }

        let encoding = Encoding::detect(
            response.header("content-encoding"),
            response.header("content-type"),
        );
        tracing::debug!(
            "Response from {}: {} bytes, encoding {}",
            url,
            response.body.len(),
            encoding
        );

        let body = decompress(&response.body, &encoding, url)?;
        parse_document(&body, url)
    }

    /// Remove every cached document
    pub fn clear_cache(&self) -> Result<(), CacheError> {
        self.cache.clear()
    }

    /// Release the cache database. Call once in-flight fetches have finished.
    pub fn close(&self) -> Result<(), CacheError> {
        self.cache.close()
    }

    pub fn cache_stats(&self) -> Result<CacheStats, CacheError> {
        self.cache.stats()
    }

    pub fn cache_entries(&self, limit: usize, offset: usize) -> Result<Vec<CacheEntryInfo>, CacheError> {
        self.cache.list_entries(limit, offset)
    }

    /// Run a read-only SQL statement against the cache database
    pub fn query_cache_db(&self, sql: &str) -> Result<QueryRows, DocsError> {
        self.cache.query(sql).inspect_err(|e| {
            log_error(e, ErrorContext::default());
        })
    }

    /// Drop expired documents; returns how many were removed
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        self.cache.purge_expired()
    }
}

/// Parse a decoded response body, requiring a JSON object at the top level.
///
/// Bodies that are not valid UTF-8 are rejected by the JSON parser.
pub fn parse_document(body: &[u8], url: &str) -> Result<Value, DocsError> {
    let parse_error = |message: String| DocsError::JsonParse {
        url: url.to_string(),
        snippet: String::from_utf8_lossy(body)
            .chars()
            .take(ERROR_SNIPPET_LEN)
            .collect(),
        message,
    };

    if body.trim_ascii().is_empty() {
        return Err(parse_error("Empty response body".to_string()));
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| parse_error(e.to_string()))?;

    if !value.is_object() {
        let kind = match &value {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        };
        return Err(parse_error(format!("Expected a JSON object, got {kind}")));
    }

    Ok(value)
}

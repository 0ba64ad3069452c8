use rmcp::schemars;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_LIST_LIMIT, MAX_QUERY_ROWS};
use crate::fetcher::DocsFetcher;
use crate::outputs::{
    CacheEntriesOutput, CacheMaintenanceOutput, CacheStatsOutput, CrateDocsOutput, ErrorOutput,
    QueryOutput,
};
use crate::url::FetchRequest;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LookupCrateDocsParams {
    #[schemars(description = "The name of the crate")]
    pub crate_name: String,
    #[schemars(description = "The version of the crate (defaults to 'latest')")]
    pub version: Option<String>,
    #[schemars(
        description = "Optional target triple the docs were built for (e.g., 'x86_64-unknown-linux-gnu')"
    )]
    pub target: Option<String>,
    #[schemars(description = "Optional rustdoc JSON format version to request")]
    pub format_version: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListCacheEntriesParams {
    #[schemars(description = "Maximum number of entries to return (default: 50)")]
    pub limit: Option<usize>,
    #[schemars(description = "Number of entries to skip for pagination (default: 0)")]
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryCacheDbParams {
    #[schemars(
        description = "A single read-only SQL statement (SELECT, WITH or EXPLAIN) against the cache_entries table"
    )]
    pub sql: String,
}

#[derive(Debug, Clone)]
pub struct DocsTools {
    fetcher: DocsFetcher,
}

impl DocsTools {
    pub fn new(fetcher: DocsFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &DocsFetcher {
        &self.fetcher
    }

    pub async fn lookup_crate_docs(&self, params: LookupCrateDocsParams) -> String {
        let crate_name = params.crate_name.trim();
        if crate_name.is_empty() {
            return ErrorOutput::new("Crate name cannot be empty", "invalid_params").to_json();
        }

        let request = FetchRequest {
            crate_name: crate_name.to_string(),
            version: params.version,
            target: params.target,
            format_version: params.format_version,
        };

        match self.fetcher.fetch(&request).await {
            Ok(result) => {
                CrateDocsOutput::from_result(crate_name, request.resolved_version(), &result)
                    .to_json()
            }
            Err(e) => ErrorOutput::from(&e).to_json(),
        }
    }

    pub async fn clear_cache(&self) -> String {
        match self.fetcher.clear_cache() {
            Ok(()) => CacheMaintenanceOutput::success("Cache cleared", None).to_json(),
            Err(e) => ErrorOutput::new(format!("Failed to clear cache: {e}"), "cache").to_json(),
        }
    }

    pub async fn purge_expired_cache(&self) -> String {
        match self.fetcher.purge_expired() {
            Ok(removed) => CacheMaintenanceOutput::success(
                format!("Removed {removed} expired entries"),
                Some(removed),
            )
            .to_json(),
            Err(e) => {
                ErrorOutput::new(format!("Failed to purge cache: {e}"), "cache").to_json()
            }
        }
    }

    pub async fn get_cache_stats(&self) -> String {
        match self.fetcher.cache_stats() {
            Ok(stats) => CacheStatsOutput { stats }.to_json(),
            Err(e) => {
                ErrorOutput::new(format!("Failed to read cache stats: {e}"), "cache").to_json()
            }
        }
    }

    pub async fn list_cache_entries(&self, params: ListCacheEntriesParams) -> String {
        let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_QUERY_ROWS);
        let offset = params.offset.unwrap_or(0);

        match self.fetcher.cache_entries(limit, offset) {
            Ok(entries) => CacheEntriesOutput {
                count: entries.len(),
                entries,
                limit,
                offset,
            }
            .to_json(),
            Err(e) => {
                ErrorOutput::new(format!("Failed to list cache entries: {e}"), "cache").to_json()
            }
        }
    }

    pub async fn query_cache_db(&self, params: QueryCacheDbParams) -> String {
        match self.fetcher.query_cache_db(&params.sql) {
            Ok(result) => QueryOutput {
                row_count: result.rows.len(),
                result,
            }
            .to_json(),
            Err(e) => ErrorOutput::from(&e).to_json(),
        }
    }
}

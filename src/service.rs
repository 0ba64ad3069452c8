use anyhow::Result;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::config::FetcherConfig;
use crate::fetcher::DocsFetcher;
use crate::tools::{DocsTools, ListCacheEntriesParams, LookupCrateDocsParams, QueryCacheDbParams};

#[derive(Debug, Clone)]
pub struct DocsRsService {
    docs_tools: DocsTools,
    tool_router: ToolRouter<Self>,
}

impl DocsRsService {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        Ok(Self::with_fetcher(DocsFetcher::new(config)?))
    }

    /// Serve tools backed by an existing fetcher
    pub fn with_fetcher(fetcher: DocsFetcher) -> Self {
        Self {
            docs_tools: DocsTools::new(fetcher),
            tool_router: Self::tool_router(),
        }
    }

    pub fn fetcher(&self) -> &DocsFetcher {
        self.docs_tools.fetcher()
    }
}

#[tool_router]
impl DocsRsService {
    #[tool(
        description = "Fetch the rustdoc JSON for a crate from docs.rs and summarize it: crate version, rustdoc format version, root module documentation and item counts. Results are cached, so repeated lookups are fast. Version defaults to 'latest'; target and format_version are optional."
    )]
    pub async fn lookup_crate_docs(&self, params: Parameters<LookupCrateDocsParams>) -> String {
        self.docs_tools.lookup_crate_docs(params.0).await
    }

    #[tool(
        description = "Remove every cached documentation entry. The next lookup for any crate goes to docs.rs again."
    )]
    pub async fn clear_cache(&self) -> String {
        self.docs_tools.clear_cache().await
    }

    #[tool(description = "Remove cached documentation entries whose time-to-live has elapsed.")]
    pub async fn purge_expired_cache(&self) -> String {
        self.docs_tools.purge_expired_cache().await
    }

    #[tool(
        description = "Show cache statistics: entry count, capacity, hit and miss counts, hit rate, stored bytes and the oldest and newest entries."
    )]
    pub async fn get_cache_stats(&self) -> String {
        self.docs_tools.get_cache_stats().await
    }

    #[tool(
        description = "List cached documentation entries (newest first) with their storage time, TTL and size. Supports pagination through limit and offset."
    )]
    pub async fn list_cache_entries(&self, params: Parameters<ListCacheEntriesParams>) -> String {
        self.docs_tools.list_cache_entries(params.0).await
    }

    #[tool(
        description = "Run a read-only SQL query against the cache database for debugging. Only a single SELECT, WITH or EXPLAIN statement is accepted. The table is cache_entries(key, value, stored_at, ttl, last_accessed, access_seq)."
    )]
    pub async fn query_cache_db(&self, params: Parameters<QueryCacheDbParams>) -> String {
        self.docs_tools.query_cache_db(params.0).await
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DocsRsService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(Default::default()),
                ..Default::default()
            },
            instructions: Some(
                "MCP server for looking up Rust crate documentation on docs.rs. Use lookup_crate_docs to fetch a crate's rustdoc JSON summary; results are cached on disk between runs. Use get_cache_stats and list_cache_entries to inspect the cache, clear_cache or purge_expired_cache to reset it, and query_cache_db for read-only SQL debugging.".to_string(),
            ),
            ..Default::default()
        }
    }
}

use anyhow::Result;
use clap::Parser;
use docsrs_mcp::config::{
    DEFAULT_BASE_URL, DEFAULT_CACHE_TTL_MS, DEFAULT_MAX_CACHE_SIZE, DEFAULT_REQUEST_TIMEOUT_MS,
    CACHE_DB_FILE, default_db_path,
};
use docsrs_mcp::{DocsRsService, FetcherConfig};
use rmcp::{ServiceExt, transport::stdio};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// MCP server for fetching Rust crate documentation from docs.rs with persistent caching
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache time-to-live in milliseconds
    #[arg(long, env = "DOCSRS_MCP_CACHE_TTL", default_value_t = DEFAULT_CACHE_TTL_MS)]
    cache_ttl: u64,

    /// Maximum number of cached documents
    #[arg(long, env = "DOCSRS_MCP_MAX_CACHE_SIZE", default_value_t = DEFAULT_MAX_CACHE_SIZE)]
    max_cache_size: usize,

    /// Request timeout in milliseconds
    #[arg(long, env = "DOCSRS_MCP_REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    request_timeout: u64,

    /// Cache database file or directory (defaults to the user cache directory)
    #[arg(long, env = "DOCSRS_MCP_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Keep the cache in memory only
    #[arg(long, conflicts_with = "db_path")]
    in_memory: bool,

    /// Documentation host
    #[arg(long, env = "DOCSRS_MCP_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

impl Args {
    fn into_config(self) -> FetcherConfig {
        let db_path = if self.in_memory {
            None
        } else {
            match self.db_path {
                Some(path) if path.is_dir() => Some(path.join(CACHE_DB_FILE)),
                Some(path) => Some(path),
                None => default_db_path(),
            }
        };

        FetcherConfig {
            db_path,
            ..FetcherConfig::default()
        }
        .with_cache_ttl(Duration::from_millis(self.cache_ttl))
        .with_max_cache_size(self.max_cache_size)
        .with_request_timeout(Duration::from_millis(self.request_timeout))
        .with_base_url(self.base_url)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing to stderr to avoid conflicts with stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = args.into_config();
    tracing::info!("Starting docs.rs MCP server on stdio...");
    match &config.db_path {
        Some(path) => tracing::info!("Using cache database: {}", path.display()),
        None => tracing::info!("Cache persistence disabled"),
    }

    let docs_service = DocsRsService::new(config)?;
    let fetcher = docs_service.fetcher().clone();

    // Serve using stdio transport
    let service = docs_service.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("serving error: {:?}", e);
    })?;

    // Wait for the service to complete
    service.waiting().await?;

    if let Err(e) = fetcher.close() {
        tracing::warn!("Failed to close cache: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["docsrs-mcp", "--in-memory"]);
        let config = args.into_config();
        assert!(config.db_path.is_none());
        assert_eq!(config.cache_ttl, Duration::from_millis(DEFAULT_CACHE_TTL_MS));
        assert_eq!(config.max_cache_size, DEFAULT_MAX_CACHE_SIZE);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "docsrs-mcp",
            "--cache-ttl",
            "1000",
            "--max-cache-size",
            "5",
            "--request-timeout",
            "250",
            "--db-path",
            "/tmp/docsrs-mcp-test/cache.db",
        ]);
        let config = args.into_config();
        assert_eq!(config.cache_ttl, Duration::from_secs(1));
        assert_eq!(config.max_cache_size, 5);
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/tmp/docsrs-mcp-test/cache.db"))
        );
    }
}

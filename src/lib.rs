//! Fetch rustdoc JSON from docs.rs with a persistent, TTL-aware cache, and
//! serve it over MCP.

pub mod cache;
pub mod config;
pub mod decompress;
pub mod error;
pub mod fetcher;
pub mod outputs;
pub mod service;
pub mod tools;
pub mod transport;
pub mod url;

pub use config::FetcherConfig;
pub use error::DocsError;
pub use fetcher::{DocsFetcher, FetchResult};
pub use service::DocsRsService;
pub use url::{FetchRequest, build_url};

//! Output types for the MCP tools
//!
//! These types are serialized to JSON strings for the MCP protocol and can be
//! deserialized in tests for type-safe validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheEntryInfo, CacheStats, QueryRows};
use crate::error::DocsError;
use crate::fetcher::FetchResult;

fn to_json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string())
}

/// Error response shared by all tools
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ErrorOutput {
    pub error: String,
    pub kind: String,
    pub retryable: bool,
}

impl ErrorOutput {
    pub fn new(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
            retryable: false,
        }
    }

    pub fn to_json(&self) -> String {
        to_json_string(self)
    }
}

impl From<&DocsError> for ErrorOutput {
    fn from(error: &DocsError) -> Self {
        Self {
            error: error.to_string(),
            kind: error.kind().to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Summary of a rustdoc JSON document
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CrateDocsOutput {
    #[serde(rename = "crate")]
    pub crate_name: String,
    pub requested_version: String,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crate_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_docs: Option<String>,
    pub item_count: usize,
    pub path_count: usize,
    pub external_crate_count: usize,
    pub size_bytes: usize,
}

impl CrateDocsOutput {
    /// Summarize a fetched document.
    ///
    /// Only a handful of well-known top-level fields are read; everything
    /// else in the document is left alone.
    pub fn from_result(crate_name: &str, requested_version: &str, result: &FetchResult) -> Self {
        let doc = &result.data;
        let count = |field: &str| doc.get(field).and_then(Value::as_object).map_or(0, |m| m.len());

        let root_item = doc
            .get("root")
            .and_then(|root| match root {
                Value::String(id) => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .and_then(|id| doc.get("index").and_then(|index| index.get(id.as_str())));

        Self {
            crate_name: crate_name.to_string(),
            requested_version: requested_version.to_string(),
            from_cache: result.from_cache,
            crate_version: doc
                .get("crate_version")
                .and_then(Value::as_str)
                .map(String::from),
            format_version: doc.get("format_version").and_then(Value::as_u64),
            root_name: root_item
                .and_then(|item| item.get("name"))
                .and_then(Value::as_str)
                .map(String::from),
            root_docs: root_item
                .and_then(|item| item.get("docs"))
                .and_then(Value::as_str)
                .map(String::from),
            item_count: count("index"),
            path_count: count("paths"),
            external_crate_count: count("external_crates"),
            size_bytes: result.data.to_string().len(),
        }
    }

    pub fn to_json(&self) -> String {
        to_json_string(self)
    }
}

/// Output from clear_cache and purge_expired_cache
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CacheMaintenanceOutput {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}

impl CacheMaintenanceOutput {
    pub fn success(message: impl Into<String>, removed: Option<usize>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            removed,
        }
    }

    pub fn to_json(&self) -> String {
        to_json_string(self)
    }
}

/// Output from get_cache_stats
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CacheStatsOutput {
    #[serde(flatten)]
    pub stats: CacheStats,
}

impl CacheStatsOutput {
    pub fn to_json(&self) -> String {
        to_json_string(self)
    }
}

/// Output from list_cache_entries
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CacheEntriesOutput {
    pub entries: Vec<CacheEntryInfo>,
    pub limit: usize,
    pub offset: usize,
    pub count: usize,
}

impl CacheEntriesOutput {
    pub fn to_json(&self) -> String {
        to_json_string(self)
    }
}

/// Output from query_cache_db
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct QueryOutput {
    #[serde(flatten)]
    pub result: QueryRows,
    pub row_count: usize,
}

impl QueryOutput {
    pub fn to_json(&self) -> String {
        to_json_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_crate_docs_summary() {
        let result = FetchResult {
            data: json!({
                "root": "0:0",
                "crate_version": "1.0.219",
                "format_version": 39,
                "index": {
                    "0:0": {"name": "serde", "docs": "Serde is a framework..."},
                    "0:1": {"name": "Serialize"}
                },
                "paths": {"0:0": {}},
                "external_crates": {"1": {}, "2": {}}
            }),
            from_cache: true,
        };

        let output = CrateDocsOutput::from_result("serde", "latest", &result);
        assert_eq!(output.crate_version.as_deref(), Some("1.0.219"));
        assert_eq!(output.format_version, Some(39));
        assert_eq!(output.root_name.as_deref(), Some("serde"));
        assert_eq!(output.root_docs.as_deref(), Some("Serde is a framework..."));
        assert_eq!(output.item_count, 2);
        assert_eq!(output.path_count, 1);
        assert_eq!(output.external_crate_count, 2);
        assert!(output.from_cache);

        let json = output.to_json();
        let parsed: CrateDocsOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, output);
        assert!(json.contains(r#""crate":"serde""#));
    }

    #[test]
    fn test_numeric_root_id() {
        let result = FetchResult {
            data: json!({"root": 0, "index": {"0": {"name": "tiny"}}}),
            from_cache: false,
        };
        let output = CrateDocsOutput::from_result("tiny", "0.1.0", &result);
        assert_eq!(output.root_name.as_deref(), Some("tiny"));
        assert_eq!(output.root_docs, None);
        assert_eq!(output.crate_version, None);
    }

    #[test]
    fn test_error_output_from_docs_error() {
        let err = DocsError::Timeout {
            url: "https://docs.rs/x".into(),
            timeout_ms: 10,
        };
        let output = ErrorOutput::from(&err);
        assert_eq!(output.kind, "timeout");
        assert!(output.retryable);
        assert_eq!(output.error, "Request timeout after 10ms");
    }
}

//! Error taxonomy for documentation fetches
//!
//! Every failure surfaced by the fetcher is one of the [`DocsError`] variants so
//! callers can tell "does not exist" apart from "transient" and "malformed".

use std::fmt;

/// Closed set of failures produced while fetching documentation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocsError {
    #[error("{}", not_found_message(.crate_name, .version.as_deref()))]
    CrateNotFound {
        crate_name: String,
        version: Option<String>,
    },

    #[error("Network error: {message}")]
    Network {
        url: Option<String>,
        status: Option<u16>,
        status_text: Option<String>,
        message: String,
    },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Failed to decompress {encoding} response: {message}")]
    Decompression {
        url: String,
        encoding: String,
        message: String,
    },

    #[error("Failed to parse JSON response: {message}")]
    JsonParse {
        url: String,
        snippet: String,
        message: String,
    },

    #[error("Invalid cache query: {message}")]
    CacheValidation { message: String },
}

fn not_found_message(crate_name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("Crate '{crate_name}' version '{version}' not found"),
        None => format!("Crate '{crate_name}' not found"),
    }
}

impl DocsError {
    /// Wrap an arbitrary failure as a network error
    pub fn network(url: Option<&str>, message: impl fmt::Display) -> Self {
        DocsError::Network {
            url: url.map(String::from),
            status: None,
            status_text: None,
            message: message.to_string(),
        }
    }

    /// Build a network error from a non-success HTTP status
    pub fn http_status(url: &str, status: u16, status_text: Option<&str>) -> Self {
        let reason = status_text.unwrap_or("Unknown error");
        DocsError::Network {
            url: Some(url.to_string()),
            status: Some(status),
            status_text: status_text.map(String::from),
            message: format!("HTTP {status} {reason} for {url}"),
        }
    }

    pub fn cache_validation(message: impl Into<String>) -> Self {
        DocsError::CacheValidation {
            message: message.into(),
        }
    }

    /// Stable snake-case name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            DocsError::CrateNotFound { .. } => "crate_not_found",
            DocsError::Network { .. } => "network",
            DocsError::Timeout { .. } => "timeout",
            DocsError::Decompression { .. } => "decompression",
            DocsError::JsonParse { .. } => "json_parse",
            DocsError::CacheValidation { .. } => "cache_validation",
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DocsError::Network { .. } | DocsError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DocsError::CrateNotFound { .. })
    }

    /// URL the failure relates to, when known
    pub fn url(&self) -> Option<&str> {
        match self {
            DocsError::Network { url, .. } => url.as_deref(),
            DocsError::Timeout { url, .. }
            | DocsError::Decompression { url, .. }
            | DocsError::JsonParse { url, .. } => Some(url),
            DocsError::CrateNotFound { .. } | DocsError::CacheValidation { .. } => None,
        }
    }
}

/// Request details attached to diagnostic events
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub url: Option<&'a str>,
    pub crate_name: Option<&'a str>,
    pub version: Option<&'a str>,
    pub target: Option<&'a str>,
}

/// Emit a structured diagnostic event for an error.
///
/// Logging only; callers decide whether the error propagates.
pub fn log_error(error: &DocsError, ctx: ErrorContext<'_>) {
    let url = ctx.url.or_else(|| error.url()).unwrap_or_default();
    let crate_name = ctx.crate_name.unwrap_or_default();
    let version = ctx.version.unwrap_or_default();
    let target = ctx.target.unwrap_or_default();

    match error {
        DocsError::CrateNotFound { .. } => {
            tracing::warn!(kind = error.kind(), url, crate_name, version, target, "{error}")
        }
        DocsError::Network { status, .. } => tracing::error!(
            kind = error.kind(),
            url,
            crate_name,
            version,
            target,
            status = status.unwrap_or_default(),
            "{error}"
        ),
        DocsError::Decompression { encoding, .. } => tracing::error!(
            kind = error.kind(),
            url,
            crate_name,
            version,
            target,
            encoding = encoding.as_str(),
            "{error}"
        ),
        DocsError::JsonParse { snippet, .. } => tracing::error!(
            kind = error.kind(),
            url,
            crate_name,
            version,
            target,
            snippet = snippet.as_str(),
            "{error}"
        ),
        DocsError::Timeout { .. } | DocsError::CacheValidation { .. } => {
            tracing::error!(kind = error.kind(), url, crate_name, version, target, "{error}")
        }
    }
}

/// Errors raised by the SQLite-backed cache store
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache storage is closed")]
    Closed,
    #[error("Cache lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_messages() {
        let err = DocsError::CrateNotFound {
            crate_name: "serde".to_string(),
            version: None,
        };
        assert_eq!(err.to_string(), "Crate 'serde' not found");

        let err = DocsError::CrateNotFound {
            crate_name: "serde".to_string(),
            version: Some("1.0.0".to_string()),
        };
        assert_eq!(err.to_string(), "Crate 'serde' version '1.0.0' not found");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_message() {
        let err = DocsError::Timeout {
            url: "https://docs.rs/crate/serde/latest/json".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
        assert!(err.is_retryable());
        assert_eq!(err.url(), Some("https://docs.rs/crate/serde/latest/json"));
    }

    #[test]
    fn test_http_status_error() {
        let err = DocsError::http_status("https://docs.rs/x", 503, Some("Service Unavailable"));
        match &err {
            DocsError::Network {
                status,
                status_text,
                ..
            } => {
                assert_eq!(*status, Some(503));
                assert_eq!(status_text.as_deref(), Some("Service Unavailable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("503"));
        assert_eq!(err.kind(), "network");
    }

    #[test]
    fn test_kinds_are_distinct() {
        let errors = [
            DocsError::CrateNotFound {
                crate_name: "a".into(),
                version: None,
            },
            DocsError::network(None, "boom"),
            DocsError::Timeout {
                url: "u".into(),
                timeout_ms: 1,
            },
            DocsError::Decompression {
                url: "u".into(),
                encoding: "br".into(),
                message: "bad".into(),
            },
            DocsError::JsonParse {
                url: "u".into(),
                snippet: String::new(),
                message: "bad".into(),
            },
            DocsError::cache_validation("nope"),
        ];
        let mut kinds: Vec<_> = errors.iter().map(DocsError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_log_error_does_not_panic() {
        let err = DocsError::Decompression {
            url: "https://docs.rs/x".into(),
            encoding: "zstd".into(),
            message: "corrupt".into(),
        };
        log_error(
            &err,
            ErrorContext {
                crate_name: Some("x"),
                ..Default::default()
            },
        );
    }
}

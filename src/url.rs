//! Request URL construction.
//!
//! The URL doubles as the cache key: two requests share a cache entry exactly
//! when they resolve to the same URL.

/// Version segment used when the caller does not pin one
pub const LATEST_VERSION: &str = "latest";

/// Parameters identifying one rustdoc JSON document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub crate_name: String,
    pub version: Option<String>,
    pub target: Option<String>,
    pub format_version: Option<u32>,
}

impl FetchRequest {
    pub fn new(crate_name: impl Into<String>) -> Self {
        Self {
            crate_name: crate_name.into(),
            ..Default::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn format_version(mut self, format_version: u32) -> Self {
        self.format_version = Some(format_version);
        self
    }

    /// Version actually requested, falling back to `latest`
    pub fn resolved_version(&self) -> &str {
        self.version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(LATEST_VERSION)
    }

    /// Build the request URL against `base_url`
    pub fn url(&self, base_url: &str) -> String {
        build_url(
            base_url,
            &self.crate_name,
            self.version.as_deref(),
            self.target.as_deref(),
            self.format_version,
        )
    }
}

/// Build `<base>/crate/<name>/<version>/[<target>/]json[/<format_version>]`.
///
/// A zero `format_version` is treated the same as none.
pub fn build_url(
    base_url: &str,
    crate_name: &str,
    version: Option<&str>,
    target: Option<&str>,
    format_version: Option<u32>,
) -> String {
    let version = version.filter(|v| !v.is_empty()).unwrap_or(LATEST_VERSION);
    let mut url = format!(
        "{}/crate/{crate_name}/{version}/",
        base_url.trim_end_matches('/')
    );

    if let Some(target) = target.filter(|t| !t.is_empty()) {
        url.push_str(target);
        url.push('/');
    }

    url.push_str("json");

    if let Some(format_version) = format_version.filter(|v| *v != 0) {
        url.push('/');
        url.push_str(&format_version.to_string());
    }

    url
}

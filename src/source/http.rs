//! HTTP page source
//!
//! Requests `{url}?{page_param}={index}&{size_param}={size}` and reads the
//! items, total extent and last-page flag from the JSON body. Fetching blocks
//! the calling thread on the tokio runtime the source was built with, so it
//! must be driven from a blocking worker or a rayon thread, never from
//! inside an async task.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::pagination::PageFetcher;
use crate::types::{pages_for, JsonValue, PageRequest, PageResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Handle;
use url::Url;

/// Configuration for an HTTP page source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSourceConfig {
    /// Endpoint URL; existing query parameters are kept
    pub url: String,
    /// Query parameter carrying the zero-based page index
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Query parameter carrying the page size
    #[serde(default = "default_size_param")]
    pub size_param: String,
    /// Dot path to the items array (`data.items`); the body itself when unset
    #[serde(default)]
    pub items_path: Option<String>,
    /// Dot path to the total page count
    #[serde(default)]
    pub total_pages_path: Option<String>,
    /// Dot path to the total item count, used when no page count is given
    #[serde(default)]
    pub total_items_path: Option<String>,
    /// Dot path to the last-page flag
    #[serde(default)]
    pub is_last_path: Option<String>,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Token bucket applied across all fetches of this source
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_size_param() -> String {
    "size".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl HttpSourceConfig {
    /// Config for `url` with default parameter names
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page_param: default_page_param(),
            size_param: default_size_param(),
            items_path: None,
            total_pages_path: None,
            total_items_path: None,
            is_last_path: None,
            headers: HashMap::new(),
            timeout_secs: default_timeout_secs(),
            rate_limit: None,
        }
    }

    /// Set the items path
    #[must_use]
    pub fn with_items_path(mut self, path: impl Into<String>) -> Self {
        self.items_path = Some(path.into());
        self
    }

    /// Set the total pages path
    #[must_use]
    pub fn with_total_pages_path(mut self, path: impl Into<String>) -> Self {
        self.total_pages_path = Some(path.into());
        self
    }

    /// Set the total items path
    #[must_use]
    pub fn with_total_items_path(mut self, path: impl Into<String>) -> Self {
        self.total_items_path = Some(path.into());
        self
    }

    /// Set the last-page flag path
    #[must_use]
    pub fn with_is_last_path(mut self, path: impl Into<String>) -> Self {
        self.is_last_path = Some(path.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set rate limiting
    #[must_use]
    pub fn with_rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }
}

/// Page source backed by a JSON HTTP endpoint
pub struct HttpPageSource {
    client: Client,
    url: Url,
    config: HttpSourceConfig,
    rate_limiter: Option<RateLimiter>,
    runtime: Handle,
}

impl HttpPageSource {
    /// Create a source that runs its requests on `runtime`
    pub fn new(config: HttpSourceConfig, runtime: Handle) -> Result<Self> {
        let url = Url::parse(&config.url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("solidafy-pagestream/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            url,
            config,
            rate_limiter,
            runtime,
        })
    }

    /// Create a source on the runtime of the calling context
    pub fn current(config: HttpSourceConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("HTTP source needs a tokio runtime: {e}")))?;
        Self::new(config, runtime)
    }

    /// Source configuration
    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    async fn fetch_page(&self, request: PageRequest) -> Result<PageResult<JsonValue>> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut req = self.client.get(self.url.clone()).query(&[
            (self.config.page_param.as_str(), request.index.to_string()),
            (self.config.size_param.as_str(), request.size.to_string()),
        ]);
        for (key, value) in &self.config.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }

        let body: JsonValue = response.json().await?;
        parse_page(&self.config, body, request.size)
    }
}

impl PageFetcher<PageResult<JsonValue>> for HttpPageSource {
    fn fetch(&self, request: PageRequest) -> Result<PageResult<JsonValue>> {
        self.runtime
            .block_on(self.fetch_page(request))
            .map_err(|e| match e {
                Error::Extraction { .. } => e,
                other => Error::fetch(request.index, other.to_string()),
            })
    }
}

impl std::fmt::Debug for HttpPageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPageSource")
            .field("url", &self.url.as_str())
            .field("rate_limited", &self.has_rate_limiter())
            .finish()
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Split a response body into a page
pub(crate) fn parse_page(
    config: &HttpSourceConfig,
    mut body: JsonValue,
    page_size: u64,
) -> Result<PageResult<JsonValue>> {
    let total_pages = match (&config.total_pages_path, &config.total_items_path) {
        (Some(path), _) => Some(read_u64(&body, path)?),
        (None, Some(path)) => Some(pages_for(read_u64(&body, path)?, page_size)),
        (None, None) => None,
    };

    let is_last = match &config.is_last_path {
        Some(path) => lookup(&body, path).and_then(JsonValue::as_bool),
        None => None,
    };

    let items_path = config.items_path.as_deref().unwrap_or("");
    let items = match body.pointer_mut(&to_pointer(items_path)).map(JsonValue::take) {
        Some(JsonValue::Array(items)) => items,
        Some(JsonValue::Null) | None => {
            return Err(Error::extraction(format!(
                "no items array at '{items_path}'"
            )))
        }
        Some(other) => {
            return Err(Error::extraction(format!(
                "expected an array at '{items_path}', found {}",
                json_kind(&other)
            )))
        }
    };

    let mut page = PageResult::new(items);
    page.total_pages = total_pages;
    page.is_last = is_last;
    Ok(page)
}

fn read_u64(body: &JsonValue, path: &str) -> Result<u64> {
    lookup(body, path)
        .and_then(JsonValue::as_u64)
        .ok_or_else(|| Error::extraction(format!("no unsigned integer at '{path}'")))
}

/// Resolve a dot path such as `meta.total` or `$.data.0.id`
pub fn lookup<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    value.pointer(&to_pointer(path))
}

/// Convert a dot path into a JSON pointer
fn to_pointer(path: &str) -> String {
    let path = path.trim();
    let path = path
        .strip_prefix("$.")
        .or_else(|| path.strip_prefix('$'))
        .unwrap_or(path);

    path.split('.')
        .filter(|segment| !segment.is_empty())
        .fold(String::new(), |mut pointer, segment| {
            pointer.push('/');
            pointer.push_str(&segment.replace('~', "~0").replace('/', "~1"));
            pointer
        })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

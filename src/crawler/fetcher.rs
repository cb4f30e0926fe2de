//! HTTP fetcher implementation
//!
//! This module defines the [`Fetcher`] abstraction shared by both fetch
//! strategies, the [`RawResponse`] they produce, and the plain HTTP strategy:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests that follow redirects
//! - Error classification into diagnostic responses

use crate::config::{CrawlConfig, FetchStrategy};
use crate::filter::last_modified;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Status reported when no HTTP response was received at all
pub const STATUS_TRANSPORT_FAILURE: u16 = 0;

/// Maximum redirect hops followed by the plain strategy
const MAX_REDIRECTS: usize = 10;

/// Raw result of fetching one URL
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// URL of the final response after redirects
    pub final_url: Url,

    /// HTTP status code, or [`STATUS_TRANSPORT_FAILURE`]
    pub status: u16,

    /// Response headers (lookups are case-insensitive)
    pub headers: HeaderMap,

    /// Response body; empty for failures and non-HTML content
    pub body: String,

    /// True for a 2xx response
    pub ok: bool,

    /// Description of what went wrong, if anything
    pub error: Option<String>,

    /// Links revealed by interacting with a rendered page
    pub discovered_links: Vec<String>,
}

impl RawResponse {
    /// Builds a response for a request that never produced an HTTP status
    pub fn failure(url: &Url, error: impl Into<String>) -> Self {
        Self {
            final_url: url.clone(),
            status: STATUS_TRANSPORT_FAILURE,
            headers: HeaderMap::new(),
            body: String::new(),
            ok: false,
            error: Some(error.into()),
            discovered_links: Vec::new(),
        }
    }

    /// Returns a header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        last_modified(&self.headers)
    }

    /// Returns true unless the response declares a non-HTML content type
    pub fn is_html(&self) -> bool {
        self.content_type().map_or(true, is_html_content_type)
    }
}

/// Returns true for HTML and XHTML content types
pub fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml")
}

/// A page retrieval strategy
///
/// Implementations never fail on ordinary per-page problems: refused
/// connections, timeouts and error statuses come back as a [`RawResponse`]
/// with `ok == false` so the crawl can continue past a broken page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a single URL
    async fn fetch(&self, url: &Url) -> RawResponse;

    /// Which strategy this fetcher implements
    fn strategy(&self) -> FetchStrategy;

    /// Releases long-lived resources (browser sessions, pools)
    async fn close(&self) {}
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawl configuration (user agent and request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use webtrawl::config::CrawlConfig;
/// use webtrawl::crawler::build_http_client;
///
/// let config = CrawlConfig::new("https://example.com/");
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &CrawlConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en,*;q=0.5"),
    );

    let timeout = config.request_timeout();

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP fetch strategy
#[derive(Debug, Clone)]
pub struct PlainFetcher {
    client: Client,
}

impl PlainFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl Fetcher for PlainFetcher {
    async fn fetch(&self, url: &Url) -> RawResponse {
        fetch_url(&self.client, url).await
    }

    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Plain
    }
}

/// Fetches a URL with a single GET request
///
/// # Request Flow
///
/// 1. Send GET request (redirects are followed by the client)
/// 2. Record final URL, status and headers
/// 3. Read the body if the content type is HTML (or undeclared)
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | ok, body read |
/// | Other status | not ok, status kept, body read |
/// | Timeout | not ok, status 0, "Request timeout" |
/// | Connection refused | not ok, status 0, "Connection refused" |
/// | Too many redirects | not ok, status 0 |
/// | Body read failure | not ok, status kept |
pub async fn fetch_url(client: &Client, url: &Url) -> RawResponse {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return RawResponse::failure(url, classify_error(&e)),
    };

    let status = response.status();
    let final_url = response.url().clone();
    let headers = response.headers().clone();

    let mut raw = RawResponse {
        final_url,
        status: status.as_u16(),
        headers,
        body: String::new(),
        ok: status.is_success(),
        error: None,
        discovered_links: Vec::new(),
    };

    if !status.is_success() {
        raw.error = Some(format!("HTTP {}", status.as_u16()));
    }

    if !raw.is_html() {
        tracing::debug!(
            "Skipping body of {}: content type {}",
            url,
            raw.content_type().unwrap_or_default()
        );
        return raw;
    }

    match response.text().await {
        Ok(body) => raw.body = body,
        Err(e) => {
            raw.ok = false;
            raw.error = Some(format!("Failed to read body: {}", classify_error(&e)));
        }
    }

    raw
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        "Too many redirects".to_string()
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let config = CrawlConfig::new("https://example.com/");
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_plain_fetcher_strategy() {
        let config = CrawlConfig::new("https://example.com/");
        let fetcher = PlainFetcher::new(&config).unwrap();
        assert_eq!(fetcher.strategy(), FetchStrategy::Plain);
    }

    #[test]
    fn test_failure_response() {
        let url = Url::parse("https://example.com/").unwrap();
        let raw = RawResponse::failure(&url, "Connection refused");

        assert_eq!(raw.status, STATUS_TRANSPORT_FAILURE);
        assert!(!raw.ok);
        assert!(raw.body.is_empty());
        assert_eq!(raw.error.as_deref(), Some("Connection refused"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut raw = RawResponse::failure(&url, "x");
        raw.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));

        assert_eq!(raw.header("Content-Type"), Some("text/html"));
        assert_eq!(raw.header("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(raw.content_type(), Some("text/html"));
    }

    #[test]
    fn test_html_content_types() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("Application/XHTML+xml"));
        assert!(!is_html_content_type("application/pdf"));
        assert!(!is_html_content_type("image/png"));
    }

    #[test]
    fn test_missing_content_type_counts_as_html() {
        let url = Url::parse("https://example.com/").unwrap();
        let raw = RawResponse::failure(&url, "x");
        assert!(raw.is_html());
    }
}

//! webtrawl: a bounded-depth, polite web crawler
//!
//! This crate walks a web site depth-first from a root URL, hands every page to a
//! caller-supplied handler, and follows links up to a fixed depth. Pages can be
//! fetched over plain HTTP or rendered in a headless browser.

pub mod config;
pub mod crawler;
pub mod filter;
pub mod output;
pub mod url;

use std::fmt;
use thiserror::Error;

/// Main error type for crawl operations
///
/// Per-page failures (timeouts, refused connections, HTTP errors) are not
/// represented here; they are reported to the data handler and the crawl
/// moves on.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{hook} failed: {source}")]
    Callback {
        hook: Hook,
        source: anyhow::Error,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identifies which caller hook raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    DataHandler,
    StopHandler,
    LinkExtractor,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::DataHandler => "data handler",
            Hook::StopHandler => "stop handler",
            Hook::LinkExtractor => "link extractor",
        };
        f.write_str(name)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid URL pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{CrawlConfig, InteractOptions, RenderOptions, WaitUntil};
pub use crawler::{
    handler_fn, links_fn, scrape_website, stop_fn, CrawlOutcome, CrawlReport, Crawler,
    DataHandler, InteractiveLinkExtractor, LinkExtractor, ScrapedPage, StopHandler, VisitedSet,
};
pub use crate::url::normalize_url;

//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Plain HTTP and browser-rendered fetching
//! - HTML parsing, text and link extraction
//! - Caller hooks for page handling, early termination and link discovery
//! - Page interaction (page size, scrolling, pagination) on rendered pages
//! - Depth-first traversal with fetch pacing

mod callbacks;
mod engine;
mod fetcher;
mod interactive;
mod parser;
mod rendered;
mod report;
mod visited;

pub use callbacks::{handler_fn, links_fn, stop_fn, DataHandler, LinkExtractor, StopHandler};
pub use engine::{scrape_website, Crawler, VisitControl};
pub use fetcher::{
    build_http_client, fetch_url, is_html_content_type, Fetcher, PlainFetcher, RawResponse,
    STATUS_TRANSPORT_FAILURE,
};
pub use interactive::{
    merge_links, normalize_option_text, page_links, InteractiveLinkExtractor,
};
pub use parser::{
    extract_links, extract_page, extract_text, extract_title, DefaultLinkExtractor, ScrapedPage,
};
pub use rendered::RenderedFetcher;
pub use report::{CrawlOutcome, CrawlReport, CrawlStats};
pub use visited::VisitedSet;

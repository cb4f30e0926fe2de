//! HTML parser for turning fetched responses into pages
//!
//! This module handles parsing HTML content to extract:
//! - Visible text (script, style and other non-rendered content removed)
//! - Page title
//! - Links to follow (from `<a>` and `<area>` tags)
//!
//! Parsing is best-effort: malformed markup never produces an error, it just
//! yields less text and fewer links.

use crate::crawler::callbacks::LinkExtractor;
use crate::crawler::fetcher::RawResponse;
use crate::url::resolve_link;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use scraper::{Html, Node, Selector};
use url::Url;

/// Elements whose text is never rendered
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// A fetched page, ready for the data handler and link extraction
#[derive(Debug)]
pub struct ScrapedPage {
    /// The URL that was visited (normalized)
    pub url: Url,

    /// URL of the final response after redirects
    pub final_url: Url,

    /// Remaining link hops allowed below this page
    pub depth: u32,

    /// Visible text, whitespace collapsed
    pub text: String,

    /// Contents of the `<title>` element
    pub title: Option<String>,

    /// Parsed document, available to custom link extractors
    pub document: Html,

    /// HTTP status code (0 when no response was received)
    pub status: u16,

    /// True if the fetch succeeded
    pub ok: bool,

    /// Response headers
    pub headers: HeaderMap,

    /// Parsed `Last-Modified` header
    pub last_modified: Option<DateTime<Utc>>,

    /// Links found by rendered page interaction, absolute and in discovery order
    pub discovered_links: Vec<String>,
}

/// Builds a [`ScrapedPage`] from a raw response
///
/// # Arguments
///
/// * `raw` - The fetch result
/// * `url` - The URL that was visited
/// * `depth` - Remaining link hops at this page
///
/// # Example
///
/// ```
/// use url::Url;
/// use webtrawl::crawler::{extract_page, RawResponse};
///
/// let url = Url::parse("https://example.com/").unwrap();
/// let mut raw = RawResponse::failure(&url, "unused");
/// raw.ok = true;
/// raw.status = 200;
/// raw.body = "<html><head><title>Hi</title></head><body><p>Hello   world</p></body></html>".into();
///
/// let page = extract_page(raw, &url, 1);
/// assert_eq!(page.title.as_deref(), Some("Hi"));
/// assert_eq!(page.text, "HiHello world");
/// ```
pub fn extract_page(raw: RawResponse, url: &Url, depth: u32) -> ScrapedPage {
    let last_modified = raw.last_modified();

    let document = if raw.body.trim().is_empty() || !raw.is_html() {
        Html::new_document()
    } else {
        Html::parse_document(&raw.body)
    };

    let text = extract_text(&document);
    let title = extract_title(&document);

    ScrapedPage {
        url: url.clone(),
        final_url: raw.final_url,
        depth,
        text,
        title,
        document,
        status: raw.status,
        ok: raw.ok,
        headers: raw.headers,
        last_modified,
        discovered_links: raw.discovered_links,
    }
}

/// Extracts visible text from the document
///
/// Text nodes are concatenated in document order, runs of whitespace collapse
/// to a single space and both ends are trimmed.
pub fn extract_text(document: &Html) -> String {
    let mut text = String::new();

    for node in document.tree.root().descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => HIDDEN_ELEMENTS.contains(&element.name()),
            _ => false,
        });

        if !hidden {
            text.push_str(fragment);
        }
    }

    collapse_whitespace(&text)
}

/// Extracts the page title from the HTML document
pub fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collects every link on a page, in document order
///
/// Hrefs are resolved against the page's `<base href>` when present, otherwise
/// against the final response URL. Only http(s) links are kept. Duplicates are
/// kept too; deduplication is the crawler's job.
pub fn extract_links(page: &ScrapedPage) -> Vec<String> {
    let base = base_url(&page.document, &page.final_url);
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href], area[href]") {
        for element in page.document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, &base) {
                    links.push(absolute_url.to_string());
                }
            }
        }
    }

    links
}

fn base_url(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Link extraction used when the caller does not supply one
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLinkExtractor;

impl LinkExtractor for DefaultLinkExtractor {
    fn extract_links(&mut self, page: &ScrapedPage) -> anyhow::Result<Vec<String>> {
        Ok(extract_links(page))
    }
}

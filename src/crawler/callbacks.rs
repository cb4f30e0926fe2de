//! Caller hooks invoked by the crawler
//!
//! Three hooks let a caller steer a crawl:
//! - [`DataHandler`] receives every fetched page and can prune its subtree
//! - [`StopHandler`] is consulted before every fetch and can abort the crawl
//! - [`LinkExtractor`] replaces the default link discovery
//!
//! Each hook is a trait with a blanket implementation for closures of the
//! matching shape. Closures passed straight to a generic parameter often fail
//! to infer a signature that works for every borrow, so [`handler_fn`],
//! [`stop_fn`] and [`links_fn`] exist to pin it.

use crate::crawler::parser::ScrapedPage;
use crate::crawler::visited::VisitedSet;

/// Receives every page that passes the staleness filter
pub trait DataHandler {
    /// Handles one page
    ///
    /// Returns `Ok(false)` to skip this page's children. An error aborts the
    /// whole crawl.
    fn handle(&mut self, page: &ScrapedPage) -> anyhow::Result<bool>;
}

/// Closures receive `(text, url, status, ok)`
impl<F> DataHandler for F
where
    F: FnMut(&str, &str, u16, bool) -> anyhow::Result<bool>,
{
    fn handle(&mut self, page: &ScrapedPage) -> anyhow::Result<bool> {
        self(&page.text, page.url.as_str(), page.status, page.ok)
    }
}

/// Decides, before each fetch, whether the whole crawl should end
pub trait StopHandler {
    /// Returns `Ok(true)` to abort the crawl before `url` is fetched
    fn should_stop(&mut self, url: &str, depth: u32, visited: &VisitedSet)
        -> anyhow::Result<bool>;
}

impl<F> StopHandler for F
where
    F: FnMut(&str, u32, &VisitedSet) -> anyhow::Result<bool>,
{
    fn should_stop(
        &mut self,
        url: &str,
        depth: u32,
        visited: &VisitedSet,
    ) -> anyhow::Result<bool> {
        self(url, depth, visited)
    }
}

/// Produces candidate links for a page
///
/// Returned links may be relative to nothing in particular; the crawler only
/// follows those that normalize to absolute http(s) URLs.
pub trait LinkExtractor {
    fn extract_links(&mut self, page: &ScrapedPage) -> anyhow::Result<Vec<String>>;
}

impl<F> LinkExtractor for F
where
    F: FnMut(&ScrapedPage) -> anyhow::Result<Vec<String>>,
{
    fn extract_links(&mut self, page: &ScrapedPage) -> anyhow::Result<Vec<String>> {
        self(page)
    }
}

/// Pins a closure to the [`DataHandler`] signature
///
/// # Example
///
/// ```
/// use webtrawl::handler_fn;
///
/// let mut pages = Vec::new();
/// let handler = handler_fn(|text, url, _status, ok| {
///     if ok {
///         pages.push((url.to_string(), text.len()));
///     }
///     Ok(true)
/// });
/// # drop(handler);
/// ```
pub fn handler_fn<F>(f: F) -> F
where
    F: FnMut(&str, &str, u16, bool) -> anyhow::Result<bool>,
{
    f
}

/// Pins a closure to the [`StopHandler`] signature
pub fn stop_fn<F>(f: F) -> F
where
    F: FnMut(&str, u32, &VisitedSet) -> anyhow::Result<bool>,
{
    f
}

/// Pins a closure to the [`LinkExtractor`] signature
pub fn links_fn<F>(f: F) -> F
where
    F: FnMut(&ScrapedPage) -> anyhow::Result<Vec<String>>,
{
    f
}

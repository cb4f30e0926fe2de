//! Crawl engine - depth-first traversal orchestration
//!
//! This module contains the main visit loop that coordinates:
//! - Visited-set bookkeeping and early termination
//! - Fetch pacing
//! - Fetching, extraction and the staleness gate
//! - Link expansion through the URL filter
//!
//! Traversal uses an explicit stack of `(url, depth)` frames rather than
//! recursion, so very deep crawls cannot exhaust the call stack. Children are
//! pushed in reverse so siblings are visited left to right, exactly as a
//! recursive depth-first walk would visit them.

use crate::config::{validate_crawl_config, CrawlConfig, FetchStrategy};
use crate::crawler::callbacks::{DataHandler, LinkExtractor, StopHandler};
use crate::crawler::fetcher::{Fetcher, PlainFetcher, RawResponse};
use crate::crawler::parser::{extract_page, DefaultLinkExtractor, ScrapedPage};
use crate::crawler::rendered::RenderedFetcher;
use crate::crawler::report::{CrawlOutcome, CrawlReport, CrawlStats};
use crate::crawler::visited::VisitedSet;
use crate::filter::FilterPipeline;
use crate::url::normalize_url;
use crate::{CrawlError, Hook, Result};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// What the engine does after visiting one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitControl {
    /// Visit these children next, in order
    Continue(Vec<Url>),

    /// Skip this node's children; the rest of the crawl continues
    PruneSubtree,

    /// End the whole crawl now
    AbortAll,
}

/// Enforces the quiet period between one fetch finishing and the next starting
///
/// The first fetch is never delayed.
#[derive(Debug)]
struct Pacer {
    delay: Duration,
    last_done: Option<Instant>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_done: None,
        }
    }

    async fn wait(&self) {
        if let Some(last) = self.last_done {
            let ready_at = last + self.delay;
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!("Waiting {:?} before next fetch", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }

    /// Marks the end of a fetch; the next delay counts from here
    fn done(&mut self) {
        self.last_done = Some(Instant::now());
    }
}

/// State scoped to one crawl invocation
struct Run {
    pacer: Pacer,
    stats: CrawlStats,
    started: Instant,
}

/// A configured crawler
///
/// The crawler owns its fetch backend and hooks; every call to
/// [`Crawler::crawl`] starts from the root with a fresh visited set.
pub struct Crawler {
    config: CrawlConfig,
    root: Url,
    fetcher: Box<dyn Fetcher>,
    filters: FilterPipeline,
    link_extractor: Box<dyn LinkExtractor + Send>,
    stop_handler: Option<Box<dyn StopHandler + Send>>,
}

impl Crawler {
    /// Creates a crawler using the fetch strategy selected by `config`
    ///
    /// The configuration is validated first. For rendered crawls the browser
    /// is launched here, so launch failures surface before any fetch.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to crawl
    /// * `Err(CrawlError)` - Invalid configuration or the fetcher could not start
    pub async fn new(config: CrawlConfig) -> Result<Self> {
        validate_crawl_config(&config)?;

        let fetcher: Box<dyn Fetcher> = match config.strategy() {
            FetchStrategy::Plain => Box::new(PlainFetcher::new(&config)?),
            FetchStrategy::Rendered => Box::new(RenderedFetcher::launch(&config).await?),
        };

        Self::with_fetcher(config, fetcher)
    }

    /// Creates a crawler around an existing fetch backend
    pub fn with_fetcher(config: CrawlConfig, fetcher: Box<dyn Fetcher>) -> Result<Self> {
        validate_crawl_config(&config)?;

        let root = normalize_url(&config.url)?;
        let filters = FilterPipeline::from_config(&config, &root)?;

        Ok(Self {
            config,
            root,
            fetcher,
            filters,
            link_extractor: Box::new(DefaultLinkExtractor),
            stop_handler: None,
        })
    }

    /// Installs a stop handler, consulted before every fetch
    pub fn stop_handler<S>(mut self, handler: S) -> Self
    where
        S: StopHandler + Send + 'static,
    {
        self.stop_handler = Some(Box::new(handler));
        self
    }

    /// Replaces the default link extractor
    pub fn link_extractor<L>(mut self, extractor: L) -> Self
    where
        L: LinkExtractor + Send + 'static,
    {
        self.link_extractor = Box::new(extractor);
        self
    }

    /// Crawls from the root with a fresh visited set
    pub async fn crawl<H>(&mut self, handler: &mut H) -> Result<CrawlReport>
    where
        H: DataHandler + ?Sized,
    {
        let mut visited = VisitedSet::new();
        self.crawl_with_visited(handler, &mut visited).await
    }

    /// Crawls from the root, recording visits in a caller-owned set
    ///
    /// URLs already in `visited` are never fetched. The set holds every
    /// claimed URL when this returns, including on error.
    pub async fn crawl_with_visited<H>(
        &mut self,
        handler: &mut H,
        visited: &mut VisitedSet,
    ) -> Result<CrawlReport>
    where
        H: DataHandler + ?Sized,
    {
        let mut run = Run {
            pacer: Pacer::new(self.config.delay()),
            stats: CrawlStats::default(),
            started: Instant::now(),
        };

        tracing::info!(
            "Starting {} crawl of {} (depth {})",
            self.fetcher.strategy(),
            self.root,
            self.config.depth
        );

        let mut stack = vec![(self.root.clone(), self.config.depth)];
        let mut outcome = CrawlOutcome::Completed;

        while let Some((url, depth)) = stack.pop() {
            match self.visit(&url, depth, visited, handler, &mut run).await? {
                VisitControl::Continue(children) => {
                    let child_depth = depth.saturating_sub(1);
                    stack.extend(children.into_iter().rev().map(|child| (child, child_depth)));
                }
                VisitControl::PruneSubtree => {}
                VisitControl::AbortAll => {
                    outcome = CrawlOutcome::Aborted {
                        url: url.to_string(),
                        depth,
                    };
                    break;
                }
            }
        }

        run.stats.elapsed = run.started.elapsed();

        tracing::info!(
            "Crawl {}: {} pages fetched in {:?}",
            match outcome {
                CrawlOutcome::Completed => "completed",
                CrawlOutcome::Aborted { .. } => "aborted",
            },
            run.stats.pages_fetched,
            run.stats.elapsed
        );

        Ok(CrawlReport {
            outcome,
            stats: run.stats,
            visited_count: visited.len(),
        })
    }

    /// Releases the fetch backend (closes the browser for rendered crawls)
    pub async fn shutdown(&self) {
        self.fetcher.close().await;
    }

    /// Processes a single node
    ///
    /// This method:
    /// 1. Skips URLs that were already visited
    /// 2. Consults the stop handler
    /// 3. Claims the URL in the visited set
    /// 4. Waits out the fetch delay and fetches
    /// 5. Hands off to [`Crawler::process_page`]
    async fn visit<H>(
        &mut self,
        url: &Url,
        depth: u32,
        visited: &mut VisitedSet,
        handler: &mut H,
        run: &mut Run,
    ) -> Result<VisitControl>
    where
        H: DataHandler + ?Sized,
    {
        if visited.contains(url.as_str()) {
            tracing::trace!("Already visited {}", url);
            return Ok(VisitControl::PruneSubtree);
        }

        if let Some(stop) = self.stop_handler.as_mut() {
            let stop_now = stop
                .should_stop(url.as_str(), depth, visited)
                .map_err(|source| CrawlError::Callback {
                    hook: Hook::StopHandler,
                    source,
                })?;
            if stop_now {
                tracing::info!("Stop handler ended the crawl before {}", url);
                return Ok(VisitControl::AbortAll);
            }
        }

        visited.insert(url);

        run.pacer.wait().await;
        let raw = self.fetcher.fetch(url).await;
        run.pacer.done();
        run.stats.pages_fetched += 1;

        if !raw.ok {
            run.stats.fetch_failures += 1;
            tracing::warn!(
                "Failed to fetch {}: {}",
                url,
                raw.error.as_deref().unwrap_or("unknown error")
            );
        }

        if run.stats.pages_fetched % 10 == 0 {
            let elapsed = run.started.elapsed();
            tracing::info!(
                "Progress: {} pages fetched, {} visited, {:.2} pages/sec",
                run.stats.pages_fetched,
                visited.len(),
                run.stats.pages_fetched as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
            );
        }

        self.process_page(raw, url, depth, visited, handler, &mut run.stats)
    }

    /// Extracts a fetched page, reports it and collects its children
    ///
    /// Runs without awaiting so the parsed document never lives across a
    /// suspension point.
    fn process_page<H>(
        &mut self,
        raw: RawResponse,
        url: &Url,
        depth: u32,
        visited: &VisitedSet,
        handler: &mut H,
        stats: &mut CrawlStats,
    ) -> Result<VisitControl>
    where
        H: DataHandler + ?Sized,
    {
        let page = extract_page(raw, url, depth);

        tracing::info!("Crawled {} (status {}, depth {})", url, page.status, depth);

        if page.ok && self.filters.staleness.is_stale(page.last_modified) {
            stats.stale_pages += 1;
            tracing::debug!(
                "Not reporting stale page {} (last modified {:?})",
                url,
                page.last_modified
            );
        } else {
            stats.handler_calls += 1;
            let keep_going = handler
                .handle(&page)
                .map_err(|source| CrawlError::Callback {
                    hook: Hook::DataHandler,
                    source,
                })?;

            if !keep_going {
                stats.pruned_pages += 1;
                tracing::debug!("Data handler pruned the subtree below {}", url);
                return Ok(VisitControl::PruneSubtree);
            }
        }

        if depth == 0 || !page.ok {
            return Ok(VisitControl::Continue(Vec::new()));
        }

        let children = self.expand(&page, visited, stats)?;
        Ok(VisitControl::Continue(children))
    }

    /// Turns a page's candidate links into the children to visit
    fn expand(
        &mut self,
        page: &ScrapedPage,
        visited: &VisitedSet,
        stats: &mut CrawlStats,
    ) -> Result<Vec<Url>> {
        let candidates = self
            .link_extractor
            .extract_links(page)
            .map_err(|source| CrawlError::Callback {
                hook: Hook::LinkExtractor,
                source,
            })?;

        let mut children = Vec::new();

        for link in candidates {
            stats.links_discovered += 1;

            let url = match normalize_url(&link) {
                Ok(url) => url,
                Err(e) => {
                    stats.links_filtered += 1;
                    tracing::debug!("Dropping link {}: {}", link, e);
                    continue;
                }
            };

            if !self.filters.links.matches(&url) {
                stats.links_filtered += 1;
                tracing::debug!("Link {} does not match the URL filter", url);
                continue;
            }

            if visited.contains(url.as_str()) {
                continue;
            }

            children.push(url);
        }

        Ok(children)
    }
}

/// Crawls a site in one call
///
/// Builds a [`Crawler`] for `config`, runs it with `handler` and the optional
/// stop handler and link extractor, and releases the fetch backend afterwards
/// whether or not the crawl succeeded. Without a link extractor the default
/// one is used.
///
/// # Example
///
/// ```no_run
/// use webtrawl::{handler_fn, scrape_website, CrawlConfig};
///
/// # async fn run() -> webtrawl::Result<()> {
/// let mut config = CrawlConfig::new("https://example.com/");
/// config.depth = 1;
///
/// let mut handler = handler_fn(|text, url, status, _ok| {
///     println!("{} [{}]: {} chars", url, status, text.len());
///     Ok(true)
/// });
///
/// let report = scrape_website(config, &mut handler, None, None).await?;
/// println!("Visited {} pages", report.visited_count);
/// # Ok(())
/// # }
/// ```
pub async fn scrape_website<H>(
    config: CrawlConfig,
    handler: &mut H,
    stop: Option<Box<dyn StopHandler + Send>>,
    link_extractor: Option<Box<dyn LinkExtractor + Send>>,
) -> Result<CrawlReport>
where
    H: DataHandler + ?Sized,
{
    let mut crawler = Crawler::new(config).await?;
    crawler.stop_handler = stop;
    if let Some(extractor) = link_extractor {
        crawler.link_extractor = extractor;
    }

    let result = crawler.crawl(handler).await;
    crawler.shutdown().await;
    result
}

use std::time::Duration;

/// How a crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Every reachable node within the depth limit was processed
    Completed,

    /// The stop handler ended the crawl before fetching `url`
    Aborted { url: String, depth: u32 },
}

/// Counters collected while crawling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Fetches performed (successful or not)
    pub pages_fetched: u64,

    /// Fetches that did not produce a 2xx response
    pub fetch_failures: u64,

    /// Pages handed to the data handler
    pub handler_calls: u64,

    /// Pages withheld from the data handler as stale
    pub stale_pages: u64,

    /// Pages whose children were skipped at the data handler's request
    pub pruned_pages: u64,

    /// Candidate links returned by the link extractor
    pub links_discovered: u64,

    /// Candidates dropped as invalid or by the URL filter
    pub links_filtered: u64,

    /// Wall-clock time spent crawling
    pub elapsed: Duration,
}

/// Summary returned by a crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub outcome: CrawlOutcome,
    pub stats: CrawlStats,

    /// Size of the visited set when the crawl ended
    pub visited_count: usize,
}

impl CrawlReport {
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, CrawlOutcome::Aborted { .. })
    }

    /// Pages fetched per second over the whole crawl
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.stats.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.pages_fetched as f64 / secs
        } else {
            0.0
        }
    }
}

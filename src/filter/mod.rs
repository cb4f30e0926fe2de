//! Page and link filters
//!
//! Two independent predicates consulted by the crawler:
//! - [`StalenessFilter`] decides whether a fetched page is worth reporting
//! - [`UrlFilter`] decides whether a discovered link is worth following

mod pattern;
mod staleness;

pub use pattern::UrlFilter;
pub use staleness::{last_modified, parse_http_date, StalenessFilter};

use crate::config::CrawlConfig;
use crate::ConfigError;
use url::Url;

/// Both filters configured for one crawl
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    pub staleness: StalenessFilter,
    pub links: UrlFilter,
}

impl FilterPipeline {
    /// Builds the filters described by `config` for a crawl rooted at `root`
    pub fn from_config(config: &CrawlConfig, root: &Url) -> Result<Self, ConfigError> {
        let mut links = UrlFilter::new(config.url_pattern.as_deref())?;
        if config.same_host_only {
            links = links.restrict_to_host_of(root);
        }

        Ok(Self {
            staleness: StalenessFilter::new(config.since),
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_from_config() {
        let root = Url::parse("https://example.com/").unwrap();
        let mut config = CrawlConfig::new(root.as_str());
        config.url_pattern = Some(r"https://example\.com/a/".to_string());
        config.since = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let pipeline = FilterPipeline::from_config(&config, &root).unwrap();

        assert!(pipeline.links.matches(&Url::parse("https://example.com/a/1").unwrap()));
        assert!(!pipeline.links.matches(&Url::parse("https://example.com/b/1").unwrap()));
        assert!(pipeline.staleness.threshold().is_some());
    }

    #[test]
    fn test_from_config_same_host_only() {
        let root = Url::parse("https://example.com/").unwrap();
        let mut config = CrawlConfig::new(root.as_str());
        config.same_host_only = true;

        let pipeline = FilterPipeline::from_config(&config, &root).unwrap();

        assert!(pipeline.links.matches(&Url::parse("https://example.com/x").unwrap()));
        assert!(!pipeline.links.matches(&Url::parse("https://other.com/x").unwrap()));
    }
}

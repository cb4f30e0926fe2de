use crate::config::compile_url_pattern;
use crate::url::same_host;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Decides which discovered links are eligible for traversal
///
/// Only ever applied to candidate links, never to the root URL.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    pattern: Option<Regex>,
    host: Option<Url>,
}

impl UrlFilter {
    /// Builds a filter from an optional pattern
    ///
    /// The pattern must match at the start of the URL.
    pub fn new(pattern: Option<&str>) -> Result<Self, ConfigError> {
        let pattern = pattern.map(compile_url_pattern).transpose()?;
        Ok(Self {
            pattern,
            host: None,
        })
    }

    /// Additionally restricts links to the host of `root`
    pub fn restrict_to_host_of(mut self, root: &Url) -> Self {
        self.host = Some(root.clone());
        self
    }

    /// Returns true if the link may be followed
    pub fn matches(&self, url: &Url) -> bool {
        if let Some(root) = &self.host {
            if !same_host(root, url) {
                return false;
            }
        }

        match &self.pattern {
            Some(re) => re.is_match(url.as_str()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_no_pattern_passes_everything() {
        let filter = UrlFilter::new(None).unwrap();
        assert!(filter.matches(&url("https://example.com/")));
        assert!(filter.matches(&url("https://elsewhere.org/x?y=1")));
    }

    #[test]
    fn test_pattern_filters_links() {
        let filter = UrlFilter::new(Some(r"https://news\.example\.com/articles/[^/]+/?$")).unwrap();
        assert!(filter.matches(&url("https://news.example.com/articles/abc123")));
        assert!(filter.matches(&url("https://news.example.com/articles/abc123/")));
        assert!(!filter.matches(&url("https://news.example.com/")));
        assert!(!filter.matches(&url("https://news.example.com/articles/abc/comments")));
    }

    #[test]
    fn test_pattern_must_match_from_start() {
        let filter = UrlFilter::new(Some("articles")).unwrap();
        assert!(!filter.matches(&url("https://example.com/articles/1")));

        let filter = UrlFilter::new(Some(".*articles")).unwrap();
        assert!(filter.matches(&url("https://example.com/articles/1")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            UrlFilter::new(Some("(unclosed")),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_same_host_restriction() {
        let filter = UrlFilter::new(None)
            .unwrap()
            .restrict_to_host_of(&url("https://example.com/"));
        assert!(filter.matches(&url("https://example.com/about")));
        assert!(filter.matches(&url("http://example.com/about")));
        assert!(!filter.matches(&url("https://other.com/about")));
    }

    #[test]
    fn test_same_host_combined_with_pattern() {
        let filter = UrlFilter::new(Some(r".*/docs/"))
            .unwrap()
            .restrict_to_host_of(&url("https://example.com/"));
        assert!(filter.matches(&url("https://example.com/docs/intro")));
        assert!(!filter.matches(&url("https://other.com/docs/intro")));
        assert!(!filter.matches(&url("https://example.com/blog/")));
    }
}

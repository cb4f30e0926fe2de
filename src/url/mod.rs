//! URL handling module for webtrawl
//!
//! This module provides URL normalization for the visited set, resolution of
//! link hrefs against a page URL, and host comparison.

mod normalize;
mod resolve;

use ::url::Url;

// Re-export main functions
pub use normalize::normalize_url;
pub use resolve::resolve_link;

/// Extracts the lowercase host from a URL
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs point at the same host
///
/// Scheme and port are ignored, so `http://example.com/` and
/// `https://example.com:8443/` share a host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use webtrawl::url::same_host;
///
/// let a = Url::parse("https://example.com/a").unwrap();
/// let b = Url::parse("http://EXAMPLE.com/b").unwrap();
/// let c = Url::parse("https://blog.example.com/").unwrap();
/// assert!(same_host(&a, &b));
/// assert!(!same_host(&a, &c));
/// ```
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_host(a), extract_host(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        let url = Url::parse("https://Sub.Example.com/path").unwrap();
        assert_eq!(extract_host(&url), Some("sub.example.com".to_string()));
    }

    #[test]
    fn test_same_host_ignores_port_and_scheme() {
        let a = Url::parse("http://127.0.0.1:4000/").unwrap();
        let b = Url::parse("https://127.0.0.1:5000/x").unwrap();
        assert!(same_host(&a, &b));
    }

    #[test]
    fn test_subdomain_is_different_host() {
        let a = Url::parse("https://example.com/").unwrap();
        let b = Url::parse("https://www.example.com/").unwrap();
        assert!(!same_host(&a, &b));
    }
}

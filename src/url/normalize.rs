use crate::UrlError;
use url::Url;

/// Normalizes a URL into the form used for visited-set bookkeeping
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require the http or https scheme
/// 3. Require a host
/// 4. Remove the fragment (everything after #)
///
/// Parsing already lowercases the scheme and host, drops default ports and
/// resolves dot segments. Nothing else is rewritten: two URLs that differ in
/// path, query or trailing slash are different pages.
///
/// # Examples
///
/// ```
/// use webtrawl::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/a/./b#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/b");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Validates the scheme and host of a parsed URL and drops its fragment
fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    Ok(url)
}

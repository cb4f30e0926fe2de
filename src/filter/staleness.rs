use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, LAST_MODIFIED};

/// Decides whether a page is too old to report
///
/// A page is stale when its `Last-Modified` header is strictly older than the
/// threshold. Pages without the header, or with a header that does not parse,
/// are never stale.
#[derive(Debug, Clone, Default)]
pub struct StalenessFilter {
    since: Option<DateTime<Utc>>,
}

impl StalenessFilter {
    pub fn new(since: Option<DateTime<Utc>>) -> Self {
        Self { since }
    }

    pub fn threshold(&self) -> Option<DateTime<Utc>> {
        self.since
    }

    /// Returns true if the modification time predates the threshold
    pub fn is_stale(&self, last_modified: Option<DateTime<Utc>>) -> bool {
        match (self.since, last_modified) {
            (Some(since), Some(modified)) => modified < since,
            _ => false,
        }
    }
}

/// Reads and parses the `Last-Modified` header
pub fn last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
}

/// Parses an HTTP date
///
/// Accepts the three formats HTTP/1.1 allows (IMF-fixdate, RFC 850 and
/// asctime) plus RFC 3339, which some servers emit anyway.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // RFC 850: Sunday, 06-Nov-94 08:49:37 GMT
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(dt.and_utc());
    }

    // asctime: Sun Nov  6 08:49:37 1994
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y") {
        return Some(dt.and_utc());
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

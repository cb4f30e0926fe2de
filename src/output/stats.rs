//! Crawl statistics display
//!
//! This module formats the counters collected by a crawl for the terminal.

use crate::crawler::{CrawlOutcome, CrawlReport};
use std::fmt::Write;

/// Renders a report as a human-readable summary
pub fn format_statistics(report: &CrawlReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "=== Crawl Statistics ===\n");

    let _ = writeln!(out, "Overview:");
    match &report.outcome {
        CrawlOutcome::Completed => {
            let _ = writeln!(out, "  Outcome: completed");
        }
        CrawlOutcome::Aborted { url, depth } => {
            let _ = writeln!(out, "  Outcome: aborted before {} (depth {})", url, depth);
        }
    }
    let _ = writeln!(out, "  URLs visited: {}", report.visited_count);
    let _ = writeln!(out, "  Pages fetched: {}", stats.pages_fetched);
    let _ = writeln!(
        out,
        "  Elapsed: {:.1}s ({:.2} pages/sec)",
        stats.elapsed.as_secs_f64(),
        report.pages_per_second()
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages:");
    let _ = writeln!(out, "  Reported: {}", stats.handler_calls);
    let _ = writeln!(out, "  Stale (not reported): {}", stats.stale_pages);
    let _ = writeln!(out, "  Pruned by handler: {}", stats.pruned_pages);
    let _ = writeln!(out, "  Fetch failures: {}", stats.fetch_failures);
    let _ = writeln!(out);

    let _ = writeln!(out, "Links:");
    let _ = writeln!(out, "  Discovered: {}", stats.links_discovered);
    let _ = writeln!(out, "  Filtered out: {}", stats.links_filtered);
    let _ = writeln!(out);

    let succeeded = stats.pages_fetched - stats.fetch_failures;
    let success_rate = if stats.pages_fetched > 0 {
        (succeeded as f64 / stats.pages_fetched as f64) * 100.0
    } else {
        0.0
    };

    let _ = write!(
        out,
        "Success Rate: {:.1}% ({} / {} pages fetched successfully)",
        success_rate, succeeded, stats.pages_fetched
    );

    out
}

/// Prints statistics to stderr
///
/// Stdout is reserved for page records.
pub fn print_statistics(report: &CrawlReport) {
    eprintln!("{}", format_statistics(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlStats;
    use std::time::Duration;

    #[test]
    fn test_format_statistics() {
        let report = CrawlReport {
            outcome: CrawlOutcome::Completed,
            stats: CrawlStats {
                pages_fetched: 4,
                fetch_failures: 1,
                handler_calls: 3,
                links_discovered: 12,
                links_filtered: 5,
                elapsed: Duration::from_secs(2),
                ..Default::default()
            },
            visited_count: 4,
        };

        let text = format_statistics(&report);

        assert!(text.contains("Outcome: completed"));
        assert!(text.contains("Pages fetched: 4"));
        assert!(text.contains("Discovered: 12"));
        assert!(text.contains("Success Rate: 75.0% (3 / 4 pages fetched successfully)"));
    }

    #[test]
    fn test_format_aborted() {
        let report = CrawlReport {
            outcome: CrawlOutcome::Aborted {
                url: "https://example.com/x".to_string(),
                depth: 1,
            },
            stats: CrawlStats::default(),
            visited_count: 0,
        };

        let text = format_statistics(&report);

        assert!(text.contains("aborted before https://example.com/x (depth 1)"));
        assert!(text.contains("Success Rate: 0.0%"));
    }
}

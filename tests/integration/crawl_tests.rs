//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run real crawls
//! against them. Most use the plain HTTP fetcher; the rendered-fetch tests
//! need a local Chromium and are ignored by default
//! (`cargo test -- --ignored` runs them).

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use webtrawl::output::{JsonlSink, PageRecord};
use webtrawl::{
    handler_fn, links_fn, scrape_website, stop_fn, CrawlConfig, CrawlOutcome, Crawler,
    InteractiveLinkExtractor, WaitUntil,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A page handed to the data handler
#[derive(Debug, Clone, PartialEq)]
struct Seen {
    url: String,
    text: String,
    status: u16,
    ok: bool,
}

/// Creates a test configuration rooted at `root`
fn test_config(root: &str, depth: u32) -> CrawlConfig {
    let mut config = CrawlConfig::new(root);
    config.depth = depth;
    config.delay_ms = 0;
    config.request_timeout_secs = 5;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

/// Runs a crawl and returns every page the data handler saw, in order
async fn crawl_collect(config: CrawlConfig) -> (Vec<Seen>, webtrawl::CrawlReport) {
    let mut seen = Vec::new();
    let mut handler = handler_fn(|text, url, status, ok| {
        seen.push(Seen {
            url: url.to_string(),
            text: text.to_string(),
            status,
            ok,
        });
        Ok(true)
    });

    let mut crawler = Crawler::new(config).await.expect("Failed to create crawler");
    let report = crawler.crawl(&mut handler).await.expect("Crawl failed");
    crawler.shutdown().await;
    drop(handler);

    (seen, report)
}

#[tokio::test]
async fn test_full_crawl_respects_depth() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<a href="/page1">Page 1</a> <a href="/page2">Page 2</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/page1", html(r#"<p>Content 1</p><a href="/page3">deeper</a>"#), 1).await;
    mount_page(&server, "/page2", html("<p>Content 2</p>"), 1).await;
    mount_page(&server, "/page3", html("<p>Too deep</p>"), 0).await;

    let (seen, report) = crawl_collect(test_config(&format!("{}/", base), 1)).await;

    let urls: Vec<_> = seen.iter().map(|s| s.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base),
        ]
    );
    assert_eq!(seen[1].text, "TestContent 1deeper");
    assert!(seen.iter().all(|s| s.ok && s.status == 200));
    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.stats.pages_fetched, 3);
}

#[tokio::test]
async fn test_url_pattern_and_stale_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<a href="/docs/old">Old</a> <a href="/blog/post">Blog</a>"#),
        1,
    )
    .await;
    mount_page(
        &server,
        "/docs/old",
        html(r#"<a href="/docs/new">New</a>"#)
            .insert_header("Last-Modified", "Mon, 01 Jan 2018 00:00:00 GMT"),
        1,
    )
    .await;
    mount_page(&server, "/docs/new", html("<p>Fresh</p>"), 1).await;
    mount_page(&server, "/blog/post", html("<p>Blog</p>"), 0).await;

    let mut config = test_config(&format!("{}/", base), 2);
    config.url_pattern = Some(format!("{}/docs/", regex::escape(&base)));
    config.since = Some("2024-01-01T00:00:00Z".parse().unwrap());

    let (seen, report) = crawl_collect(config).await;

    let urls: Vec<_> = seen.iter().map(|s| s.url.clone()).collect();
    assert_eq!(urls, vec![format!("{}/", base), format!("{}/docs/new", base)]);
    assert_eq!(report.stats.stale_pages, 1);
    assert_eq!(report.stats.pages_fetched, 3);
}

#[tokio::test]
async fn test_error_page_reported_but_not_expanded() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html(r#"<a href="/missing">Missing</a>"#), 1).await;
    mount_page(
        &server,
        "/missing",
        ResponseTemplate::new(404).set_body_raw(
            r#"<html><body>Not found <a href="/elsewhere">x</a></body></html>"#,
            "text/html",
        ),
        1,
    )
    .await;
    mount_page(&server, "/elsewhere", html(""), 0).await;

    let (seen, report) = crawl_collect(test_config(&format!("{}/", base), 3)).await;

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].status, 404);
    assert!(!seen[1].ok);
    assert_eq!(report.stats.fetch_failures, 1);
}

#[tokio::test]
async fn test_unreachable_root_reports_transport_failure() {
    let (seen, report) = crawl_collect(test_config("http://127.0.0.1:1/", 2)).await;

    assert_eq!(
        seen,
        vec![Seen {
            url: "http://127.0.0.1:1/".to_string(),
            text: String::new(),
            status: 0,
            ok: false,
        }]
    );
    assert_eq!(report.outcome, CrawlOutcome::Completed);
}

#[tokio::test]
async fn test_redirect_followed_and_links_resolved_against_final_url() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/start",
        ResponseTemplate::new(301).insert_header("Location", format!("{}/docs/landing", base).as_str()),
        1,
    )
    .await;
    mount_page(&server, "/docs/landing", html(r#"<a href="child">Child</a>"#), 1).await;
    mount_page(&server, "/docs/child", html("<p>Child page</p>"), 1).await;

    let (seen, _) = crawl_collect(test_config(&format!("{}/start", base), 1)).await;

    assert_eq!(seen[0].url, format!("{}/start", base));
    assert!(seen[0].ok);
    assert_eq!(seen[1].url, format!("{}/docs/child", base));
}

#[tokio::test]
async fn test_non_html_content_has_no_text_or_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/report.pdf",
        ResponseTemplate::new(200)
            .set_body_raw(r#"%PDF <a href="/hidden">x</a>"#, "application/pdf"),
        1,
    )
    .await;
    mount_page(&server, "/hidden", html(""), 0).await;

    let (seen, _) = crawl_collect(test_config(&format!("{}/report.pdf", base), 2)).await;

    assert_eq!(seen.len(), 1);
    assert!(seen[0].ok);
    assert_eq!(seen[0].text, "");
}

#[tokio::test]
async fn test_user_agent_sent() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "webtrawl-test/1.0"))
        .respond_with(html("<p>hello</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&format!("{}/", base), 0);
    config.user_agent = "webtrawl-test/1.0".to_string();

    let (seen, _) = crawl_collect(config).await;
    assert!(seen[0].ok);
}

#[tokio::test]
async fn test_stop_handler_limits_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>"#),
        1,
    )
    .await;
    mount_page(&server, "/a", html(""), 1).await;
    mount_page(&server, "/b", html(""), 0).await;
    mount_page(&server, "/c", html(""), 0).await;

    let evaluated = Arc::new(Mutex::new(Vec::new()));
    let log = evaluated.clone();

    let mut crawler = Crawler::new(test_config(&format!("{}/", base), 1))
        .await
        .unwrap()
        .stop_handler(stop_fn(move |url, _, visited| {
            log.lock().unwrap().push(url.to_string());
            Ok(visited.len() >= 2)
        }));

    let mut handler = handler_fn(|_, _, _, _| Ok(true));
    let report = crawler.crawl(&mut handler).await.unwrap();

    assert_eq!(
        report.outcome,
        CrawlOutcome::Aborted {
            url: format!("{}/b", base),
            depth: 0
        }
    );
    assert_eq!(report.visited_count, 2);
    assert_eq!(evaluated.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_scrape_website_writes_jsonl() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html(r#"<p>Home</p><a href="/about">About</a>"#), 1).await;
    mount_page(&server, "/about", html("<p>About us</p>"), 1).await;

    let file = NamedTempFile::new().unwrap();
    let mut sink = JsonlSink::create(file.path()).unwrap();

    let report = scrape_website(test_config(&format!("{}/", base), 1), &mut sink, None, None)
        .await
        .unwrap();
    sink.flush().unwrap();

    assert_eq!(report.visited_count, 2);
    assert_eq!(sink.written(), 2);

    let content = std::fs::read_to_string(file.path()).unwrap();
    let records: Vec<PageRecord> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records[0].source, format!("{}/", base));
    assert_eq!(records[0].depth, 1);
    assert_eq!(records[0].links, vec![format!("{}/about", base)]);
    assert_eq!(records[1].page_content, "TestAbout us");
    assert_eq!(records[1].title.as_deref(), Some("Test"));
    assert_eq!(records[1].depth, 0);
}

#[tokio::test]
async fn test_scrape_website_uses_given_link_extractor() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html(r#"<a href="/listed">Listed</a>"#), 1).await;
    mount_page(&server, "/listed", html(""), 0).await;
    mount_page(&server, "/chosen", html("<p>Chosen</p>"), 1).await;

    let chosen = format!("{}/chosen", base);
    let extractor = links_fn(move |_page| Ok(vec![chosen.clone()]));

    let mut seen = Vec::new();
    let mut handler = handler_fn(|_, url, _, _| {
        seen.push(url.to_string());
        Ok(true)
    });

    let report = scrape_website(
        test_config(&format!("{}/", base), 1),
        &mut handler,
        None,
        Some(Box::new(extractor)),
    )
    .await
    .unwrap();
    drop(handler);

    assert_eq!(seen, vec![format!("{}/", base), format!("{}/chosen", base)]);
    assert_eq!(report.visited_count, 2);
}

fn rendered_config(root: &str, depth: u32, wait_until: WaitUntil) -> CrawlConfig {
    let mut config = test_config(root, depth);
    config.use_rendered_fetch = true;
    config.render.wait_until = wait_until;
    config.render.timeout_ms = 10_000;
    config
}

const SCRIPTED_PAGE: &str = r#"<p>Rendered</p>
<script>document.body.insertAdjacentHTML('beforeend', '<a href="/added">Added</a>')</script>"#;

#[tokio::test]
#[ignore] // Requires browser installation
async fn test_rendered_fetch_reports_document_response() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(SCRIPTED_PAGE).insert_header("Last-Modified", "Mon, 01 Jul 2024 00:00:00 GMT"),
        3,
    )
    .await;

    for wait_until in [
        WaitUntil::Load,
        WaitUntil::DomContentLoaded,
        WaitUntil::NetworkIdle,
    ] {
        let file = NamedTempFile::new().unwrap();
        let mut sink = JsonlSink::create(file.path()).unwrap();

        let report = scrape_website(
            rendered_config(&format!("{}/", base), 0, wait_until),
            &mut sink,
            None,
            None,
        )
        .await
        .expect("Rendered crawl failed");
        sink.flush().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let record: PageRecord = serde_json::from_str(content.trim()).unwrap();

        assert_eq!(report.stats.pages_fetched, 1, "wait until {}", wait_until);
        assert_eq!(record.status_code, 200, "wait until {}", wait_until);
        assert!(record.is_success);
        assert!(record.last_modified.is_some(), "wait until {}", wait_until);
        assert_eq!(record.links, vec![format!("{}/added", base)]);
    }
}

#[tokio::test]
#[ignore] // Requires browser installation
async fn test_rendered_crawl_follows_script_inserted_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", html(SCRIPTED_PAGE), 1).await;
    mount_page(&server, "/added", html("<p>Added by script</p>"), 1).await;

    let (seen, report) =
        crawl_collect(rendered_config(&format!("{}/", base), 1, WaitUntil::Load)).await;

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].url, format!("{}/added", base));
    assert_eq!(seen[1].text, "TestAdded by script");
    assert_eq!(report.outcome, CrawlOutcome::Completed);
}

#[tokio::test]
#[ignore] // Requires browser installation
async fn test_rendered_navigation_timeout_reports_status_zero() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/slow",
        html("<p>Too late</p>").set_delay(Duration::from_secs(5)),
        1,
    )
    .await;

    let mut config = rendered_config(&format!("{}/slow", base), 0, WaitUntil::Load);
    config.render.timeout_ms = 500;

    let (seen, report) = crawl_collect(config).await;

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, 0);
    assert!(!seen[0].ok);
    assert_eq!(report.stats.fetch_failures, 1);
}

#[tokio::test]
#[ignore] // Requires browser installation
async fn test_rendered_pagination_discovers_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Clicking "More" reveals the second batch of items without navigating
    mount_page(
        &server,
        "/list",
        html(
            r#"<ul id="items"><li><a href="/item/1">1</a></li></ul>
            <button id="more" onclick="
                document.getElementById('items').insertAdjacentHTML('beforeend',
                    '<li><a href=&quot;/item/2#detail&quot;>2</a></li>');
                this.disabled = true;">More</button>"#,
        ),
        1,
    )
    .await;
    mount_page(&server, "/item/1", html(""), 1).await;
    mount_page(&server, "/item/2", html(""), 1).await;

    let mut config = rendered_config(&format!("{}/list", base), 1, WaitUntil::Load);
    config.render.interact.pagination.enabled = true;
    config.render.interact.pagination.next_selectors = Vec::new();
    config.render.interact.pagination.name_pattern = Some("^More$".to_string());
    config.render.interact.pagination.settle_ms = 100;

    let file = NamedTempFile::new().unwrap();
    let mut sink = JsonlSink::create(file.path()).unwrap();

    let report = scrape_website(
        config,
        &mut sink,
        None,
        Some(Box::new(InteractiveLinkExtractor)),
    )
    .await
    .unwrap();
    sink.flush().unwrap();

    assert_eq!(report.visited_count, 3);

    let content = std::fs::read_to_string(file.path()).unwrap();
    let first: PageRecord = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(
        first.links,
        vec![format!("{}/item/1", base), format!("{}/item/2", base)]
    );
}

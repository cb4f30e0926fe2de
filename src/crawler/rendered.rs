//! Browser-rendered fetch strategy
//!
//! Drives a chromiumoxide session: each fetch opens a tab, navigates, waits
//! according to the configured [`WaitUntil`] policy and reads back the fully
//! rendered document. The main document's status and headers are captured
//! from `Network.responseReceived` events. When page interaction is enabled
//! it runs on the same tab once the document has been read.
//!
//! One browser is launched per fetcher and fetches are serialized through it;
//! independent crawls should each own their own [`RenderedFetcher`].

use crate::config::{CrawlConfig, FetchStrategy, RenderOptions, WaitUntil};
use crate::crawler::fetcher::{Fetcher, RawResponse};
use crate::crawler::interactive::interact;
use crate::CrawlError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page;
use futures::{FutureExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

/// How often readiness conditions are polled
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Quiet period after which the network counts as idle
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);

/// A running browser and its CDP event loop
///
/// The handler task is aborted on drop so it never outlives the browser.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Rendered (headless browser) fetch strategy
pub struct RenderedFetcher {
    options: RenderOptions,
    session: Mutex<Option<BrowserSession>>,
}

impl RenderedFetcher {
    /// Launches a browser for the given crawl configuration
    ///
    /// Launching happens up front so a missing or broken browser is reported
    /// before any page is fetched.
    pub async fn launch(config: &CrawlConfig) -> Result<Self, CrawlError> {
        let options = config.render.clone();

        let mut builder = BrowserConfig::builder()
            .request_timeout(options.timeout())
            .window_size(1920, 1080)
            .arg(format!("--user-agent={}", config.user_agent))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--mute-audio");

        if !options.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &options.chrome_executable {
            builder = builder.chrome_executable(path.clone());
        }

        let browser_config = builder
            .build()
            .map_err(|e| CrawlError::Browser(format!("Failed to build browser config: {}", e)))?;

        tracing::info!(
            "Launching browser (headless: {}, wait until: {})",
            options.headless,
            options.wait_until
        );

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CrawlError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {:?}", e);
                }
            }
            tracing::debug!("Browser event handler task completed");
        });

        Ok(Self {
            options,
            session: Mutex::new(Some(BrowserSession { browser, handler })),
        })
    }

    async fn render(&self, browser: &Browser, url: &Url) -> RawResponse {
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => return RawResponse::failure(url, format!("Failed to open tab: {}", e)),
        };

        let mut raw = match tokio::time::timeout(self.options.timeout(), self.navigate(&page, url))
            .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => RawResponse::failure(url, e),
            Err(_) => RawResponse::failure(
                url,
                format!("Navigation timeout after {}ms", self.options.timeout_ms),
            ),
        };

        if raw.ok && raw.is_html() && self.options.interact.applies_to(&raw.final_url) {
            raw.discovered_links = interact(&page, &self.options.interact).await;
            tracing::debug!(
                "Interaction on {} found {} links",
                url,
                raw.discovered_links.len()
            );
        }

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close tab for {}: {}", url, e);
        }

        raw
    }

    async fn navigate(&self, page: &Page, url: &Url) -> Result<RawResponse, String> {
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| format!("Failed to listen for responses: {}", e))?;

        page.goto(url.as_str())
            .await
            .map_err(|e| format!("Navigation failed: {}", e))?;

        let deadline = Instant::now() + self.options.timeout();
        wait_for_ready(page, self.options.wait_until, deadline).await?;

        if let Some(selector) = &self.options.wait_for_selector {
            if !wait_for_selector(page, selector, deadline).await {
                tracing::debug!("Selector '{}' not found on {}, continuing", selector, url);
            }
        }

        let body = page
            .content()
            .await
            .map_err(|e| format!("Failed to read rendered content: {}", e))?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        let (status, headers) = match document_response(&mut responses, &final_url) {
            Some(found) => found,
            None => {
                tracing::debug!("No document response captured for {}", url);
                (0, HeaderMap::new())
            }
        };

        let ok = (200..300).contains(&status);

        Ok(RawResponse {
            final_url,
            status,
            headers,
            body,
            ok,
            error: (!ok).then(|| format!("HTTP {}", status)),
            discovered_links: Vec::new(),
        })
    }
}

#[async_trait]
impl Fetcher for RenderedFetcher {
    async fn fetch(&self, url: &Url) -> RawResponse {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(session) => self.render(&session.browser, url).await,
            None => RawResponse::failure(url, "Browser session is closed"),
        }
    }

    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Rendered
    }

    async fn close(&self) {
        let session = self.session.lock().await.take();
        if let Some(mut session) = session {
            tracing::info!("Closing browser");
            if let Err(e) = session.browser.close().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = session.browser.wait().await {
                tracing::debug!("Failed waiting for browser exit: {}", e);
            }
        }
    }
}

/// Waits until the page satisfies the navigation policy
///
/// `goto` already returns once the navigation has committed, so `Commit`
/// needs nothing further.
async fn wait_for_ready(page: &Page, policy: WaitUntil, deadline: Instant) -> Result<(), String> {
    match policy {
        WaitUntil::Commit => Ok(()),
        WaitUntil::DomContentLoaded => {
            while Instant::now() < deadline {
                if let Ok(state) = ready_state(page).await {
                    if state != "loading" {
                        break;
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Ok(())
        }
        WaitUntil::Load => page
            .wait_for_navigation()
            .await
            .map(|_| ())
            .map_err(|e| format!("Page load failed: {}", e)),
        WaitUntil::NetworkIdle => {
            page.wait_for_navigation()
                .await
                .map_err(|e| format!("Page load failed: {}", e))?;
            wait_for_network_idle(page, deadline).await;
            Ok(())
        }
    }
}

pub(super) async fn ready_state(page: &Page) -> Result<String, String> {
    page.evaluate("document.readyState")
        .await
        .map_err(|e| e.to_string())?
        .into_value::<String>()
        .map_err(|e| e.to_string())
}

/// Waits until no new resource has been requested for [`NETWORK_IDLE_WINDOW`]
async fn wait_for_network_idle(page: &Page, deadline: Instant) {
    let mut last_count: Option<u64> = None;
    let mut quiet_since = Instant::now();

    while Instant::now() < deadline {
        let count = page
            .evaluate("performance.getEntriesByType('resource').length")
            .await
            .ok()
            .and_then(|r| r.into_value::<u64>().ok());

        if count != last_count {
            last_count = count;
            quiet_since = Instant::now();
        } else if quiet_since.elapsed() >= NETWORK_IDLE_WINDOW {
            return;
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }

    tracing::debug!("Network did not go idle before the navigation deadline");
}

/// Polls for `selector`; returns false if it never appeared
async fn wait_for_selector(page: &Page, selector: &str, deadline: Instant) -> bool {
    loop {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Picks the main document response out of the buffered network events
///
/// Prefers the document response for the final URL, falling back to the last
/// document response seen (redirect chains produce several).
fn document_response(
    events: &mut EventStream<EventResponseReceived>,
    final_url: &Url,
) -> Option<(u16, HeaderMap)> {
    let mut last_document = None;
    let mut final_document = None;

    while let Some(Some(event)) = events.next().now_or_never() {
        if event.r#type != ResourceType::Document {
            continue;
        }

        let status = u16::try_from(event.response.status).unwrap_or(0);
        let headers = headers_from_cdp(event.response.headers.inner());

        if event.response.url == final_url.as_str() {
            final_document = Some((status, headers.clone()));
        }
        last_document = Some((status, headers));
    }

    final_document.or(last_document)
}

/// Converts a CDP headers object into a case-insensitive header map
///
/// CDP joins repeated headers with newlines; each line becomes its own value.
pub(crate) fn headers_from_cdp(headers: &serde_json::Value) -> HeaderMap {
    let mut map = HeaderMap::new();

    let Some(object) = headers.as_object() else {
        return map;
    };

    for (name, value) in object {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        let Some(value) = value.as_str() else {
            continue;
        };
        for line in value.split('\n') {
            if let Ok(value) = HeaderValue::from_str(line.trim()) {
                map.append(name.clone(), value);
            }
        }
    }

    map
}

use super::parser::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Top-level configuration file layout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration for a single crawl
///
/// Built once per crawl and never mutated by the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Root URL; always visited regardless of filters
    pub url: String,

    /// Maximum number of links followed from the root
    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Minimum spacing between successive fetches (milliseconds)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Pages whose Last-Modified header predates this are not reported
    #[serde(default, deserialize_with = "deserialize_since")]
    pub since: Option<DateTime<Utc>>,

    /// Regular expression a discovered link must match to be followed
    #[serde(default)]
    pub url_pattern: Option<String>,

    /// Only follow links on the root URL's host
    #[serde(default)]
    pub same_host_only: bool,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout for plain fetches (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fetch pages through a headless browser instead of plain HTTP
    #[serde(default)]
    pub use_rendered_fetch: bool,

    /// Options for the rendered fetch strategy
    #[serde(default)]
    pub render: RenderOptions,
}

impl CrawlConfig {
    /// Creates a configuration for `url` with every other option at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: default_depth(),
            delay_ms: default_delay_ms(),
            since: None,
            url_pattern: None,
            same_host_only: false,
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            use_rendered_fetch: false,
            render: RenderOptions::default(),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The fetch strategy selected by this configuration
    pub fn strategy(&self) -> FetchStrategy {
        if self.use_rendered_fetch {
            FetchStrategy::Rendered
        } else {
            FetchStrategy::Plain
        }
    }
}

/// Which fetch backend a crawl uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Plain,
    Rendered,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Plain => f.write_str("plain"),
            FetchStrategy::Rendered => f.write_str("rendered"),
        }
    }
}

/// Rendered-fetch options
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RenderOptions {
    /// When navigation counts as finished
    #[serde(default)]
    pub wait_until: WaitUntil,

    /// Navigation timeout (milliseconds)
    #[serde(default = "default_render_timeout_ms")]
    pub timeout_ms: u64,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// CSS selector to wait for after navigation
    #[serde(default)]
    pub wait_for_selector: Option<String>,

    /// Browser binary; auto-detected when unset
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Page interaction that reveals extra links after navigation
    #[serde(default)]
    pub interact: InteractOptions,
}

impl RenderOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::default(),
            timeout_ms: default_render_timeout_ms(),
            headless: default_headless(),
            wait_for_selector: None,
            chrome_executable: None,
            interact: InteractOptions::default(),
        }
    }
}

/// Interaction run on each rendered page before its links are collected
///
/// Steps run in order: page-size listbox, scrolling, then pagination. Each
/// step is off unless enabled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InteractOptions {
    /// Hosts to interact with; every host when empty
    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default)]
    pub listbox: ListboxOptions,

    #[serde(default)]
    pub scroll: ScrollOptions,

    #[serde(default)]
    pub pagination: PaginationOptions,
}

impl InteractOptions {
    /// True if any interaction step is enabled
    pub fn is_enabled(&self) -> bool {
        self.listbox.enabled || self.scroll.enabled || self.pagination.enabled
    }

    /// True if interaction should run on a page served from `url`
    pub fn applies_to(&self, url: &Url) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if self.domains.is_empty() {
            return true;
        }
        url.host_str().map_or(false, |host| {
            self.domains
                .iter()
                .any(|domain| domain.eq_ignore_ascii_case(host))
        })
    }
}

/// Picks a larger page size from a listing's "items per page" control
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListboxOptions {
    #[serde(default)]
    pub enabled: bool,

    /// Native `<select>` elements to try first
    #[serde(default)]
    pub select_selectors: Vec<String>,

    /// Elements that open a custom dropdown
    #[serde(default)]
    pub trigger_selectors: Vec<String>,

    /// Regex matched against button and link labels to find a dropdown trigger
    #[serde(default)]
    pub trigger_pattern: Option<String>,

    /// Option values or labels to pick, most preferred first
    #[serde(default)]
    pub desired_options: Vec<String>,

    /// Where the entries of an opened custom dropdown live
    #[serde(default = "default_option_selectors")]
    pub option_selectors: Vec<String>,

    /// Pause after a selection so the listing can reload (milliseconds)
    #[serde(default = "default_listbox_settle_ms")]
    pub settle_ms: u64,
}

impl Default for ListboxOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            select_selectors: Vec::new(),
            trigger_selectors: Vec::new(),
            trigger_pattern: None,
            desired_options: Vec::new(),
            option_selectors: default_option_selectors(),
            settle_ms: default_listbox_settle_ms(),
        }
    }
}

/// Scrolls the page to trigger lazy loading
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScrollOptions {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_scroll_step_px")]
    pub step_px: u32,

    #[serde(default = "default_scroll_max_steps")]
    pub max_steps: u32,

    /// Pause after each scroll step (milliseconds)
    #[serde(default = "default_scroll_delay_ms")]
    pub delay_ms: u64,

    /// Stop after this many steps in a row leave the page height unchanged;
    /// 0 always runs every step
    #[serde(default = "default_stability_passes")]
    pub stability_passes: u32,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            step_px: default_scroll_step_px(),
            max_steps: default_scroll_max_steps(),
            delay_ms: default_scroll_delay_ms(),
            stability_passes: default_stability_passes(),
        }
    }
}

/// Presses a listing's "next" control repeatedly, collecting links each time
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PaginationOptions {
    #[serde(default)]
    pub enabled: bool,

    /// CSS selectors for the next control, tried in order
    #[serde(default = "default_next_selectors")]
    pub next_selectors: Vec<String>,

    /// Regex matched against the accessible names of `roles` when no
    /// selector matches
    #[serde(default)]
    pub name_pattern: Option<String>,

    /// ARIA roles searched by `name_pattern`
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,

    #[serde(default = "default_max_clicks")]
    pub max_clicks: u32,

    /// Pause after each click (milliseconds)
    #[serde(default = "default_pagination_settle_ms")]
    pub settle_ms: u64,

    /// Stop as soon as a click reveals no new links
    #[serde(default = "default_true")]
    pub stop_if_no_new_links: bool,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            next_selectors: default_next_selectors(),
            name_pattern: None,
            roles: default_roles(),
            max_clicks: default_max_clicks(),
            settle_ms: default_pagination_settle_ms(),
            stop_if_no_new_links: true,
        }
    }
}

/// Navigation wait policy for rendered fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// The load event has fired
    Load,
    /// The DOM has been parsed
    DomContentLoaded,
    /// No new network activity for a short window
    #[default]
    NetworkIdle,
    /// The navigation response has been received
    Commit,
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" => Ok(Self::Load),
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            "networkidle" => Ok(Self::NetworkIdle),
            "commit" => Ok(Self::Commit),
            other => Err(format!(
                "unknown wait policy '{}' (expected load, domcontentloaded, networkidle or commit)",
                other
            )),
        }
    }
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::DomContentLoaded => "domcontentloaded",
            Self::NetworkIdle => "networkidle",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Limits the command-line runner applies around a crawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// Stop once this many URLs have been visited
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Wall-clock limit for the whole crawl (seconds)
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// JSON Lines file for page records; stdout when unset
    #[serde(default)]
    pub path: Option<String>,
}

/// Accepts a TOML date or datetime as well as a quoted timestamp
fn deserialize_since<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match toml::Value::deserialize(deserializer)? {
        toml::Value::Datetime(datetime) => datetime.to_string(),
        toml::Value::String(text) => text,
        other => {
            return Err(de::Error::custom(format!(
                "expected a date or timestamp, found {}",
                other.type_str()
            )))
        }
    };

    parse_timestamp(&text).map(Some).map_err(de::Error::custom)
}

fn default_depth() -> u32 {
    2
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    format!("webtrawl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

fn default_headless() -> bool {
    true
}

fn default_true() -> bool {
    true
}

fn default_option_selectors() -> Vec<String> {
    [
        "ul[role='listbox'] [role='option']",
        "[role='menu'] [role='menuitem']",
        ".dropdown-menu li",
        ".menu li",
        "[role='option']",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_listbox_settle_ms() -> u64 {
    200
}

fn default_scroll_step_px() -> u32 {
    1200
}

fn default_scroll_max_steps() -> u32 {
    5
}

fn default_scroll_delay_ms() -> u64 {
    300
}

fn default_stability_passes() -> u32 {
    2
}

fn default_next_selectors() -> Vec<String> {
    ["a[rel='next']", "a.next", ".pagination-next"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_roles() -> Vec<String> {
    vec!["link".to_string(), "button".to_string()]
}

fn default_max_clicks() -> u32 {
    5
}

fn default_pagination_settle_ms() -> u64 {
    250
}

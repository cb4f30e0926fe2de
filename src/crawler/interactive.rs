//! Interactive link discovery for rendered pages
//!
//! Many listings only show part of their entries until the visitor picks a
//! larger page size, scrolls, or presses "next". When interaction is enabled
//! the rendered fetcher runs these steps on the live tab after navigation:
//!
//! 1. Listbox: choose a preferred page size from a native `<select>` or a
//!    custom dropdown, found by selector or by a label regex
//! 2. Scroll: step down the page until its height stops changing
//! 3. Pagination: press the next control (by selector, or by a regex over
//!    the accessible names of links and buttons) and collect links after
//!    every click
//!
//! The links found ride along on the fetched page, and
//! [`InteractiveLinkExtractor`] merges them with the statically extracted
//! ones. Every step is best-effort; a failing step is logged and skipped.

use crate::config::{InteractOptions, ListboxOptions, PaginationOptions, ScrollOptions};
use crate::crawler::callbacks::LinkExtractor;
use crate::crawler::parser::{collapse_whitespace, extract_links, ScrapedPage};
use crate::crawler::rendered::ready_state;
use chromiumoxide::page::Page;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Absolute hrefs of every anchor, in document order
const COLLECT_LINKS: &str =
    "(() => Array.from(document.querySelectorAll('a[href]'), a => a.href))()";

const PAGE_HEIGHT: &str = "(() => document.body ? document.body.scrollHeight : 0)()";

/// Helpers shared by the element scripts
const ELEMENT_HELPERS: &str = r#"
    const isVisible = el => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    const isEnabled = el => !el.disabled && el.getAttribute('aria-disabled') !== 'true';
    const visibleSelect = sel => Array.from(document.querySelectorAll(sel))
        .find(el => el.tagName === 'SELECT' && isVisible(el));
"#;

/// Elements searched for a dropdown trigger by label
const TRIGGER_CANDIDATES: &str = "a, button, [role='button']";

/// Longest time spent waiting for a page to leave the `loading` state
const SETTLE_LIMIT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Page-size label suffixes ignored when comparing dropdown options,
/// longest first
const OPTION_SUFFIXES: &[&str] = &[
    "items/page",
    "item/page",
    "per page",
    "件/ページ",
    "件表示",
    "items",
    "item",
    "件",
];

/// Link extractor that adds interaction-discovered links to the default ones
///
/// Static links come first, followed by links revealed through interaction.
/// Fragments are dropped and duplicates removed. On pages that were not
/// interacted with this behaves like the default extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveLinkExtractor;

impl LinkExtractor for InteractiveLinkExtractor {
    fn extract_links(&mut self, page: &ScrapedPage) -> anyhow::Result<Vec<String>> {
        Ok(page_links(page))
    }
}

/// Every link on a page: static anchors plus interaction-discovered links
pub fn page_links(page: &ScrapedPage) -> Vec<String> {
    merge_links(
        extract_links(page)
            .into_iter()
            .chain(page.discovered_links.iter().cloned()),
    )
}

/// Strips fragments and removes duplicates, keeping first-seen order
pub fn merge_links<I>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for link in links {
        let link = match link.split_once('#') {
            Some((head, _)) => head.to_string(),
            None => link,
        };
        if seen.insert(link.clone()) {
            merged.push(link);
        }
    }

    merged
}

/// Normalizes a page-size option label for comparison
///
/// Whitespace is collapsed and a trailing unit such as "items" or "per page"
/// is dropped, so "60 items" and "60" compare equal.
pub fn normalize_option_text(text: &str) -> String {
    let collapsed = collapse_whitespace(text);

    for suffix in OPTION_SUFFIXES {
        let Some(cut) = collapsed.len().checked_sub(suffix.len()) else {
            continue;
        };
        if collapsed.is_char_boundary(cut) && collapsed[cut..].eq_ignore_ascii_case(suffix) {
            return collapsed[..cut].trim().to_string();
        }
    }

    collapsed
}

/// An `<option>` of a native select element
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct SelectOption {
    value: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct SelectState {
    value: String,
    options: Vec<SelectOption>,
}

/// An element matched by a selector, identified by its position in the match list
#[derive(Debug, Deserialize)]
struct Candidate {
    index: usize,
    text: String,
    label: String,
    usable: bool,
}

#[derive(Debug, PartialEq)]
enum ListboxOutcome {
    Skipped,
    AlreadySelected(String),
    Selected(String),
    NotFound,
}

/// Picks the value to set on a native select
///
/// Desired entries are tried in order; each matches an option by value
/// first, then by normalized label.
fn choose_option(options: &[SelectOption], desired: &[String]) -> Option<String> {
    desired.iter().find_map(|wanted| {
        if options.iter().any(|o| &o.value == wanted) {
            return Some(wanted.clone());
        }
        let wanted = normalize_option_text(wanted);
        options
            .iter()
            .find(|o| !o.value.is_empty() && normalize_option_text(&o.text) == wanted)
            .map(|o| o.value.clone())
    })
}

/// CSS selector for the elements carrying an ARIA role
fn role_selector(role: &str) -> String {
    match role {
        "link" => "a[href], [role='link']".to_string(),
        "button" => {
            "button, input[type='button'], input[type='submit'], [role='button']".to_string()
        }
        other => format!("[role='{}']", other.replace(['\'', '\\'], "")),
    }
}

/// Encodes a string as a JavaScript string literal
fn js_str(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn candidates_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            {helpers}
            return Array.from(document.querySelectorAll({selector}), (el, index) => ({{
                index,
                text: (el.innerText || el.value || '').trim(),
                label: [el.innerText || el.value || '', el.getAttribute('aria-label') || '',
                        el.getAttribute('title') || ''].join(' ').trim(),
                usable: isVisible(el) && isEnabled(el),
            }}));
        }})()"#,
        helpers = ELEMENT_HELPERS,
        selector = js_str(selector),
    )
}

fn click_script(selector: &str, index: usize) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelectorAll({selector})[{index}];
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()"#,
        selector = js_str(selector),
        index = index,
    )
}

fn select_state_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            {helpers}
            const el = visibleSelect({selector});
            if (!el) return null;
            return {{
                value: el.value,
                options: Array.from(el.options, o => ({{ value: o.value, text: o.text }})),
            }};
        }})()"#,
        helpers = ELEMENT_HELPERS,
        selector = js_str(selector),
    )
}

fn set_select_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            {helpers}
            const el = visibleSelect({selector});
            if (!el) return false;
            el.value = {value};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return el.value === {value};
        }})()"#,
        helpers = ELEMENT_HELPERS,
        selector = js_str(selector),
        value = js_str(value),
    )
}

fn scroll_script(step_px: u32) -> String {
    format!("(() => {{ window.scrollBy(0, {}); return true; }})()", step_px)
}

async fn eval<T: DeserializeOwned>(page: &Page, script: String) -> Result<T, String> {
    page.evaluate(script)
        .await
        .map_err(|e| e.to_string())?
        .into_value::<T>()
        .map_err(|e| e.to_string())
}

/// Runs the configured interaction on a rendered page
///
/// Returns every link seen along the way, fragments stripped and
/// duplicates removed.
pub(crate) async fn interact(page: &Page, options: &InteractOptions) -> Vec<String> {
    if options.listbox.enabled {
        let outcome = apply_listbox(page, &options.listbox).await;
        tracing::debug!("Listbox step: {:?}", outcome);
    }

    if options.scroll.enabled {
        match apply_scroll(page, &options.scroll).await {
            Ok(steps) => tracing::debug!("Scrolled {} steps", steps),
            Err(e) => tracing::debug!("Scrolling failed: {}", e),
        }
    }

    let mut links = collect_links(page).await;

    if options.pagination.enabled {
        let clicks = apply_pagination(page, &options.pagination, &mut links).await;
        tracing::debug!("Pagination clicked {} times", clicks);
    }

    let snapshot = collect_links(page).await;
    merge_links(links.into_iter().chain(snapshot))
}

async fn collect_links(page: &Page) -> Vec<String> {
    match eval::<Vec<String>>(page, COLLECT_LINKS.to_string()).await {
        Ok(links) => merge_links(links),
        Err(e) => {
            tracing::debug!("Failed to collect links: {}", e);
            Vec::new()
        }
    }
}

/// Sleeps for `pause_ms`, then waits for the document to finish loading
async fn settle(page: &Page, pause_ms: u64) {
    tokio::time::sleep(Duration::from_millis(pause_ms)).await;

    let deadline = Instant::now() + SETTLE_LIMIT;
    while Instant::now() < deadline {
        match ready_state(page).await {
            Ok(state) if state != "loading" => return,
            _ => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }
}

async fn candidates(page: &Page, selector: &str) -> Vec<Candidate> {
    eval(page, candidates_script(selector))
        .await
        .unwrap_or_else(|e| {
            tracing::trace!("Selector '{}' failed: {}", selector, e);
            Vec::new()
        })
}

async fn click(page: &Page, selector: &str, index: usize) -> bool {
    eval::<bool>(page, click_script(selector, index))
        .await
        .unwrap_or(false)
}

async fn click_first_usable(page: &Page, selector: &str) -> bool {
    let found = candidates(page, selector)
        .await
        .into_iter()
        .find(|c| c.usable);

    match found {
        Some(candidate) => click(page, selector, candidate.index).await,
        None => false,
    }
}

/// Clicks the first usable element whose label matches `pattern`
async fn click_matching(page: &Page, selector: &str, pattern: &Regex) -> bool {
    let found = candidates(page, selector)
        .await
        .into_iter()
        .find(|c| c.usable && pattern.is_match(&c.label));

    match found {
        Some(candidate) => {
            tracing::debug!("Clicking '{}' matched by {}", candidate.label, pattern);
            click(page, selector, candidate.index).await
        }
        None => false,
    }
}

async fn apply_listbox(page: &Page, options: &ListboxOptions) -> ListboxOutcome {
    let desired = &options.desired_options;
    if desired.is_empty() {
        return ListboxOutcome::Skipped;
    }

    for selector in &options.select_selectors {
        let state = match eval::<Option<SelectState>>(page, select_state_script(selector)).await {
            Ok(Some(state)) => state,
            _ => continue,
        };

        if desired.contains(&state.value) {
            return ListboxOutcome::AlreadySelected(state.value);
        }

        let Some(value) = choose_option(&state.options, desired) else {
            continue;
        };

        if eval::<bool>(page, set_select_script(selector, &value))
            .await
            .unwrap_or(false)
        {
            settle(page, options.settle_ms).await;
            return ListboxOutcome::Selected(value);
        }
    }

    for trigger in &options.trigger_selectors {
        if click_first_usable(page, trigger).await {
            if let Some(choice) = pick_dropdown_option(page, options).await {
                return ListboxOutcome::Selected(choice);
            }
        }
    }

    if let Some(pattern) = options
        .trigger_pattern
        .as_deref()
        .and_then(|p| Regex::new(p).ok())
    {
        if click_matching(page, TRIGGER_CANDIDATES, &pattern).await {
            if let Some(choice) = pick_dropdown_option(page, options).await {
                return ListboxOutcome::Selected(choice);
            }
        }
    }

    ListboxOutcome::NotFound
}

/// Chooses a desired entry in an opened custom dropdown
async fn pick_dropdown_option(page: &Page, options: &ListboxOptions) -> Option<String> {
    for selector in &options.option_selectors {
        let entries: Vec<_> = candidates(page, selector)
            .await
            .into_iter()
            .filter(|c| c.usable)
            .collect();
        if entries.is_empty() {
            continue;
        }

        for wanted in &options.desired_options {
            let normalized = normalize_option_text(wanted);
            let Some(entry) = entries
                .iter()
                .find(|c| normalize_option_text(&c.text) == normalized)
            else {
                continue;
            };

            if click(page, selector, entry.index).await {
                settle(page, options.settle_ms).await;
                return Some(wanted.clone());
            }
        }
    }

    None
}

async fn apply_scroll(page: &Page, options: &ScrollOptions) -> Result<u32, String> {
    let mut height: u64 = eval(page, PAGE_HEIGHT.to_string()).await?;
    let mut unchanged = 0;
    let mut steps = 0;

    for _ in 0..options.max_steps {
        eval::<bool>(page, scroll_script(options.step_px)).await?;
        tokio::time::sleep(Duration::from_millis(options.delay_ms)).await;
        steps += 1;

        let new_height: u64 = eval(page, PAGE_HEIGHT.to_string()).await?;
        if new_height == height {
            unchanged += 1;
            if options.stability_passes > 0 && unchanged >= options.stability_passes {
                break;
            }
        } else {
            unchanged = 0;
        }
        height = new_height;
    }

    Ok(steps)
}

/// Clicks through pages, appending newly seen links to `links`
///
/// Returns the number of clicks made.
async fn apply_pagination(
    page: &Page,
    options: &PaginationOptions,
    links: &mut Vec<String>,
) -> u32 {
    let fallback = options
        .name_pattern
        .as_deref()
        .and_then(|p| Regex::new(p).ok());
    let mut seen: HashSet<String> = links.iter().cloned().collect();
    let mut clicks = 0;

    while clicks < options.max_clicks {
        if !click_next(page, options, fallback.as_ref()).await {
            tracing::debug!("No next control found after {} clicks", clicks);
            break;
        }
        clicks += 1;
        settle(page, options.settle_ms).await;

        let mut fresh = 0;
        for link in collect_links(page).await {
            if seen.insert(link.clone()) {
                links.push(link);
                fresh += 1;
            }
        }

        tracing::debug!("Pagination click {} revealed {} new links", clicks, fresh);
        if fresh == 0 && options.stop_if_no_new_links {
            break;
        }
    }

    clicks
}

async fn click_next(page: &Page, options: &PaginationOptions, fallback: Option<&Regex>) -> bool {
    for selector in &options.next_selectors {
        if click_first_usable(page, selector).await {
            return true;
        }
    }

    let Some(pattern) = fallback else {
        return false;
    };

    for role in &options.roles {
        if click_matching(page, &role_selector(role), pattern).await {
            return true;
        }
    }

    false
}

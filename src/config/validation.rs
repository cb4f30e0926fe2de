use crate::config::types::{Config, CrawlConfig, InteractOptions, RenderOptions};
use crate::ConfigError;
use reqwest::header::HeaderValue;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration file
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;

    if let Some(0) = config.run.max_pages {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if let Some(path) = &config.output.path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "output path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates a crawl configuration
///
/// Called by the engine before anything is fetched, so a bad pattern or
/// unusable option never surfaces halfway through a crawl.
pub fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_root_url(&config.url)?;

    if let Some(pattern) = &config.url_pattern {
        compile_url_pattern(pattern)?;
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if HeaderValue::from_str(&config.user_agent).is_err() {
        return Err(ConfigError::Validation(format!(
            "user_agent is not a valid header value: '{}'",
            config.user_agent
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    validate_render_options(&config.render)?;

    if config.render.interact.is_enabled() && !config.use_rendered_fetch {
        return Err(ConfigError::Validation(
            "page interaction requires use-rendered-fetch".to_string(),
        ));
    }

    Ok(())
}

/// Compiles a link pattern, anchored at the start of the URL
pub fn compile_url_pattern(pattern: &str) -> Result<regex::Regex, ConfigError> {
    regex::Regex::new(&format!("^(?:{})", pattern))
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

fn validate_root_url(url: &str) -> Result<(), ConfigError> {
    let parsed =
        Url::parse(url).map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", url, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' must use the http or https scheme",
            url
        )));
    }

    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("'{}' has no host", url)));
    }

    Ok(())
}

fn validate_render_options(options: &RenderOptions) -> Result<(), ConfigError> {
    if options.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "render timeout_ms must be >= 1".to_string(),
        ));
    }

    if let Some(selector) = &options.wait_for_selector {
        if selector.trim().is_empty() {
            return Err(ConfigError::Validation(
                "wait_for_selector cannot be empty".to_string(),
            ));
        }

        if Selector::parse(selector).is_err() {
            return Err(ConfigError::Validation(format!(
                "wait_for_selector is not a valid CSS selector: '{}'",
                selector
            )));
        }
    }

    validate_interact_options(&options.interact)
}

fn validate_interact_options(options: &InteractOptions) -> Result<(), ConfigError> {
    let listbox = &options.listbox;
    let pagination = &options.pagination;

    for pattern in [&listbox.trigger_pattern, &pagination.name_pattern]
        .into_iter()
        .flatten()
    {
        regex::Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }

    let mut selectors = listbox
        .select_selectors
        .iter()
        .chain(&listbox.trigger_selectors)
        .chain(&listbox.option_selectors)
        .chain(&pagination.next_selectors);

    if selectors.any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "interaction selectors cannot be empty".to_string(),
        ));
    }

    if pagination.roles.iter().any(|r| r.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "pagination roles cannot be empty".to_string(),
        ));
    }

    if options.scroll.enabled && options.scroll.step_px == 0 {
        return Err(ConfigError::Validation(
            "scroll step_px must be >= 1".to_string(),
        ));
    }

    Ok(())
}

//! webtrawl main entry point
//!
//! This is the command-line interface for the webtrawl crawler.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use webtrawl::config::{
    load_config_with_hash, parse_timestamp, validate, Config, CrawlConfig, OutputConfig,
    RunConfig, WaitUntil,
};
use webtrawl::output::{print_statistics, JsonlSink};
use webtrawl::{stop_fn, Crawler, InteractiveLinkExtractor};

/// webtrawl: a bounded-depth, polite web crawler
///
/// Walks a site depth-first from a root URL, following links up to a fixed
/// depth, and writes one JSON line per page.
#[derive(Parser, Debug)]
#[command(name = "webtrawl")]
#[command(version)]
#[command(about = "A bounded-depth, polite web crawler", long_about = None)]
struct Cli {
    /// Root URL to crawl (overrides the config file)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of links to follow from the root
    #[arg(short, long)]
    depth: Option<u32>,

    /// Minimum delay between fetches in milliseconds
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Only report pages modified on or after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_timestamp)]
    since: Option<DateTime<Utc>>,

    /// Only follow links matching this regular expression (anchored at the start)
    #[arg(long, value_name = "REGEX")]
    url_pattern: Option<String>,

    /// Only follow links on the root URL's host
    #[arg(long)]
    same_host_only: bool,

    /// User-Agent header to send
    #[arg(long)]
    user_agent: Option<String>,

    /// Fetch pages through a headless browser
    #[arg(long)]
    rendered: bool,

    /// When a rendered navigation counts as finished
    #[arg(long, value_name = "POLICY")]
    wait_until: Option<WaitUntil>,

    /// Show the browser window during rendered fetches
    #[arg(long, requires = "rendered")]
    headed: bool,

    /// CSS selector to wait for after each rendered navigation
    #[arg(long, value_name = "SELECTOR")]
    wait_for_selector: Option<String>,

    /// Scroll rendered pages to load lazily inserted links
    #[arg(long, requires = "rendered")]
    scroll: bool,

    /// Click through "next" controls on rendered pages, collecting links
    #[arg(long, requires = "rendered")]
    paginate: bool,

    /// Regex matched against link and button names to find the next control
    #[arg(long, value_name = "REGEX", requires = "paginate")]
    next_pattern: Option<String>,

    /// Most "next" clicks per page
    #[arg(long, value_name = "N", requires = "paginate")]
    max_clicks: Option<u32>,

    /// Stop after this many URLs have been visited
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    max_duration_secs: Option<u64>,

    /// Write page records to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Validate the configuration and show it without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so stdout can carry page records.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webtrawl=info,warn"),
            1 => EnvFilter::new("webtrawl=debug,info"),
            2 => EnvFilter::new("webtrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Merges the config file (if any) with command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            let url = cli
                .url
                .clone()
                .context("A root URL is required when no --config file is given")?;
            Config {
                crawl: CrawlConfig::new(url),
                run: RunConfig::default(),
                output: OutputConfig::default(),
            }
        }
    };

    let crawl = &mut config.crawl;
    if let Some(url) = &cli.url {
        crawl.url = url.clone();
    }
    if let Some(depth) = cli.depth {
        crawl.depth = depth;
    }
    if let Some(delay_ms) = cli.delay_ms {
        crawl.delay_ms = delay_ms;
    }
    if cli.since.is_some() {
        crawl.since = cli.since;
    }
    if let Some(pattern) = &cli.url_pattern {
        crawl.url_pattern = Some(pattern.clone());
    }
    if cli.same_host_only {
        crawl.same_host_only = true;
    }
    if let Some(user_agent) = &cli.user_agent {
        crawl.user_agent = user_agent.clone();
    }
    if cli.rendered {
        crawl.use_rendered_fetch = true;
    }
    if let Some(wait_until) = cli.wait_until {
        crawl.render.wait_until = wait_until;
    }
    if cli.headed {
        crawl.render.headless = false;
    }
    if let Some(selector) = &cli.wait_for_selector {
        crawl.render.wait_for_selector = Some(selector.clone());
    }

    let interact = &mut crawl.render.interact;
    if cli.scroll {
        interact.scroll.enabled = true;
    }
    if cli.paginate {
        interact.pagination.enabled = true;
    }
    if let Some(pattern) = &cli.next_pattern {
        interact.pagination.name_pattern = Some(pattern.clone());
    }
    if let Some(max_clicks) = cli.max_clicks {
        interact.pagination.max_clicks = max_clicks;
    }

    if cli.max_pages.is_some() {
        config.run.max_pages = cli.max_pages;
    }
    if cli.max_duration_secs.is_some() {
        config.run.max_duration_secs = cli.max_duration_secs;
    }
    if let Some(output) = &cli.output {
        config.output.path = Some(output.clone());
    }

    validate(&config)?;
    Ok(config)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    let crawl = &config.crawl;

    println!("=== webtrawl Dry Run ===\n");

    println!("Crawl:");
    println!("  Root URL: {}", crawl.url);
    println!("  Depth: {}", crawl.depth);
    println!("  Delay: {}ms", crawl.delay_ms);
    println!(
        "  Since: {}",
        crawl
            .since
            .map(|s| s.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  URL pattern: {}",
        crawl.url_pattern.as_deref().unwrap_or("-")
    );
    println!("  Same host only: {}", crawl.same_host_only);
    println!("  User agent: {}", crawl.user_agent);
    println!("  Fetch strategy: {}", crawl.strategy());

    if crawl.use_rendered_fetch {
        println!("\nRendering:");
        println!("  Wait until: {}", crawl.render.wait_until);
        println!("  Timeout: {}ms", crawl.render.timeout_ms);
        println!("  Headless: {}", crawl.render.headless);
        if let Some(selector) = &crawl.render.wait_for_selector {
            println!("  Wait for selector: {}", selector);
        }

        let interact = &crawl.render.interact;
        if interact.is_enabled() {
            println!("\nInteraction:");
            if !interact.domains.is_empty() {
                println!("  Domains: {}", interact.domains.join(", "));
            }
            println!("  Page size listbox: {}", interact.listbox.enabled);
            println!("  Scroll: {}", interact.scroll.enabled);
            if interact.pagination.enabled {
                println!(
                    "  Pagination: up to {} clicks{}",
                    interact.pagination.max_clicks,
                    interact
                        .pagination
                        .name_pattern
                        .as_deref()
                        .map(|p| format!(", name pattern {}", p))
                        .unwrap_or_default()
                );
            } else {
                println!("  Pagination: false");
            }
        }
    } else {
        println!("  Request timeout: {}s", crawl.request_timeout_secs);
    }

    println!("\nLimits:");
    match config.run.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    match config.run.max_duration_secs {
        Some(secs) => println!("  Max duration: {}s", secs),
        None => println!("  Max duration: unlimited"),
    }

    println!("\nOutput:");
    println!(
        "  Records: {}",
        config.output.path.as_deref().unwrap_or("stdout")
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping before the next page");
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    let max_pages = config.run.max_pages;
    let stop = stop_fn(move |url, _depth, visited| {
        if interrupted.load(Ordering::SeqCst) {
            return Ok(true);
        }
        if let Some(max) = max_pages {
            if visited.len() >= max {
                tracing::info!("Reached {} pages, stopping before {}", max, url);
                return Ok(true);
            }
        }
        Ok(false)
    });

    let mut sink = match &config.output.path {
        Some(path) => JsonlSink::create(Path::new(path))
            .with_context(|| format!("Failed to create output file {}", path))?,
        None => JsonlSink::stdout(),
    };

    let mut crawler = Crawler::new(config.crawl.clone()).await?.stop_handler(stop);
    if config.crawl.render.interact.is_enabled() {
        crawler = crawler.link_extractor(InteractiveLinkExtractor);
    }

    let result = match config.run.max_duration_secs {
        Some(secs) => {
            match tokio::time::timeout(Duration::from_secs(secs), crawler.crawl(&mut sink)).await {
                Ok(result) => Some(result),
                Err(_) => {
                    tracing::warn!("Crawl exceeded {}s, stopping", secs);
                    None
                }
            }
        }
        None => Some(crawler.crawl(&mut sink).await),
    };

    crawler.shutdown().await;
    sink.flush().context("Failed to flush page records")?;

    match result {
        Some(Ok(report)) => {
            tracing::info!("Crawl finished, {} records written", sink.written());
            print_statistics(&report);
            Ok(())
        }
        Some(Err(e)) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
        None => {
            tracing::info!("{} records written before the time limit", sink.written());
            Ok(())
        }
    }
}

//! Configuration module for webtrawl
//!
//! Crawls are configured either in code through [`CrawlConfig`] or from a TOML
//! file loaded with [`load_config`].
//!
//! # Example
//!
//! ```no_run
//! use webtrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("webtrawl.toml")).unwrap();
//! println!("Crawler will follow links {} deep", config.crawl.depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlConfig, FetchStrategy, InteractOptions, ListboxOptions, OutputConfig,
    PaginationOptions, RenderOptions, RunConfig, ScrollOptions, WaitUntil,
};

// Re-export parser and validation functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, parse_timestamp,
};
pub use validation::{compile_url_pattern, validate, validate_crawl_config};

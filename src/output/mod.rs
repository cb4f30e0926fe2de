//! Output module for crawl results
//!
//! This module handles:
//! - Writing handled pages as JSON Lines
//! - Displaying crawl statistics

mod jsonl;
pub mod stats;

pub use jsonl::{JsonlSink, PageRecord};
pub use stats::{format_statistics, print_statistics};

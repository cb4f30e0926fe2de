//! JSON Lines page sink
//!
//! Writes one JSON object per handled page. Used by the command-line runner
//! as its data handler.

use crate::crawler::{page_links, DataHandler, ScrapedPage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// One page as written to the output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: Option<String>,
    pub page_content: String,
    pub source: String,
    pub status_code: u16,
    pub is_success: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub depth: u32,

    /// Links found on the page, including any revealed by interaction
    #[serde(default)]
    pub links: Vec<String>,
}

impl PageRecord {
    pub fn from_page(page: &ScrapedPage) -> Self {
        Self {
            title: page.title.clone(),
            page_content: page.text.clone(),
            source: page.url.to_string(),
            status_code: page.status,
            is_success: page.ok,
            last_modified: page.last_modified,
            depth: page.depth,
            links: page_links(page),
        }
    }
}

/// Data handler that appends every page to a JSON Lines stream
pub struct JsonlSink {
    writer: Box<dyn Write + Send>,
    written: u64,
}

impl JsonlSink {
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Box::new(writer),
            written: 0,
        }
    }

    /// Creates (or truncates) the file at `path`
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Number of records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write_record(&mut self, record: &PageRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl DataHandler for JsonlSink {
    fn handle(&mut self, page: &ScrapedPage) -> anyhow::Result<bool> {
        self.write_record(&PageRecord::from_page(page))?;
        Ok(true)
    }
}

//! Command-line interface definitions for news_clipper.
//!
//! This module defines the CLI arguments and options using the `clap` crate,
//! plus the optional JSON work-item payload that can supply the search query
//! instead of flags. Explicit flags always win over work-item fields.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::models::SearchQuery;

/// Command-line arguments for the news_clipper application.
///
/// The search query comes from `--search-phrase`/`--months`, from a JSON
/// work-item file, or from a mix of both (flags override the payload). All
/// other options shape where artifacts land and how patiently pages are
/// awaited.
///
/// # Examples
///
/// ```sh
/// # Basic usage: current-month articles about a phrase
/// news_clipper -s "climate change"
///
/// # Three months back, custom output directory
/// news_clipper -s "elections" -n 3 -o ./runs/elections
///
/// # Query supplied by a work-item payload
/// news_clipper --work-item ./work-item.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Search phrase to collect articles for
    #[arg(short = 's', long, required_unless_present = "work_item")]
    pub search_phrase: Option<String>,

    /// Whole months back from the run month to collect; 0 (the default)
    /// means the current month only
    #[arg(short = 'n', long)]
    pub months: Option<u32>,

    /// Path to a JSON work item supplying `search_phrase` and
    /// `number_of_months`
    #[arg(long)]
    pub work_item: Option<PathBuf>,

    /// Output directory for the report, images, and archive
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Root URL of the news site to search
    #[arg(long, env = "NEWS_BASE_URL", default_value = "https://www.aljazeera.com")]
    pub base_url: Url,

    /// Longest a single element wait may block, in seconds
    #[arg(long, default_value_t = 10)]
    pub wait_timeout_secs: u64,

    /// Delay between render attempts while waiting, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub poll_interval_millis: u64,

    /// Abandon the page walk after this many seconds, keeping whatever was
    /// collected
    #[arg(long)]
    pub run_deadline_secs: Option<u64>,
}

/// JSON work-item payload, as produced by external orchestration.
///
/// Both fields are optional so a payload can supply just the phrase or just
/// the month count.
#[derive(Debug, Deserialize)]
pub struct WorkItem {
    pub search_phrase: Option<String>,
    pub number_of_months: Option<u32>,
}

/// Failure to assemble a [`SearchQuery`] from flags and work item.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("cannot read work item {path}: {source}")]
    ReadWorkItem {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("work item {path} is not valid JSON: {source}")]
    ParseWorkItem {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no search phrase given; pass --search-phrase or a work item that has one")]
    MissingPhrase,
    #[error("search phrase is empty")]
    EmptyPhrase,
}

impl Cli {
    /// Combine flags and (optional) work item into the run's query.
    ///
    /// Flags take precedence over work-item fields; the month count defaults
    /// to zero when neither supplies it.
    pub fn resolve_query(&self) -> Result<SearchQuery, QueryError> {
        let work_item = match &self.work_item {
            Some(path) => Some(load_work_item(path)?),
            None => None,
        };

        let phrase = self
            .search_phrase
            .clone()
            .or_else(|| work_item.as_ref().and_then(|w| w.search_phrase.clone()))
            .ok_or(QueryError::MissingPhrase)?;
        if phrase.trim().is_empty() {
            return Err(QueryError::EmptyPhrase);
        }

        let months = self
            .months
            .or_else(|| work_item.as_ref().and_then(|w| w.number_of_months))
            .unwrap_or(0);

        Ok(SearchQuery::new(phrase, months))
    }
}

fn load_work_item(path: &Path) -> Result<WorkItem, QueryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| QueryError::ReadWorkItem {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| QueryError::ParseWorkItem {
        path: path.to_path_buf(),
        source,
    })
}

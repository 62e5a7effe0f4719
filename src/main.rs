//! # news_clipper
//!
//! Collects news articles matching a search phrase from a news site's
//! search pages, downloads their lead images, and packages everything into
//! a CSV report plus a zip archive.
//!
//! ## Features
//!
//! - Walks date-sorted search result pages until articles fall outside the
//!   requested month window
//! - Derives per-article columns: phrase occurrence count and whether a
//!   money amount is mentioned
//! - Downloads lead images in parallel; a failed image never fails the run
//! - Emits `report.csv`, an `images/` directory, and `news_collection.zip`
//! - Prints a JSON run summary to stdout
//!
//! ## Usage
//!
//! ```sh
//! news_clipper -s "climate change" -n 2 -o ./output
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Walk**: page through search results newest-first, extracting and
//!    admitting articles until the cutoff month is passed
//! 2. **Enrich**: download each article's lead image (parallel, bounded)
//! 3. **Report**: write the per-article CSV report
//! 4. **Archive**: bundle the report and images into one zip

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod error;
mod images;
mod models;
mod outputs;
mod pipeline;
mod scrape;
mod utils;

use cli::Cli;
use images::HttpImageSource;
use pipeline::PipelineConfig;
use scrape::fetch::HttpRenderer;

/// Timeout for individual HTTP requests (page renders and image downloads).
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    // Logs go to stderr; stdout is reserved for the JSON run summary.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!("news_clipper starting up");

    // Parse CLI and resolve the query from flags plus any work item
    let args = Cli::parse();
    debug!(?args.output_dir, ?args.base_url, "Parsed CLI arguments");

    let query = args.resolve_query()?;
    let run_date = Local::now().date_naive();
    info!(
        phrase = %query.phrase,
        months_back = query.months_back,
        %run_date,
        "Resolved search query"
    );

    let config = PipelineConfig {
        base_url: args.base_url.clone(),
        output_dir: args.output_dir.clone(),
        wait_timeout: Duration::from_secs(args.wait_timeout_secs),
        poll_interval: Duration::from_millis(args.poll_interval_millis),
        run_deadline: args.run_deadline_secs.map(Duration::from_secs),
    };

    let renderer = HttpRenderer::new(HTTP_TIMEOUT)?;
    let images = HttpImageSource::new(HTTP_TIMEOUT)?;

    let summary = match pipeline::run(query, run_date, &config, renderer, images).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Run failed before artifacts could be written");
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string(&summary)?);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        articles = summary.articles_collected,
        outcome = ?summary.outcome,
        "Execution complete"
    );

    Ok(())
}

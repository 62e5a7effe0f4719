//! End-to-end run orchestration.
//!
//! [`run`] wires the stages together: page walk → image downloads → report →
//! archive, and owns the run-level failure policy. A failed page walk never
//! aborts the run; whatever was collected still flows into the artifacts and
//! the failure reason rides along in the summary. Only an unusable output
//! directory or a failed artifact write is fatal.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use url::Url;

use crate::error::ArtifactError;
use crate::images::{ImageFetcher, ImageSource};
use crate::models::{CollectionRun, RunSummary, SearchQuery};
use crate::outputs::{archive, report};
use crate::scrape::fetch::{PageRenderer, WaitingFetcher};
use crate::scrape::pagination::PaginationDriver;
use crate::utils::ensure_writable_dir;

/// Directory under the output root holding downloaded images.
const IMAGES_DIR_NAME: &str = "images";

/// Everything a run needs beyond the query itself.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the news site whose search pages are walked.
    pub base_url: Url,
    /// Where the report, images, and archive land.
    pub output_dir: PathBuf,
    /// Longest a single element wait may block.
    pub wait_timeout: Duration,
    /// Delay between re-render attempts while waiting.
    pub poll_interval: Duration,
    /// Optional whole-run deadline; partial results survive it.
    pub run_deadline: Option<Duration>,
}

/// Execute one collection run end to end.
///
/// Sequences the page walk, image downloads, report, and archive. The page
/// walk's terminal state and any failure reason are carried into the returned
/// [`RunSummary`] rather than aborting the run.
///
/// # Errors
///
/// Only artifact-side failures: an unusable output directory, or a report or
/// archive write error. Everything else degrades into the summary.
#[instrument(level = "info", skip_all, fields(phrase = %query.phrase, months_back = query.months_back))]
pub async fn run<R, S>(
    query: SearchQuery,
    run_date: NaiveDate,
    config: &PipelineConfig,
    renderer: R,
    images: S,
) -> Result<RunSummary, ArtifactError>
where
    R: PageRenderer,
    S: ImageSource,
{
    let images_dir = config.output_dir.join(IMAGES_DIR_NAME);
    ensure_writable_dir(&config.output_dir)
        .await
        .map_err(ArtifactError::OutputDir)?;
    ensure_writable_dir(&images_dir)
        .await
        .map_err(ArtifactError::OutputDir)?;

    let mut run = CollectionRun::new(query, run_date);
    info!(
        run_date = %run.run_date,
        cutoff = %run.cutoff_date,
        "Starting collection"
    );

    let fetcher = WaitingFetcher::new(renderer, config.wait_timeout, config.poll_interval);
    let mut driver = PaginationDriver::new(fetcher, config.base_url.clone());
    let deadline = config.run_deadline.map(|d| Instant::now() + d);
    let drive = driver.drive(&mut run, deadline).await;

    if let Some(reason) = &drive.warning {
        warn!(reason = %reason, "Collection ended early; continuing with partial results");
    }
    if run.is_empty() {
        warn!("No articles matched the phrase within the month window");
    }

    let stats = ImageFetcher::new(images)
        .attach_images(&mut run, &images_dir)
        .await;

    let report_path = report::write_report(run.articles(), &config.output_dir).await?;
    let archive_path = archive::write_archive(
        run.articles(),
        &report_path,
        &images_dir,
        &config.output_dir,
    )
    .await?;

    info!(
        articles = run.len(),
        pages = drive.pages_visited,
        skipped = drive.skipped_entries,
        duplicates = drive.duplicate_entries,
        images_downloaded = stats.downloaded,
        images_failed = stats.failed,
        outcome = ?drive.outcome,
        report = %report_path.display(),
        archive = %archive_path.display(),
        "Run complete"
    );

    Ok(RunSummary {
        search_phrase: run.query.phrase.clone(),
        articles_collected: run.len(),
        images_downloaded: stats.downloaded,
        images_failed: stats.failed,
        outcome: drive.outcome,
        warning: drive.warning,
    })
}

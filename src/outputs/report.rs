//! CSV report generation.
//!
//! Emits one row per collected article, in collection order, with the
//! derived columns alongside the extracted fields.
//!
//! # Columns
//!
//! `title, date, description, image_file_name, matches_count, has_money`
//!
//! Dates are ISO 8601 calendar dates; an article without a downloaded image
//! gets an empty `image_file_name` cell; `has_money` renders as
//! `true`/`false`. Fields containing the separator, quotes, or line breaks
//! are double-quote escaped; everything else is written bare.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, instrument};

use crate::error::ArtifactError;
use crate::models::Article;

/// File name of the report artifact within the output directory.
pub const REPORT_FILE_NAME: &str = "report.csv";

const REPORT_HEADER: [&str; 6] = [
    "title",
    "date",
    "description",
    "image_file_name",
    "matches_count",
    "has_money",
];

/// Render the full report as CSV text. Row order follows `articles`.
pub fn render_report(articles: &[Article]) -> String {
    let mut out = String::new();
    append_row(&mut out, &REPORT_HEADER);
    for article in articles {
        let date = article.published_at.to_string();
        let matches = article.search_phrase_count.to_string();
        let money = article.contains_money.to_string();
        append_row(
            &mut out,
            &[
                article.title.as_str(),
                &date,
                &article.description,
                article.image_file.as_deref().unwrap_or(""),
                &matches,
                &money,
            ],
        );
    }
    out
}

/// Render and write the report into `output_dir`.
///
/// # Returns
///
/// The path of the written report file.
#[instrument(level = "info", skip_all, fields(dir = %output_dir.display()))]
pub async fn write_report(
    articles: &[Article],
    output_dir: &Path,
) -> Result<PathBuf, ArtifactError> {
    let path = output_dir.join(REPORT_FILE_NAME);
    let csv = render_report(articles);
    info!(path = %path.display(), rows = articles.len(), "Writing report");
    fs::write(&path, csv).await.map_err(ArtifactError::Report)?;
    info!(path = %path.display(), "Wrote report");
    Ok(path)
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn append_row(out: &mut String, cells: &[&str]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if needs_quotes(cell) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

//! Archive assembly.
//!
//! Bundles the report and every downloaded image into a single zip so the
//! whole collection travels as one artifact. A report-only archive (zero
//! images downloaded) is valid.
//!
//! # Layout
//!
//! ```text
//! news_collection.zip
//! ├── report.csv
//! └── images/
//!     ├── 2024-03-10-markets-rally.jpg
//!     └── ...
//! ```
//!
//! Entry names reuse the articles' local image file names, which are unique
//! within a run, so entries never collide. Writing uses blocking `std::fs`
//! since the zip encoder works over synchronous writers.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArtifactError;
use crate::models::Article;
use crate::outputs::report::REPORT_FILE_NAME;

/// File name of the archive artifact within the output directory.
pub const ARCHIVE_FILE_NAME: &str = "news_collection.zip";

/// Entry-name prefix grouping images inside the archive.
const IMAGES_PREFIX: &str = "images/";

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Assemble the archive from the written report and the downloaded images.
///
/// Only articles with an attached `image_file` contribute an image entry;
/// their bytes are read back from `images_dir`.
///
/// # Returns
///
/// The path of the written archive.
#[instrument(level = "info", skip_all, fields(dir = %output_dir.display()))]
pub async fn write_archive(
    articles: &[Article],
    report_path: &Path,
    images_dir: &Path,
    output_dir: &Path,
) -> Result<PathBuf, ArtifactError> {
    let archive_path = output_dir.join(ARCHIVE_FILE_NAME);
    let file = File::create(&archive_path).map_err(ArtifactError::Archive)?;
    let mut writer = ZipWriter::new(file);

    let report = std::fs::read(report_path).map_err(ArtifactError::Archive)?;
    writer.start_file(REPORT_FILE_NAME, entry_options())?;
    writer.write_all(&report).map_err(ArtifactError::Archive)?;

    let mut image_entries = 0usize;
    for article in articles {
        let Some(name) = article.image_file.as_deref() else {
            continue;
        };
        let bytes = std::fs::read(images_dir.join(name)).map_err(ArtifactError::Archive)?;
        writer.start_file(format!("{IMAGES_PREFIX}{name}"), entry_options())?;
        writer.write_all(&bytes).map_err(ArtifactError::Archive)?;
        image_entries += 1;
    }

    writer.finish()?;
    info!(
        path = %archive_path.display(),
        image_entries,
        "Wrote archive"
    );
    Ok(archive_path)
}

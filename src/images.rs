//! Lead-image acquisition.
//!
//! Downloads each collected article's lead image and attaches the local
//! file name back onto the owning [`Article`]. Downloads are independent
//! plain fetches, so they run across a bounded worker pool; results are
//! attached by owning article, never by completion order, so report order
//! is unaffected.
//!
//! Failure policy: any download or write failure is logged and counted,
//! and the article simply proceeds without an image. Nothing here can
//! abort a run.

use std::collections::HashSet;
use std::path::Path;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::error::ImageError;
use crate::models::{Article, CollectionRun};

/// Worker-pool bound for simultaneous image downloads.
pub const DEFAULT_IMAGE_CONCURRENCY: usize = 6;

/// Backend that fetches raw image bytes for a URL.
///
/// [`HttpImageSource`] is the production implementation; tests substitute
/// canned sources.
pub trait ImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

/// [`ImageSource`] over HTTP via a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new(request_timeout: std::time::Duration) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("news_clipper/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::HttpStatus { status });
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ImageError::EmptyBody);
        }
        Ok(bytes.to_vec())
    }
}

/// Counts reported back to the run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImageStats {
    pub downloaded: usize,
    pub failed: usize,
}

/// Downloads lead images for a run and attaches local file names.
pub struct ImageFetcher<S> {
    source: S,
    concurrency: usize,
}

impl<S> ImageFetcher<S>
where
    S: ImageSource,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            concurrency: DEFAULT_IMAGE_CONCURRENCY,
        }
    }

    /// Download every article's lead image into `images_dir` and set
    /// `image_file` on the articles whose download and write both succeeded.
    ///
    /// `images_dir` must already exist. Articles without an image URL are
    /// untouched and count toward neither stat.
    #[instrument(level = "info", skip_all, fields(dir = %images_dir.display()))]
    pub async fn attach_images(&self, run: &mut CollectionRun, images_dir: &Path) -> ImageStats {
        let jobs = plan_downloads(run.articles());
        if jobs.is_empty() {
            info!("No images to download");
            return ImageStats::default();
        }

        let source = &self.source;
        let results: Vec<(usize, String, Result<(), ImageError>)> = stream::iter(jobs)
            .map(|job| async move {
                let DownloadJob { index, url, file_name } = job;
                let outcome = match source.fetch(&url).await {
                    Ok(bytes) => tokio::fs::write(images_dir.join(&file_name), bytes)
                        .await
                        .map_err(ImageError::from),
                    Err(e) => Err(e),
                };
                if let Err(e) = &outcome {
                    warn!(error = %e, %url, "Image download failed; continuing without it");
                } else {
                    debug!(%url, file = %file_name, "Stored image");
                }
                (index, file_name, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut stats = ImageStats::default();
        let articles = run.articles_mut();
        for (index, file_name, outcome) in results {
            match outcome {
                Ok(()) => {
                    articles[index].image_file = Some(file_name);
                    stats.downloaded += 1;
                }
                Err(_) => stats.failed += 1,
            }
        }

        info!(
            downloaded = stats.downloaded,
            failed = stats.failed,
            "Image downloads complete"
        );
        stats
    }
}

struct DownloadJob {
    index: usize,
    url: String,
    file_name: String,
}

/// Pair each image-bearing article with a unique local file name.
///
/// Names come from [`Article::image_file_name`]; on the rare collision
/// (distinct articles sharing a truncated slug and date) a numeric suffix
/// keeps entries from overwriting each other.
fn plan_downloads(articles: &[Article]) -> Vec<DownloadJob> {
    let mut taken = HashSet::new();
    let mut jobs = Vec::new();
    for (index, article) in articles.iter().enumerate() {
        let (Some(url), Some(name)) = (article.image_url.clone(), article.image_file_name())
        else {
            continue;
        };
        let file_name = claim_name(name, &mut taken);
        jobs.push(DownloadJob {
            index,
            url,
            file_name,
        });
    }
    jobs
}

fn claim_name(candidate: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(candidate.clone()) {
        return candidate;
    }
    let (stem, ext) = candidate
        .rsplit_once('.')
        .map(|(s, e)| (s.to_string(), Some(e.to_string())))
        .unwrap_or((candidate, None));
    let mut n = 2usize;
    loop {
        let variant = match &ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if taken.insert(variant.clone()) {
            return variant;
        }
        n += 1;
    }
}

//! Error taxonomy for the collection pipeline.
//!
//! Errors are split by component so the recovery policy is visible in the
//! types:
//!
//! - [`FetchError`]: page-level wait/render failures. Retryable by the
//!   pagination driver (bounded attempts); after that the run degrades to a
//!   recoverable failure carrying partial results.
//! - [`ExtractError`]: one result entry could not be normalized. The entry is
//!   skipped and the run continues.
//! - [`ImageError`]: one image download failed. The article proceeds without
//!   an image; never aborts the run.
//! - [`ArtifactError`]: report or archive could not be written. The only
//!   fatal class — there is no partial-output fallback for it.

use std::time::Duration;
use thiserror::Error;

/// Failure while rendering a page or waiting for its content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No element matched the selector before the wait window elapsed.
    #[error("timed out after {waited:?} waiting for `{selector}`")]
    Timeout { selector: String, waited: Duration },

    /// Singular lookup found zero matches by the end of the wait window.
    #[error("no element matched `{selector}` within {waited:?}")]
    NotFound { selector: String, waited: Duration },

    /// The rendering backend failed outright.
    #[error("page render failed: {0}")]
    Render(String),

    /// The page request completed with a non-success status.
    #[error("unexpected status {status} fetching page")]
    HttpStatus { status: reqwest::StatusCode },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One search-result entry could not be normalized into an `Article`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("entry is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable date text {0:?}")]
    UnparseableDate(String),
}

/// One lead-image download failed.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} fetching image")]
    HttpStatus { status: reqwest::StatusCode },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered but the body held no bytes to store.
    #[error("empty image body")]
    EmptyBody,
}

/// Report or archive write failure. Fatal: the run cannot produce its output.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("output directory unusable: {0}")]
    OutputDir(std::io::Error),

    #[error("report write failed: {0}")]
    Report(std::io::Error),

    #[error("archive write failed: {0}")]
    Archive(std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

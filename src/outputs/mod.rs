//! Output generation modules for the report and archive artifacts.
//!
//! This module contains submodules responsible for turning a finished
//! collection into its two artifacts:
//!
//! # Submodules
//!
//! - [`report`]: Writes the per-article CSV report
//! - [`archive`]: Bundles the report and downloaded images into one zip
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── report.csv
//! ├── images/
//! │   ├── 2024-03-10-markets-rally.jpg
//! │   └── ...
//! └── news_collection.zip    # report.csv + images/ entries
//! ```

pub mod archive;
pub mod report;

//! Search-result scraping pipeline stages.
//!
//! This module groups the three stages that turn a search URL into
//! collected articles:
//! - [`fetch`]: page rendering and blocking-wait element access
//! - [`extract`]: result-card parsing into [`crate::models::Article`]
//! - [`pagination`]: the cutoff-bounded page walk with retries

pub mod extract;
pub mod fetch;
pub mod pagination;

//! Data model for a single collection run.
//!
//! This module defines the core data structures passed between pipeline
//! stages:
//! - [`Article`]: one normalized news item with its derived columns
//! - [`SearchQuery`]: the search phrase and rolling date window
//! - [`CollectionRun`]: the ordered, deduplicated article aggregate for a run
//! - [`RunSummary`] / [`RunOutcome`]: what the caller gets back
//!
//! Derived fields (`search_phrase_count`, `contains_money`) are recomputed
//! from `title`/`description` at construction and are never set independently;
//! [`phrase_occurrences`] and [`mentions_money`] are the only sources of those
//! values.

use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::utils::slugify_title;

/// Currency-amount pattern: `$12`, `$12.34`, `$ 111,111.11`, `12 dollars`,
/// `45 USD`. Case-insensitive, matching the phrasings the report cares about.
static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\s?\d[\d,]*(\.\d+)?|\b\d+\s*dollars\b|\b\d+\s*usd\b")
        .expect("money pattern is valid")
});

/// Count non-overlapping, case-insensitive occurrences of `phrase` across
/// `title` and `description` joined with a single space.
///
/// An empty phrase counts as zero occurrences rather than matching at every
/// position.
pub fn phrase_occurrences(phrase: &str, title: &str, description: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    let haystack = format!("{} {}", title, description).to_lowercase();
    haystack.matches(&phrase.to_lowercase()).count()
}

/// True if `text` mentions a currency amount in any of the recognized forms.
pub fn mentions_money(text: &str) -> bool {
    MONEY_RE.is_match(text)
}

/// One collected news item.
///
/// Created by the extractor with derived columns computed immediately;
/// mutated only once afterwards, by the image stage attaching `image_file`.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Headline text. Never empty — extraction fails instead.
    pub title: String,
    /// Publication date at calendar-day precision.
    pub published_at: NaiveDate,
    /// Excerpt text; empty when the source listed none.
    pub description: String,
    /// Lead image URL as resolved from the result card, if any.
    pub image_url: Option<String>,
    /// Local image file name, set only after a successful download.
    pub image_file: Option<String>,
    /// Case-insensitive occurrences of the search phrase in title + description.
    pub search_phrase_count: usize,
    /// Whether title or description mentions a currency amount.
    pub contains_money: bool,
}

impl Article {
    /// Build an article, deriving `search_phrase_count` and `contains_money`
    /// from the supplied text fields.
    pub fn new(
        title: String,
        published_at: NaiveDate,
        description: String,
        image_url: Option<String>,
        phrase: &str,
    ) -> Self {
        let search_phrase_count = phrase_occurrences(phrase, &title, &description);
        let contains_money = mentions_money(&title) || mentions_money(&description);
        Self {
            title,
            published_at,
            description,
            image_url,
            image_file: None,
            search_phrase_count,
            contains_money,
        }
    }

    /// Stable identity used for pagination dedup and artifact naming:
    /// normalized title plus ISO date.
    pub fn dedup_key(&self) -> String {
        let normalized = self
            .title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        format!("{}|{}", normalized, self.published_at)
    }

    /// Deterministic local file name for the lead image, derived from the
    /// dedup key: `{date}-{slug}.{ext}`. `None` when the article has no
    /// image URL.
    pub fn image_file_name(&self) -> Option<String> {
        let url = self.image_url.as_deref()?;
        let mut slug = slugify_title(&self.title);
        // Cap the slug without splitting a multi-byte char.
        let mut end = slug.len().min(64);
        while !slug.is_char_boundary(end) {
            end -= 1;
        }
        slug.truncate(end);
        let slug = slug.trim_end_matches('-');
        Some(format!(
            "{}-{}.{}",
            self.published_at,
            slug,
            image_extension(url)
        ))
    }
}

/// File extension taken from the image URL path, defaulting to `jpg` when the
/// path carries nothing that looks like one.
fn image_extension(image_url: &str) -> String {
    let path = match url::Url::parse(image_url) {
        Ok(u) => u.path().to_string(),
        Err(_) => image_url.split('?').next().unwrap_or("").to_string(),
    };
    match path.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty()
                && ext.len() <= 4
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => "jpg".to_string(),
    }
}

/// The search phrase and rolling date window for one run.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Phrase to search for. Never empty — validated at input parsing.
    pub phrase: String,
    /// How many whole months back from the run month to collect. Zero means
    /// current-month-only collection.
    pub months_back: u32,
}

impl SearchQuery {
    pub fn new(phrase: impl Into<String>, months_back: u32) -> Self {
        Self {
            phrase: phrase.into(),
            months_back,
        }
    }

    /// Oldest admissible publication date:
    /// `first_day_of_month(run_date) - months_back months`.
    ///
    /// `months_back = 0` keeps the cutoff at the first day of the run month.
    pub fn cutoff_date(&self, run_date: NaiveDate) -> NaiveDate {
        let first_of_month = run_date
            .with_day(1)
            .expect("the first of a month is always a valid date");
        // Saturate rather than panic on absurd month counts.
        first_of_month
            .checked_sub_months(Months::new(self.months_back))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Ephemeral aggregate holding everything one run collects.
///
/// Insertion order is page-encounter order (newest first, matching the source
/// ordering); [`CollectionRun::admit`] is the single entry point and enforces
/// dedup-key uniqueness across pages.
#[derive(Debug)]
pub struct CollectionRun {
    pub query: SearchQuery,
    pub run_date: NaiveDate,
    pub cutoff_date: NaiveDate,
    articles: Vec<Article>,
    seen: HashSet<String>,
}

impl CollectionRun {
    pub fn new(query: SearchQuery, run_date: NaiveDate) -> Self {
        let cutoff_date = query.cutoff_date(run_date);
        Self {
            query,
            run_date,
            cutoff_date,
            articles: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append an article unless its dedup key has been seen before.
    /// Returns false (and drops the article) on a duplicate.
    pub fn admit(&mut self, article: Article) -> bool {
        if self.seen.insert(article.dedup_key()) {
            self.articles.push(article);
            true
        } else {
            false
        }
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn articles_mut(&mut self) -> &mut [Article] {
        &mut self.articles
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// How the pagination walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// An entry older than the cutoff was seen; the window is complete.
    CutoffReached,
    /// The source ran out of result pages before the cutoff.
    Exhausted,
    /// A page-level failure exhausted its retries (or the run deadline
    /// passed); whatever was collected up to that point is still emitted.
    Error,
}

/// Run result handed back to the caller, serialized as JSON on stdout.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub search_phrase: String,
    pub articles_collected: usize,
    pub images_downloaded: usize,
    pub images_failed: usize,
    pub outcome: RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

//! Search-result card extraction.
//!
//! This module parses one result card from the [Al Jazeera](https://www.aljazeera.com)
//! search page into an [`Article`]. Cards live under `.search-result__list`
//! and carry a title, a publication date, an optional excerpt, and an
//! optional lead image.
//!
//! # Date Formats
//!
//! Publication dates appear in several phrasings, all normalized to a
//! calendar date:
//! - Absolute: `5 Feb 2024`, optionally prefixed with `Last update` or
//!   `Published On`
//! - Relative, sub-day: `30 minutes ago`, `an hour ago` (rounded to the
//!   run date)
//! - Relative, whole days: `2 days ago`, `a day ago` (run date minus that
//!   many days)
//!
//! Entries whose date cannot be parsed are rejected with
//! [`ExtractError::UnparseableDate`]; the pagination driver skips them
//! rather than failing the page.

use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::ExtractError;
use crate::models::Article;
use crate::scrape::fetch::Element;

/// Container the search results render into; the wait target for each page.
pub const SEARCH_RESULTS_LIST: &str = ".search-result__list";
/// One result card within the list. A rendered but empty list means the
/// search simply has no (further) results.
pub const RESULT_CARD: &str = "article.gc";
/// The load-next-page control; its absence means the results are exhausted.
pub const SHOW_MORE_BUTTON: &str = "button.show-more-button";
/// Title node within a card.
pub const CARD_TITLE: &str = ".gc__title";
/// Publication-date node within a card.
pub const CARD_DATE: &str = ".gc__date";
/// Excerpt node within a card.
pub const CARD_EXCERPT: &str = ".gc__excerpt";
/// Lead image within a card.
pub const CARD_IMAGE: &str = "img.gc__image";

/// Labels a card may prepend to its date text.
const DATE_LABELS: [&str; 2] = ["last update", "published on"];

/// `N <unit> ago` phrasings for recent entries; `a`/`an` stand in for 1.
static RELATIVE_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+|an?)\s+(second|seconds|minute|minutes|hour|hours|day|days)\s+ago$")
        .expect("relative date pattern is valid")
});

/// Turns result cards into [`Article`]s for one run's phrase and run date.
#[derive(Debug, Clone)]
pub struct ArticleExtractor {
    phrase: String,
    run_date: NaiveDate,
}

impl ArticleExtractor {
    /// # Arguments
    ///
    /// * `phrase` - Search phrase used for the derived occurrence count
    /// * `run_date` - Anchor for relative date phrasings
    pub fn new(phrase: impl Into<String>, run_date: NaiveDate) -> Self {
        Self {
            phrase: phrase.into(),
            run_date,
        }
    }

    /// Extract one card into an [`Article`].
    ///
    /// The title and date are required; the excerpt defaults to empty and
    /// the image to `None`. Relative image URLs are resolved against
    /// `base_url`.
    ///
    /// # Errors
    ///
    /// [`ExtractError::MissingField`] when the title or date node is absent
    /// or empty; [`ExtractError::UnparseableDate`] when the date text fits
    /// no known phrasing.
    pub fn extract(&self, card: &Element, base_url: &Url) -> Result<Article, ExtractError> {
        let title = card
            .first(CARD_TITLE)
            .map(|el| normalize_whitespace(el.text()))
            .filter(|t| !t.is_empty())
            .ok_or(ExtractError::MissingField("title"))?;

        let date_text = card
            .first(CARD_DATE)
            .map(|el| normalize_whitespace(el.text()))
            .filter(|t| !t.is_empty())
            .ok_or(ExtractError::MissingField("date"))?;
        let published_at = parse_published_date(&date_text, self.run_date)?;

        let description = card
            .first(CARD_EXCERPT)
            .map(|el| normalize_whitespace(el.text()))
            .unwrap_or_default();

        let image_url = card
            .first(CARD_IMAGE)
            .and_then(|img| img.attr("src").map(str::to_string))
            .and_then(|src| base_url.join(&src).ok())
            .map(|u| u.to_string());

        Ok(Article::new(
            title,
            published_at,
            description,
            image_url,
            &self.phrase,
        ))
    }
}

/// Parse a card's date text into a calendar date.
///
/// Handles the label prefixes, the absolute `%d %b %Y` format, and relative
/// `N <unit> ago` phrasings anchored at `run_date`.
pub fn parse_published_date(raw: &str, run_date: NaiveDate) -> Result<NaiveDate, ExtractError> {
    let normalized = normalize_whitespace(raw);
    let text = strip_date_label(&normalized);

    if let Some(caps) = RELATIVE_DATE_RE.captures(text) {
        let count = &caps[1];
        let n: u64 = if count.eq_ignore_ascii_case("a") || count.eq_ignore_ascii_case("an") {
            1
        } else {
            count
                .parse()
                .map_err(|_| ExtractError::UnparseableDate(raw.trim().to_string()))?
        };
        let unit = caps[2].to_lowercase();
        let date = if unit.starts_with("day") {
            run_date.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN)
        } else {
            // Sub-day phrasings round to the run date itself.
            run_date
        };
        return Ok(date);
    }

    NaiveDate::parse_from_str(text, "%d %b %Y")
        .map_err(|_| ExtractError::UnparseableDate(raw.trim().to_string()))
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_date_label(s: &str) -> &str {
    for label in DATE_LABELS {
        if let Some(head) = s.get(..label.len()) {
            if head.eq_ignore_ascii_case(label) {
                return s[label.len()..].trim_start();
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::fetch::Page;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.aljazeera.com").unwrap()
    }

    fn card(html: &str) -> Element {
        let page = Page::new(html.to_string());
        page.select("article.gc")
            .into_iter()
            .next()
            .expect("test html contains a card")
    }

    const FULL_CARD: &str = r#"
        <div class="search-result__list">
          <article class="gc u-clickable-card">
            <h3 class="gc__title"><a href="/news/2024/3/1/story">Science funding doubled</a></h3>
            <div class="gc__date"><span>Published On 1 Mar 2024</span></div>
            <div class="gc__excerpt"><p>A big week for science budgets worth $2.5 million.</p></div>
            <img class="gc__image" src="/images/science.jpg?resize=570" alt="">
          </article>
        </div>"#;

    #[test]
    fn test_extract_full_card() {
        let extractor = ArticleExtractor::new("science", run_date());
        let article = extractor.extract(&card(FULL_CARD), &base()).unwrap();

        assert_eq!(article.title, "Science funding doubled");
        assert_eq!(
            article.published_at,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            article.description,
            "A big week for science budgets worth $2.5 million."
        );
        assert_eq!(
            article.image_url.as_deref(),
            Some("https://www.aljazeera.com/images/science.jpg?resize=570")
        );
        // Derived columns come along for free.
        assert_eq!(article.search_phrase_count, 2);
        assert!(article.contains_money);
        assert_eq!(article.image_file, None);
    }

    #[test]
    fn test_extract_missing_title_is_rejected() {
        let html = r#"
            <article class="gc">
              <div class="gc__date">1 Mar 2024</div>
            </article>"#;
        let extractor = ArticleExtractor::new("science", run_date());
        let err = extractor.extract(&card(html), &base()).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField("title")));
    }

    #[test]
    fn test_extract_missing_date_is_rejected() {
        let html = r#"
            <article class="gc">
              <h3 class="gc__title">Dateless story</h3>
            </article>"#;
        let extractor = ArticleExtractor::new("science", run_date());
        let err = extractor.extract(&card(html), &base()).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField("date")));
    }

    #[test]
    fn test_extract_unparseable_date_keeps_original_text() {
        let html = r#"
            <article class="gc">
              <h3 class="gc__title">Odd date</h3>
              <div class="gc__date">sometime soon</div>
            </article>"#;
        let extractor = ArticleExtractor::new("science", run_date());
        let err = extractor.extract(&card(html), &base()).unwrap_err();
        match err {
            ExtractError::UnparseableDate(text) => assert_eq!(text, "sometime soon"),
            other => panic!("expected unparseable date, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_defaults_for_optional_fields() {
        let html = r#"
            <article class="gc">
              <h3 class="gc__title">Bare story</h3>
              <div class="gc__date">2 Mar 2024</div>
            </article>"#;
        let extractor = ArticleExtractor::new("science", run_date());
        let article = extractor.extract(&card(html), &base()).unwrap();
        assert_eq!(article.description, "");
        assert_eq!(article.image_url, None);
    }

    #[test]
    fn test_extract_keeps_absolute_image_url() {
        let html = r#"
            <article class="gc">
              <h3 class="gc__title">Pictured story</h3>
              <div class="gc__date">2 Mar 2024</div>
              <img class="gc__image" src="https://cdn.example.net/a.png">
            </article>"#;
        let extractor = ArticleExtractor::new("science", run_date());
        let article = extractor.extract(&card(html), &base()).unwrap();
        assert_eq!(
            article.image_url.as_deref(),
            Some("https://cdn.example.net/a.png")
        );
    }

    #[test]
    fn test_parse_date_plain_absolute() {
        assert_eq!(
            parse_published_date("5 Feb 2024", run_date()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()
        );
    }

    #[test]
    fn test_parse_date_strips_labels() {
        assert_eq!(
            parse_published_date("Last update 5 Feb 2024", run_date()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()
        );
        assert_eq!(
            parse_published_date("Published On 15 Mar 2024", run_date()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_parse_date_relative_sub_day_rounds_to_run_date() {
        assert_eq!(
            parse_published_date("30 minutes ago", run_date()).unwrap(),
            run_date()
        );
        assert_eq!(
            parse_published_date("3 hours ago", run_date()).unwrap(),
            run_date()
        );
    }

    #[test]
    fn test_parse_date_relative_days_subtract() {
        assert_eq!(
            parse_published_date("2 days ago", run_date()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()
        );
        assert_eq!(
            parse_published_date("1 day ago", run_date()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
        );
    }

    #[test]
    fn test_parse_date_relative_article_words_mean_one() {
        assert_eq!(
            parse_published_date("an hour ago", run_date()).unwrap(),
            run_date()
        );
        assert_eq!(
            parse_published_date("a day ago", run_date()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
        );
    }

    #[test]
    fn test_parse_date_normalizes_whitespace() {
        assert_eq!(
            parse_published_date("  Last update   5 Feb  2024 ", run_date()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()
        );
    }
}

//! Cutoff-bounded pagination over search-result pages.
//!
//! [`PaginationDriver`] walks result pages newest-first, extracting every
//! card through [`ArticleExtractor`] and admitting articles into the run
//! until one of three terminal conditions:
//!
//! - **cutoff reached**: an entry older than the run's cutoff date appears.
//!   Results are listed newest-first, so everything after it is older still
//!   and the walk stops mid-page.
//! - **exhausted**: a page carries no next-page control, meaning the source
//!   has nothing further to show.
//! - **failed**: a page fetch kept failing after bounded retries, or the
//!   run deadline passed. The run keeps everything collected so far.
//!
//! # Retry Policy
//!
//! A failed page fetch is retried against the same page up to
//! [`MAX_PAGE_ATTEMPTS`] times total, with a linearly growing delay between
//! attempts. Extraction errors are never retried; the entry is skipped and
//! the walk continues.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::FetchError;
use crate::models::{CollectionRun, RunOutcome};
use crate::scrape::extract::{ArticleExtractor, RESULT_CARD, SEARCH_RESULTS_LIST, SHOW_MORE_BUTTON};
use crate::scrape::fetch::{Element, PageRenderer, WaitingFetcher};
use crate::utils::truncate_for_log;

/// Fetch attempts per page before the run degrades to a recoverable failure.
pub const MAX_PAGE_ATTEMPTS: usize = 3;

/// Delay before the first retry; later retries wait a linear multiple of it.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Where the walk currently stands.
enum DriveState {
    /// About to fetch the current page of results.
    Fetching,
    /// Consuming the cards of a fetched page.
    Extracting(Vec<Element>),
    /// Saw an entry older than the cutoff; the window is complete.
    CutoffReached,
    /// No next-page control was present after the last page.
    Exhausted,
    /// Retries exhausted or deadline passed, with the reason.
    Failed(String),
}

/// What one full page walk produced, beyond the articles themselves.
#[derive(Debug)]
pub struct DriveOutcome {
    pub outcome: RunOutcome,
    pub pages_visited: usize,
    pub skipped_entries: usize,
    pub duplicate_entries: usize,
    /// Present only for [`RunOutcome::Error`], describing the failure.
    pub warning: Option<String>,
}

/// Drives the page walk for one run.
pub struct PaginationDriver<R> {
    fetcher: WaitingFetcher<R>,
    base_url: Url,
    max_attempts: usize,
    retry_base_delay: Duration,
}

impl<R> PaginationDriver<R>
where
    R: PageRenderer,
{
    pub fn new(fetcher: WaitingFetcher<R>, base_url: Url) -> Self {
        Self {
            fetcher,
            base_url,
            max_attempts: MAX_PAGE_ATTEMPTS,
            retry_base_delay: RETRY_BASE_DELAY,
        }
    }

    /// Walk result pages for `run`'s query until a terminal state, admitting
    /// articles into `run` as they are extracted.
    ///
    /// `deadline`, when set, is checked before each page fetch; exceeding it
    /// ends the walk as a recoverable failure with partial results intact.
    #[instrument(level = "info", skip_all, fields(phrase = %run.query.phrase))]
    pub async fn drive(
        &mut self,
        run: &mut CollectionRun,
        deadline: Option<Instant>,
    ) -> DriveOutcome {
        let phrase = run.query.phrase.clone();
        let extractor = ArticleExtractor::new(phrase.clone(), run.run_date);

        let mut page = 1usize;
        let mut pages_visited = 0usize;
        let mut skipped_entries = 0usize;
        let mut duplicate_entries = 0usize;
        let mut state = DriveState::Fetching;

        let (outcome, warning) = loop {
            state = match state {
                DriveState::Fetching => {
                    let deadline_hit = deadline.map(|d| Instant::now() >= d).unwrap_or(false);
                    if deadline_hit {
                        DriveState::Failed(format!(
                            "run deadline reached after {pages_visited} pages"
                        ))
                    } else {
                        match self.fetch_page_with_retries(&phrase, page).await {
                            Ok(cards) => {
                                pages_visited += 1;
                                info!(page, cards = cards.len(), "Fetched result page");
                                DriveState::Extracting(cards)
                            }
                            Err(e) => DriveState::Failed(format!(
                                "page {page} failed after {} attempts: {e}",
                                self.max_attempts
                            )),
                        }
                    }
                }
                DriveState::Extracting(cards) => {
                    let mut next = None;
                    for card in &cards {
                        match extractor.extract(card, &self.base_url) {
                            Err(e) => {
                                skipped_entries += 1;
                                warn!(
                                    error = %e,
                                    page,
                                    card_preview = %truncate_for_log(card.text(), 120),
                                    "Skipping malformed entry"
                                );
                            }
                            Ok(article) if article.published_at > run.run_date => {
                                // Pinned or clock-skewed entries say nothing
                                // about the cutoff; skip without stopping.
                                skipped_entries += 1;
                                warn!(
                                    published = %article.published_at,
                                    "Skipping future-dated entry"
                                );
                            }
                            Ok(article) if article.published_at < run.cutoff_date => {
                                info!(
                                    published = %article.published_at,
                                    cutoff = %run.cutoff_date,
                                    "Entry is older than the cutoff; stopping"
                                );
                                next = Some(DriveState::CutoffReached);
                                break;
                            }
                            Ok(article) => {
                                if !run.admit(article) {
                                    duplicate_entries += 1;
                                    debug!(page, "Duplicate entry dropped");
                                }
                            }
                        }
                    }
                    match next {
                        Some(terminal) => terminal,
                        None if self.fetcher.try_elements(SHOW_MORE_BUTTON).is_empty() => {
                            info!(page, "No further results offered");
                            DriveState::Exhausted
                        }
                        None => {
                            page += 1;
                            DriveState::Fetching
                        }
                    }
                }
                DriveState::CutoffReached => break (RunOutcome::CutoffReached, None),
                DriveState::Exhausted => break (RunOutcome::Exhausted, None),
                DriveState::Failed(reason) => {
                    error!(
                        reason = %reason,
                        collected = run.len(),
                        "Page walk failed; keeping partial results"
                    );
                    break (RunOutcome::Error, Some(reason));
                }
            };
        };

        info!(
            ?outcome,
            articles = run.len(),
            pages_visited,
            skipped_entries,
            duplicate_entries,
            "Page walk finished"
        );
        DriveOutcome {
            outcome,
            pages_visited,
            skipped_entries,
            duplicate_entries,
            warning,
        }
    }

    /// Fetch one result page, retrying with linear backoff on failure.
    ///
    /// Waits for the results list to render, then collects the cards inside
    /// it. An empty card set is a valid answer (the search has nothing more
    /// to show), not a failure.
    async fn fetch_page_with_retries(
        &mut self,
        phrase: &str,
        page: usize,
    ) -> Result<Vec<Element>, FetchError> {
        let url = self.page_url(phrase, page);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.fetcher.await_element(&url, SEARCH_RESULTS_LIST).await {
                Ok(list) => return Ok(list.select(RESULT_CARD)),
                Err(e) if attempt >= self.max_attempts => {
                    error!(
                        attempt,
                        max = self.max_attempts,
                        error = %e,
                        %url,
                        "Page fetch exhausted retries"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.retry_base_delay * attempt as u32;
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        ?delay,
                        error = %e,
                        "Page fetch failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Search URL for one page of date-sorted results.
    fn page_url(&self, phrase: &str, page: usize) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/search/{}", urlencoding::encode(phrase)));
        url.query_pairs_mut()
            .clear()
            .append_pair("sort", "date")
            .append_pair("page", &page.to_string());
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchQuery;
    use chrono::NaiveDate;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fake site serving scripted responses per page number; the last
    /// scripted response for a page repeats forever.
    struct FakeSite {
        pages: Mutex<HashMap<usize, VecDeque<Result<String, String>>>>,
        renders: Arc<AtomicUsize>,
        render_delay: Duration,
    }

    impl FakeSite {
        fn new(pages: Vec<(usize, Vec<Result<String, String>>)>) -> Self {
            let pages = pages
                .into_iter()
                .map(|(n, responses)| (n, responses.into_iter().collect()))
                .collect();
            Self {
                pages: Mutex::new(pages),
                renders: Arc::new(AtomicUsize::new(0)),
                render_delay: Duration::ZERO,
            }
        }

        fn with_render_delay(mut self, delay: Duration) -> Self {
            self.render_delay = delay;
            self
        }

        /// Counter handle that stays observable after the site moves into
        /// the driver.
        fn render_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.renders)
        }

        fn page_number(url: &Url) -> usize {
            url.query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(1)
        }
    }

    impl PageRenderer for FakeSite {
        async fn render(&self, url: &Url) -> Result<String, FetchError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            if self.render_delay > Duration::ZERO {
                sleep(self.render_delay).await;
            }
            let page = Self::page_number(url);
            let mut pages = self.pages.lock().unwrap();
            let responses = pages.get_mut(&page);
            let next = match responses {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            };
            match next {
                Some(Ok(html)) => Ok(html),
                Some(Err(msg)) => Err(FetchError::Render(msg)),
                None => Err(FetchError::Render(format!("page {page} not scripted"))),
            }
        }
    }

    fn card(title: &str, date: &str) -> String {
        format!(
            r#"<article class="gc u-clickable-card">
                 <h3 class="gc__title"><a href="/news/latest">{title}</a></h3>
                 <div class="gc__date"><span>{date}</span></div>
                 <div class="gc__excerpt"><p>About {title}</p></div>
               </article>"#
        )
    }

    fn page(cards: &[String], has_more: bool) -> String {
        let more = if has_more {
            r#"<button class="show-more-button grid-full-width">Show more</button>"#
        } else {
            ""
        };
        format!(
            r#"<div class="search-result__list">{}</div>{more}"#,
            cards.join("")
        )
    }

    fn driver(site: FakeSite) -> PaginationDriver<FakeSite> {
        let fetcher = WaitingFetcher::new(site, Duration::ZERO, Duration::from_millis(1));
        PaginationDriver {
            fetcher,
            base_url: Url::parse("https://news.example.com").unwrap(),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
        }
    }

    fn run(months_back: u32) -> CollectionRun {
        CollectionRun::new(
            SearchQuery::new("science", months_back),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        )
    }

    fn titles(run: &CollectionRun) -> Vec<&str> {
        run.articles().iter().map(|a| a.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_drive_stops_at_cutoff_mid_page() {
        // Cutoff for months_back=1 at run date 2024-03-15 is 2024-02-01.
        let site = FakeSite::new(vec![(
            1,
            vec![Ok(page(
                &[
                    card("Fresh story", "10 Mar 2024"),
                    card("February story", "15 Feb 2024"),
                    card("January story", "31 Jan 2024"),
                    card("Never reached", "20 Feb 2024"),
                ],
                true,
            ))],
        )]);
        let mut run = run(1);
        let outcome = driver(site).drive(&mut run, None).await;

        assert_eq!(outcome.outcome, RunOutcome::CutoffReached);
        assert_eq!(titles(&run), vec!["Fresh story", "February story"]);
        assert_eq!(outcome.pages_visited, 1);
        for a in run.articles() {
            assert!(a.published_at >= run.cutoff_date);
            assert!(a.published_at <= run.run_date);
        }
    }

    #[tokio::test]
    async fn test_drive_follows_pages_until_exhausted() {
        let site = FakeSite::new(vec![
            (
                1,
                vec![Ok(page(
                    &[card("First", "10 Mar 2024"), card("Second", "9 Mar 2024")],
                    true,
                ))],
            ),
            (2, vec![Ok(page(&[card("Third", "8 Mar 2024")], false))]),
        ]);
        let mut run = run(1);
        let outcome = driver(site).drive(&mut run, None).await;

        assert_eq!(outcome.outcome, RunOutcome::Exhausted);
        assert_eq!(titles(&run), vec!["First", "Second", "Third"]);
        assert_eq!(outcome.pages_visited, 2);
        assert_eq!(outcome.skipped_entries, 0);
    }

    #[tokio::test]
    async fn test_drive_treats_empty_result_list_as_exhausted() {
        // The list container rendered but holds nothing: a zero-result
        // search, not a failure.
        let site = FakeSite::new(vec![(1, vec![Ok(page(&[], false))])]);
        let mut run = run(0);
        let outcome = driver(site).drive(&mut run, None).await;

        assert_eq!(outcome.outcome, RunOutcome::Exhausted);
        assert!(run.is_empty());
        assert_eq!(outcome.pages_visited, 1);
        assert!(outcome.warning.is_none());
    }

    #[tokio::test]
    async fn test_drive_dedups_overlapping_pages() {
        let site = FakeSite::new(vec![
            (
                1,
                vec![Ok(page(
                    &[card("Alpha", "10 Mar 2024"), card("Beta", "9 Mar 2024")],
                    true,
                ))],
            ),
            (
                2,
                vec![Ok(page(
                    &[card("Beta", "9 Mar 2024"), card("Gamma", "8 Mar 2024")],
                    false,
                ))],
            ),
        ]);
        let mut run = run(1);
        let outcome = driver(site).drive(&mut run, None).await;

        assert_eq!(outcome.outcome, RunOutcome::Exhausted);
        assert_eq!(titles(&run), vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(outcome.duplicate_entries, 1);
    }

    #[tokio::test]
    async fn test_drive_errors_after_retries_and_keeps_partial_results() {
        let site = FakeSite::new(vec![
            (
                1,
                vec![Ok(page(&[card("Survivor", "10 Mar 2024")], true))],
            ),
            (2, vec![Err("connection reset".to_string())]),
        ]);
        let renders = site.render_counter();
        let mut run = run(1);
        let outcome = driver(site).drive(&mut run, None).await;

        assert_eq!(outcome.outcome, RunOutcome::Error);
        assert_eq!(titles(&run), vec!["Survivor"]);
        assert_eq!(outcome.pages_visited, 1);
        let warning = outcome.warning.unwrap();
        assert!(warning.contains("page 2"));
        assert!(warning.contains("3 attempts"));
        // One render for page 1, three failed attempts for page 2.
        assert_eq!(renders.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_drive_skips_malformed_entries_and_continues() {
        let bad_date = card("Odd one", "someday soon");
        let no_title = r#"<article class="gc"><div class="gc__date">9 Mar 2024</div></article>"#
            .to_string();
        let site = FakeSite::new(vec![(
            1,
            vec![Ok(page(
                &[
                    card("Good one", "10 Mar 2024"),
                    bad_date,
                    no_title,
                    card("Also good", "8 Mar 2024"),
                ],
                false,
            ))],
        )]);
        let mut run = run(1);
        let outcome = driver(site).drive(&mut run, None).await;

        assert_eq!(outcome.outcome, RunOutcome::Exhausted);
        assert_eq!(titles(&run), vec!["Good one", "Also good"]);
        assert_eq!(outcome.skipped_entries, 2);
    }

    #[tokio::test]
    async fn test_drive_skips_future_dated_entries_without_stopping() {
        let site = FakeSite::new(vec![(
            1,
            vec![Ok(page(
                &[
                    card("Pinned from the future", "2 Apr 2024"),
                    card("Current", "10 Mar 2024"),
                    card("Ancient", "31 Jan 2024"),
                ],
                true,
            ))],
        )]);
        let mut run = run(1);
        let outcome = driver(site).drive(&mut run, None).await;

        // The future-dated entry neither stops the walk nor lands in the run.
        assert_eq!(outcome.outcome, RunOutcome::CutoffReached);
        assert_eq!(titles(&run), vec!["Current"]);
        assert_eq!(outcome.skipped_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_deadline_ends_walk_with_partial_results() {
        let site = FakeSite::new(vec![
            (
                1,
                vec![Ok(page(&[card("Early bird", "10 Mar 2024")], true))],
            ),
            (2, vec![Ok(page(&[card("Too late", "9 Mar 2024")], false))]),
        ])
        .with_render_delay(Duration::from_millis(10));
        let mut run = run(1);
        // Page 1's render alone outlives the deadline, so the walk must stop
        // before ever requesting page 2. Paused time makes the ordering
        // exact: the render advances the clock by precisely its delay.
        let deadline = Instant::now() + Duration::from_millis(5);
        let outcome = driver(site).drive(&mut run, Some(deadline)).await;

        assert_eq!(outcome.outcome, RunOutcome::Error);
        assert_eq!(titles(&run), vec!["Early bird"]);
        assert_eq!(outcome.pages_visited, 1);
        assert!(outcome.warning.unwrap().contains("deadline"));
    }

    #[test]
    fn test_page_url_encodes_phrase_and_page() {
        let site = FakeSite::new(vec![]);
        let driver = driver(site);
        let url = driver.page_url("climate change", 2);
        assert_eq!(
            url.as_str(),
            "https://news.example.com/search/climate%20change?sort=date&page=2"
        );
    }
}

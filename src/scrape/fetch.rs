//! Page rendering and blocking-wait element access.
//!
//! Search-result pages load their content dynamically, so a single request
//! is not guaranteed to contain the elements the pipeline needs. This module
//! provides the waiting layer that bridges that gap:
//! - [`PageRenderer`]: backend trait producing fully-rendered HTML for a URL
//! - [`HttpRenderer`]: the plain-HTTP implementation used in production
//! - [`Page`] / [`Element`]: owned snapshots that can be queried by CSS
//!   selector without holding a live parser
//! - [`WaitingFetcher`]: re-renders and polls until a selector matches or
//!   the wait window expires
//!
//! # Waiting Model
//!
//! `await_elements` re-renders the page on an interval until the selector
//! matches at least once, then snapshots the page as the current session
//! state. `try_elements` probes that snapshot without waiting, for cases
//! where absence is an answer rather than a failure (e.g. "is there a
//! next-page control?").

use std::collections::HashMap;
use std::time::{Duration, Instant};

use scraper::{ElementRef, Html, Selector};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::FetchError;

/// Backend that turns a URL into fully-rendered HTML.
///
/// The production implementation is [`HttpRenderer`]; tests script their own.
/// A headless-browser backend would also slot in here, mapping its failures
/// to [`FetchError::Render`].
pub trait PageRenderer {
    /// Fetch and render the page at `url`, returning its HTML.
    async fn render(&self, url: &Url) -> Result<String, FetchError>;
}

/// [`PageRenderer`] over plain HTTP via a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    /// Build a renderer with its own HTTP client.
    ///
    /// # Arguments
    ///
    /// * `request_timeout` - Per-request timeout covering connect through body
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("news_clipper/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl PageRenderer for HttpRenderer {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn render(&self, url: &Url) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Page request was refused");
            return Err(FetchError::HttpStatus { status });
        }
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Render(format!("body read failed: {e}")))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Rendered page"
        );
        Ok(body)
    }
}

/// An owned snapshot of a rendered page, queryable by CSS selector.
///
/// The snapshot stores raw HTML and parses on each query, so it stays `Send`
/// and can cross await points freely.
#[derive(Debug, Clone)]
pub struct Page {
    html: String,
}

impl Page {
    pub fn new(html: String) -> Self {
        Self { html }
    }

    /// All elements matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> Vec<Element> {
        let sel = Selector::parse(selector).expect("selector is valid CSS");
        let document = Html::parse_document(&self.html);
        document.select(&sel).map(Element::from_ref).collect()
    }
}

/// One matched element, detached from its page.
///
/// Carries the element's outer HTML (for nested queries), its joined text
/// content, and its attributes.
#[derive(Debug, Clone)]
pub struct Element {
    html: String,
    text: String,
    attrs: HashMap<String, String>,
}

impl Element {
    fn from_ref(el: ElementRef<'_>) -> Self {
        let attrs = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            html: el.html(),
            text: el.text().collect::<Vec<_>>().join(" "),
            attrs,
        }
    }

    /// The element's text content, joined across descendants.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// An attribute value, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Descendants (including self) matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> Vec<Element> {
        let sel = Selector::parse(selector).expect("selector is valid CSS");
        let fragment = Html::parse_fragment(&self.html);
        fragment.select(&sel).map(Element::from_ref).collect()
    }

    /// First descendant matching `selector`.
    pub fn first(&self, selector: &str) -> Option<Element> {
        self.select(selector).into_iter().next()
    }
}

/// Element access with a bounded blocking wait.
///
/// Holds the renderer plus the most recent page snapshot, which stands in
/// for the browsing session: waiting calls refresh it, probing calls read it.
pub struct WaitingFetcher<R> {
    renderer: R,
    wait_timeout: Duration,
    poll_interval: Duration,
    current: Option<Page>,
}

impl<R> WaitingFetcher<R>
where
    R: PageRenderer,
{
    /// # Arguments
    ///
    /// * `renderer` - Backend producing rendered HTML
    /// * `wait_timeout` - Longest a single wait may block
    /// * `poll_interval` - Delay between re-render attempts while waiting
    pub fn new(renderer: R, wait_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            renderer,
            wait_timeout,
            poll_interval,
            current: None,
        }
    }

    /// Navigate to `url` and block until `selector` matches at least one
    /// element, re-rendering on the poll interval.
    ///
    /// Always makes at least one render attempt, even with a zero timeout.
    /// On success the page becomes the current session snapshot.
    ///
    /// # Errors
    ///
    /// [`FetchError::Timeout`] when the page rendered but the selector never
    /// appeared within the wait window; the last render error when no render
    /// succeeded at all.
    #[instrument(level = "info", skip_all, fields(%url, selector))]
    pub async fn await_elements(
        &mut self,
        url: &Url,
        selector: &str,
    ) -> Result<Vec<Element>, FetchError> {
        let t0 = Instant::now();
        let mut rendered_once = false;
        let mut last_render_err: Option<FetchError> = None;

        loop {
            match self.renderer.render(url).await {
                Ok(html) => {
                    rendered_once = true;
                    let page = Page::new(html);
                    let found = page.select(selector);
                    // Keep the freshest snapshot either way.
                    self.current = Some(page);
                    if !found.is_empty() {
                        debug!(
                            count = found.len(),
                            elapsed_ms = t0.elapsed().as_millis() as u64,
                            "Selector matched"
                        );
                        return Ok(found);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Render attempt failed while waiting");
                    last_render_err = Some(e);
                }
            }

            let waited = t0.elapsed();
            if waited >= self.wait_timeout {
                return Err(match (rendered_once, last_render_err) {
                    (false, Some(e)) => e,
                    _ => FetchError::Timeout {
                        selector: selector.to_string(),
                        waited,
                    },
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Like [`WaitingFetcher::await_elements`] but yields only the first
    /// match, and reports an expired wait as [`FetchError::NotFound`].
    pub async fn await_element(&mut self, url: &Url, selector: &str) -> Result<Element, FetchError> {
        match self.await_elements(url, selector).await {
            Ok(found) => {
                let waited = self.wait_timeout;
                found.into_iter().next().ok_or_else(|| FetchError::NotFound {
                    selector: selector.to_string(),
                    waited,
                })
            }
            Err(FetchError::Timeout { selector, waited }) => {
                Err(FetchError::NotFound { selector, waited })
            }
            Err(e) => Err(e),
        }
    }

    /// Probe the current session snapshot without waiting or re-rendering.
    ///
    /// Returns an empty vector when nothing matches or no page has been
    /// loaded yet; absence here is data, not an error.
    pub fn try_elements(&self, selector: &str) -> Vec<Element> {
        self.current
            .as_ref()
            .map(|p| p.select(selector))
            .unwrap_or_default()
    }
}

//! Render client boundary.
//!
//! The pipeline only needs one capability from a browser: load a URL and let
//! read-only extraction functions run against the resulting document. This
//! module defines that boundary ([`RenderClient`] and [`RenderedPage`]), an
//! HTTP implementation of it, and the retry loop every navigation goes
//! through.

pub mod http;
pub mod retry;

use scraper::Html;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::HarvestError;
use crate::utils::contain_fault;

pub use http::HttpRenderClient;
pub use retry::{RetryPolicy, render_with_retry};

/// Loads pages. One call, one independent document.
pub trait RenderClient {
    /// Navigate to `url`, giving up after `timeout`.
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, HarvestError>;
}

/// A loaded document.
///
/// Holds the final URL (after redirects) and the markup. Each evaluation
/// parses its own DOM, so a page can be handed to extraction code without
/// sharing mutable state with anything else.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: Url,
    pub html: String,
}

impl RenderedPage {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }

    /// Evaluate an extraction function against the document.
    ///
    /// A panic inside `f` is reported as [`HarvestError::Evaluation`].
    pub fn evaluate<T>(&self, f: impl FnOnce(&Html, &Url) -> T) -> Result<T, HarvestError> {
        contain_fault(|| {
            let document = Html::parse_document(&self.html);
            f(&document, &self.url)
        })
        .map_err(HarvestError::Evaluation)
    }
}

/// Navigation settings shared by every render call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    pub user_agent: String,
    /// URL path suffixes that are never requested (images, fonts, media).
    pub blocked_resources: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            user_agent: format!("news_harvest/{}", env!("CARGO_PKG_VERSION")),
            blocked_resources: [
                ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".css", ".woff", ".woff2", ".mp4",
                ".mp3", ".pdf",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

impl RenderOptions {
    pub fn is_blocked(&self, url: &Url) -> bool {
        let path = url.path().to_lowercase();
        self.blocked_resources
            .iter()
            .any(|suffix| !suffix.is_empty() && path.ends_with(&suffix.to_lowercase()))
    }
}

#[cfg(test)]
pub mod testing {
    //! In-process render client for pipeline tests.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    fn key(url: &str) -> String {
        Url::parse(url).expect("test URL must parse").to_string()
    }

    /// Serves canned pages and fails on demand, counting calls per URL.
    #[derive(Default)]
    pub struct FakeClient {
        pages: HashMap<String, String>,
        failures: HashMap<String, u32>,
        always_fail: HashSet<String>,
        delays: HashMap<String, Duration>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl FakeClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(key(url), html.to_string());
            self
        }

        /// Fail the first `times` calls for `url` with a transient error.
        pub fn failing_times(mut self, url: &str, times: u32) -> Self {
            self.failures.insert(key(url), times);
            self
        }

        pub fn always_failing(mut self, url: &str) -> Self {
            self.always_fail.insert(key(url));
            self
        }

        pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(key(url), delay);
            self
        }

        pub fn calls(&self, url: &str) -> u32 {
            self.calls.lock().unwrap().get(&key(url)).copied().unwrap_or(0)
        }
    }

    impl RenderClient for FakeClient {
        async fn render(
            &self,
            url: &Url,
            _timeout: Duration,
        ) -> Result<RenderedPage, HarvestError> {
            let key = url.to_string();
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(key.clone()).or_default();
                *count += 1;
                *count
            };
            if let Some(delay) = self.delays.get(&key) {
                tokio::time::sleep(*delay).await;
            }
            let scripted_failures = self.failures.get(&key).copied().unwrap_or(0);
            if self.always_fail.contains(&key) || call <= scripted_failures {
                return Err(HarvestError::Navigation {
                    url: key,
                    reason: "connection reset".to_string(),
                    transient: true,
                });
            }
            match self.pages.get(&key) {
                Some(html) => Ok(RenderedPage::new(url.clone(), html.clone())),
                None => Err(HarvestError::Navigation {
                    url: key,
                    reason: "HTTP 404 Not Found".to_string(),
                    transient: false,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_runs_against_parsed_document() {
        let page = RenderedPage::new(
            Url::parse("https://example.com/").unwrap(),
            "<html><body><h1>Hi</h1></body></html>",
        );
        let title = page
            .evaluate(|doc, url| {
                let h1 = scraper::Selector::parse("h1").unwrap();
                (doc.select(&h1).next().map(|e| e.inner_html()), url.host_str().map(str::to_string))
            })
            .unwrap();
        assert_eq!(title, (Some("Hi".to_string()), Some("example.com".to_string())));
    }

    #[test]
    fn test_evaluate_contains_panics() {
        let page = RenderedPage::new(Url::parse("https://example.com/").unwrap(), "<p></p>");
        let result: Result<(), _> = page.evaluate(|_, _| panic!("null field"));
        match result {
            Err(HarvestError::Evaluation(msg)) => assert_eq!(msg, "null field"),
            other => panic!("expected evaluation fault, got {:?}", other),
        }
    }

    #[test]
    fn test_blocked_resources() {
        let opts = RenderOptions::default();
        assert!(opts.is_blocked(&Url::parse("https://cdn.example.com/img/photo.JPG").unwrap()));
        assert!(opts.is_blocked(&Url::parse("https://example.com/files/report.pdf?x=1").unwrap()));
        assert!(!opts.is_blocked(&Url::parse("https://example.com/news/2025/story").unwrap()));
        assert!(!opts.is_blocked(&Url::parse("https://example.com/news/story.html").unwrap()));
    }
}

//! Article detail fetching.
//!
//! Each stub's page is rendered (with retry) and read through the content
//! cascade. A stub whose page cannot be acquired still yields a record: the
//! listing fields plus an `error`, never a gap in the output. Pages are
//! fetched concurrently up to a fixed cap and the results are put back in
//! listing order.

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use scraper::Html;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::classify::CategoryClassifier;
use crate::error::HarvestError;
use crate::extract::ContentCascade;
use crate::extract::compiled::get_or_compile;
use crate::models::{ArticleRecord, ArticleStub, ErrorLogEntry};
use crate::render::{RenderClient, RetryPolicy, render_with_retry};
use crate::utils::{normalize_whitespace, resolve_link};

/// Fields read from an article page. `None` means the cascade found nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDetails {
    pub content: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub published_at: Option<String>,
    pub image_url: Option<String>,
    pub summary: Option<String>,
    pub has_video: bool,
}

/// A fetched record and, when something went wrong, the error-log entry
/// describing it.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub record: ArticleRecord,
    pub failure: Option<ErrorLogEntry>,
}

/// Records for a whole listing, in listing order.
#[derive(Debug, Clone, Default)]
pub struct DetailBatch {
    pub records: Vec<ArticleRecord>,
    pub failures: Vec<ErrorLogEntry>,
}

pub struct DetailFetcher<'a, C> {
    pub client: &'a C,
    pub cascade: &'a ContentCascade,
    pub classifier: &'a CategoryClassifier,
    pub policy: RetryPolicy,
    /// Per-navigation timeout
    pub timeout: Duration,
    /// Author used when the page names none
    pub site_name: &'a str,
}

impl<'a, C: RenderClient> DetailFetcher<'a, C> {
    /// Fetch one article. Never fails: an unreachable page gives a degraded
    /// record, with the error-log entry explaining why.
    #[instrument(level = "info", skip_all, fields(url = %stub.url))]
    pub async fn fetch_details(&self, stub: &ArticleStub) -> FetchOutcome {
        let category = self
            .classifier
            .resolve(&stub.url, stub.category_hint.as_deref());

        let url = match Url::parse(&stub.url) {
            Ok(url) => url,
            Err(source) => {
                let e = HarvestError::InvalidUrl {
                    url: stub.url.clone(),
                    source,
                };
                return self.degraded(stub, category, e);
            }
        };

        let page = match render_with_retry(self.client, &url, &self.policy, self.timeout).await {
            Ok(page) => page,
            Err(e) => return self.degraded(stub, category, e),
        };

        let record = ArticleRecord::from_stub(stub, category, self.site_name);
        match page.evaluate(|document, base| extract_details(document, base, self.cascade)) {
            Ok(details) => {
                debug!(
                    content_chars = details
                        .content
                        .as_deref()
                        .map(|c| c.chars().count())
                        .unwrap_or(0),
                    tags = details.tags.len(),
                    has_video = details.has_video,
                    "Extracted article details"
                );
                FetchOutcome {
                    record: merge(record, details),
                    failure: None,
                }
            }
            Err(e) => {
                // The page loaded; a fault while reading it is a miss, not a failure
                warn!(error = %e, "Article evaluation faulted; keeping listing fields only");
                FetchOutcome {
                    record,
                    failure: Some(ErrorLogEntry::new(
                        "Article evaluation faulted",
                        stub.url.clone(),
                        e.trace(),
                    )),
                }
            }
        }
    }

    fn degraded(&self, stub: &ArticleStub, category: String, e: HarvestError) -> FetchOutcome {
        warn!(url = %stub.url, error = %e, "Article details unavailable; emitting degraded record");
        FetchOutcome {
            record: ArticleRecord::degraded(stub, category, self.site_name, e.to_string()),
            failure: Some(ErrorLogEntry::new(
                "Failed to fetch article details",
                stub.url.clone(),
                e.trace(),
            )),
        }
    }

    /// Fetch every stub with at most `concurrency` pages in flight.
    ///
    /// The output has exactly one record per stub, in stub order, whatever
    /// order the fetches complete in.
    #[instrument(level = "info", skip_all, fields(total = stubs.len(), concurrency = concurrency))]
    pub async fn fetch_all(&self, stubs: &[ArticleStub], concurrency: usize) -> DetailBatch {
        let total = stubs.len();
        let mut slots: Vec<Option<FetchOutcome>> = vec![None; total];
        let mut completed = 0usize;
        let mut degraded = 0usize;

        let mut in_flight = stream::iter(stubs.iter().enumerate())
            .map(|(index, stub)| async move { (index, self.fetch_details(stub).await) })
            .buffer_unordered(concurrency.max(1));

        while let Some((index, outcome)) = in_flight.next().await {
            completed += 1;
            if outcome.record.is_degraded() {
                degraded += 1;
            }
            info!(
                completed,
                total,
                degraded,
                url = %outcome.record.url,
                "Article processed"
            );
            slots[index] = Some(outcome);
        }

        let mut batch = DetailBatch::default();
        for outcome in slots.into_iter().flatten() {
            batch.failures.extend(outcome.failure);
            batch.records.push(outcome.record);
        }
        info!(
            count = batch.records.len(),
            degraded,
            "Fetched article details"
        );
        batch
    }
}

/// Overlay page details on a listing-derived record. Page values win; listing
/// hints fill the gaps.
fn merge(record: ArticleRecord, details: ArticleDetails) -> ArticleRecord {
    ArticleRecord {
        content: details.content.unwrap_or_default(),
        author: details.author.unwrap_or(record.author),
        tags: details.tags,
        published_at: details.published_at.or(record.published_at),
        image_url: details.image_url.or(record.image_url),
        summary: details.summary.or(record.summary),
        has_video: details.has_video,
        ..record
    }
}

/// Run the content cascade over an article document.
pub fn extract_details(document: &Html, base: &Url, cascade: &ContentCascade) -> ArticleDetails {
    let root = document.root_element();
    ArticleDetails {
        content: cascade.content(document),
        author: cascade.author.first(root).or_else(|| jsonld_author(document)),
        tags: cascade.tags.all(root).into_iter().unique().collect(),
        published_at: cascade.published_at.first(root),
        image_url: cascade
            .image
            .first(root)
            .and_then(|src| resolve_link(base, &src))
            .map(|u| u.to_string()),
        summary: cascade.summary.first(root),
        has_video: cascade.video.any_present(root),
    }
}

/// Author named in the page's JSON-LD metadata, if any.
///
/// `author` may be a string, a `{ "name": .. }` object, or a list of either;
/// several authors are joined with ", ".
pub fn jsonld_author(document: &Html) -> Option<String> {
    let selector = get_or_compile("script[type='application/ld+json']")?;
    document.select(&selector).find_map(|script| {
        let text = script.text().collect::<String>();
        let json: Value = serde_json::from_str(text.trim()).ok()?;
        let nodes = match json {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("@graph") {
                Some(Value::Array(graph)) => graph,
                _ => vec![Value::Object(obj)],
            },
            _ => return None,
        };
        nodes.iter().find_map(|node| node.get("author").and_then(author_names))
    })
}

fn author_names(author: &Value) -> Option<String> {
    let name = |v: &Value| -> Option<String> {
        let raw = match v {
            Value::String(s) => s.as_str(),
            Value::Object(obj) => obj.get("name")?.as_str()?,
            _ => return None,
        };
        let cleaned = normalize_whitespace(raw);
        (!cleaned.is_empty()).then_some(cleaned)
    };
    match author {
        Value::Array(items) => {
            let names: Vec<String> = items.iter().filter_map(name).collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        other => name(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::FakeClient;
    use pretty_assertions::assert_eq;

    const ARTICLE: &str = r#"<html><head>
        <meta name="author" content="Мария Иванова">
        <meta property="article:published_time" content="2025-05-06T09:30:00+03:00">
        <meta property="og:image" content="/img/lead.jpg">
        <meta name="description" content="Рост экономики в первом квартале">
      </head><body>
        <article>
          <div class="article-body">
            <p>Рост   ВВП составил 3.5%.</p>
            <p>Аналитики ждут продолжения.</p>
          </div>
          <a rel="tag" href="/tag/gdp">ВВП</a>
          <a rel="tag" href="/tag/economy">Экономика</a>
          <a rel="tag" href="/tag/gdp">ВВП</a>
          <iframe src="https://www.youtube.com/embed/xyz"></iframe>
        </article>
      </body></html>"#;

    fn stub(url: &str) -> ArticleStub {
        ArticleStub {
            published_at: Some("listing date".into()),
            ..ArticleStub::new("Headline", url)
        }
    }

    fn fetcher<'a>(
        client: &'a FakeClient,
        cascade: &'a ContentCascade,
        classifier: &'a CategoryClassifier,
    ) -> DetailFetcher<'a, FakeClient> {
        DetailFetcher {
            client,
            cascade,
            classifier,
            policy: RetryPolicy {
                max_attempts: 3,
                delay_ms: 0,
            },
            timeout: Duration::from_secs(1),
            site_name: "Example News",
        }
    }

    #[tokio::test]
    async fn test_fetch_details_extracts_every_field() {
        let url = "https://news.example.com/economics/gdp";
        let client = FakeClient::new().with_page(url, ARTICLE);
        let cascade = ContentCascade::default();
        let classifier = CategoryClassifier::default();

        let record = fetcher(&client, &cascade, &classifier).fetch_details(&stub(url)).await.record;
        assert_eq!(record.error, None);
        assert_eq!(record.category, "economics");
        assert_eq!(record.content, "Рост ВВП составил 3.5%.\n\nАналитики ждут продолжения.");
        assert_eq!(record.author, "Мария Иванова");
        assert_eq!(record.tags, vec!["ВВП", "Экономика"]);
        assert_eq!(record.published_at.as_deref(), Some("2025-05-06T09:30:00+03:00"));
        assert_eq!(record.image_url.as_deref(), Some("https://news.example.com/img/lead.jpg"));
        assert_eq!(record.summary.as_deref(), Some("Рост экономики в первом квартале"));
        assert!(record.has_video);
    }

    #[tokio::test]
    async fn test_author_falls_back_to_jsonld_then_site_name() {
        let with_ld = r#"<html><head>
            <script type="application/ld+json">
              {"@type": "NewsArticle",
               "author": [{"@type": "Person", "name": "Анна Петрова"}, {"name": "Jon Doe"}]}
            </script></head><body><article><p>Text.</p></article></body></html>"#;
        let bare = "<html><body><article><p>Text.</p></article></body></html>";
        let client = FakeClient::new()
            .with_page("https://news.example.com/a", with_ld)
            .with_page("https://news.example.com/b", bare);
        let cascade = ContentCascade::default();
        let classifier = CategoryClassifier::default();
        let fetcher = fetcher(&client, &cascade, &classifier);

        let a = fetcher.fetch_details(&stub("https://news.example.com/a")).await.record;
        let b = fetcher.fetch_details(&stub("https://news.example.com/b")).await.record;
        assert_eq!(a.author, "Анна Петрова, Jon Doe");
        assert_eq!(b.author, "Example News");
        assert_eq!(b.published_at.as_deref(), Some("listing date"));
        assert!(!b.has_video);
        assert!(b.tags.is_empty());
    }

    #[test]
    fn test_jsonld_author_shapes() {
        let doc = |json: &str| {
            Html::parse_document(&format!(
                r#"<script type="application/ld+json">{json}</script>"#
            ))
        };
        assert_eq!(jsonld_author(&doc(r#"{"author": "Solo"}"#)).as_deref(), Some("Solo"));
        assert_eq!(
            jsonld_author(&doc(
                r#"{"@graph": [{"@type": "WebPage"}, {"author": {"name": " Graph  Author "}}]}"#
            ))
            .as_deref(),
            Some("Graph Author")
        );
        assert_eq!(jsonld_author(&doc("{not json")), None);
        assert_eq!(jsonld_author(&doc(r#"{"author": []}"#)), None);
    }

    #[tokio::test]
    async fn test_retry_then_success_is_not_degraded() {
        let url = "https://news.example.com/flaky";
        let client = FakeClient::new().with_page(url, ARTICLE).failing_times(url, 2);
        let cascade = ContentCascade::default();
        let classifier = CategoryClassifier::default();

        let outcome = fetcher(&client, &cascade, &classifier).fetch_details(&stub(url)).await;
        assert!(!outcome.record.is_degraded());
        assert!(outcome.failure.is_none());
        assert!(outcome.record.has_content());
        assert_eq!(client.calls(url), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_give_degraded_record() {
        let url = "https://news.example.com/politics/down";
        let client = FakeClient::new().always_failing(url);
        let cascade = ContentCascade::default();
        let classifier = CategoryClassifier::default();

        let outcome = fetcher(&client, &cascade, &classifier).fetch_details(&stub(url)).await;
        let record = outcome.record;
        assert!(record.is_degraded());
        assert_eq!(record.content, "");
        assert_eq!(record.author, "Example News");
        assert_eq!(record.category, "politics");
        assert_eq!(record.title, "Headline");
        assert!(record.error.unwrap().contains("3 attempt"));

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.url, url);
        assert_eq!(failure.trace.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_invalid_stub_url_is_degraded() {
        let client = FakeClient::new();
        let cascade = ContentCascade::default();
        let classifier = CategoryClassifier::default();

        let record = fetcher(&client, &cascade, &classifier)
            .fetch_details(&ArticleStub::new("Broken", "not a url"))
            .await
            .record;
        assert!(record.is_degraded());
        assert_eq!(record.content, "");
    }

    #[tokio::test]
    async fn test_one_failing_stub_is_isolated() {
        let urls = [
            "https://news.example.com/1",
            "https://news.example.com/2",
            "https://news.example.com/3",
        ];
        let client = FakeClient::new()
            .with_page(urls[0], ARTICLE)
            .always_failing(urls[1])
            .with_page(urls[2], ARTICLE);
        let cascade = ContentCascade::default();
        let classifier = CategoryClassifier::default();
        let stubs: Vec<ArticleStub> = urls.iter().map(|u| stub(u)).collect();

        let batch = fetcher(&client, &cascade, &classifier).fetch_all(&stubs, 5).await;
        assert_eq!(batch.records.len(), 3);
        assert_eq!(batch.records.iter().filter(|r| r.is_degraded()).count(), 1);
        assert!(batch.records[1].is_degraded());
        assert!(batch.records[0].has_content());
        assert!(batch.records[2].has_content());
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].url, urls[1]);
    }

    #[tokio::test]
    async fn test_fetch_all_preserves_listing_order() {
        let urls: Vec<String> = (0..4).map(|i| format!("https://news.example.com/{i}")).collect();
        let mut client = FakeClient::new();
        for (i, url) in urls.iter().enumerate() {
            let page = format!("<article><p>Body {i}</p></article>");
            // Earlier stubs finish later
            client = client
                .with_page(url, &page)
                .with_delay(url, Duration::from_millis(80 - 20 * i as u64));
        }
        let cascade = ContentCascade::default();
        let classifier = CategoryClassifier::default();
        let stubs: Vec<ArticleStub> = urls.iter().map(|u| stub(u)).collect();

        let batch = fetcher(&client, &cascade, &classifier).fetch_all(&stubs, 4).await;
        let got: Vec<&str> = batch.records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(got, urls.iter().map(String::as_str).collect::<Vec<_>>());
        let contents: Vec<&str> = batch.records.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["Body 0", "Body 1", "Body 2", "Body 3"]);
    }

    #[tokio::test]
    async fn test_fetch_all_with_zero_concurrency_still_runs() {
        let url = "https://news.example.com/only";
        let client = FakeClient::new().with_page(url, ARTICLE);
        let cascade = ContentCascade::default();
        let classifier = CategoryClassifier::default();

        let batch = fetcher(&client, &cascade, &classifier).fetch_all(&[stub(url)], 0).await;
        assert_eq!(batch.records.len(), 1);
        assert!(batch.failures.is_empty());
    }
}

//! Data models for harvested articles and run statistics.
//!
//! - [`ArticleStub`]: a listing entry, created once by the listing extractor
//! - [`ArticleRecord`]: a stub plus detail fields and enrichment results
//! - [`Sentiment`]: lexical sentiment counts attached by the enrichment stage
//! - [`HarvestStats`]: aggregate counters reported at the end of a run
//!
//! Serialized field names are camelCase. Optional fields are omitted when
//! absent, so a record sequence is heterogeneous: a degraded record has an
//! `error` key and usually no `publishedAt`, while a listing-only record may
//! carry neither.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A minimal article reference discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleStub {
    pub title: String,
    /// Absolute http(s) URL; also the deduplication key.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ArticleStub {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            category_hint: None,
            published_at: None,
            image_url: None,
            summary: None,
        }
    }
}

/// Sentiment bucket chosen by comparing positive and negative counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

/// Lexical sentiment counts for a record's content.
///
/// `neutral` is `tokens - positive - negative`. A token matching both
/// lexicons is counted twice, so `neutral` can drop below zero; the value is
/// kept as computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentiment {
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    pub sentiment: SentimentLabel,
}

/// A harvested article: the stub, whatever the detail page yielded, and the
/// enrichment results.
///
/// A record with `error` set always has an empty `content`. The converse does
/// not hold: a page that loaded but matched no content selector produces an
/// empty `content` without an `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<String>,
    pub category: String,
    pub content: String,
    pub author: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub has_video: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    pub parsed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArticleRecord {
    /// Build a record from a stub with every detail field at its default.
    pub fn from_stub(stub: &ArticleStub, category: String, default_author: &str) -> Self {
        Self {
            title: stub.title.clone(),
            url: stub.url.clone(),
            category_hint: stub.category_hint.clone(),
            category,
            content: String::new(),
            author: default_author.to_string(),
            tags: Vec::new(),
            published_at: stub.published_at.clone(),
            image_url: stub.image_url.clone(),
            has_video: false,
            summary: stub.summary.clone(),
            sentiment: None,
            parsed_at: now_rfc3339(),
            error: None,
        }
    }

    /// A record for an article whose detail page could not be acquired.
    pub fn degraded(
        stub: &ArticleStub,
        category: String,
        default_author: &str,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_stub(stub, category, default_author)
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Sentiment label tallies across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentStats {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Aggregate counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestStats {
    pub total_articles: usize,
    pub articles_with_content: usize,
    pub articles_with_tags: usize,
    pub articles_with_images: usize,
    pub articles_with_videos: usize,
    pub degraded_articles: usize,
    /// `[label, count]` pairs, most frequent first, ties broken by label.
    pub categories_count: Vec<(String, usize)>,
    pub sentiment_stats: SentimentStats,
    pub execution_time_ms: u64,
}

impl HarvestStats {
    pub fn from_records(records: &[ArticleRecord], execution_time_ms: u64) -> Self {
        let mut categories: HashMap<&str, usize> = HashMap::new();
        let mut sentiment_stats = SentimentStats::default();

        for record in records {
            *categories.entry(record.category.as_str()).or_default() += 1;
            match record.sentiment.map(|s| s.sentiment) {
                Some(SentimentLabel::Positive) => sentiment_stats.positive += 1,
                Some(SentimentLabel::Negative) => sentiment_stats.negative += 1,
                Some(SentimentLabel::Neutral) => sentiment_stats.neutral += 1,
                None => {}
            }
        }

        let mut categories_count: Vec<(String, usize)> = categories
            .into_iter()
            .map(|(label, count)| (label.to_string(), count))
            .collect();
        categories_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total_articles: records.len(),
            articles_with_content: records.iter().filter(|r| r.has_content()).count(),
            articles_with_tags: records.iter().filter(|r| !r.tags.is_empty()).count(),
            articles_with_images: records
                .iter()
                .filter(|r| r.image_url.as_deref().is_some_and(|u| !u.is_empty()))
                .count(),
            articles_with_videos: records.iter().filter(|r| r.has_video).count(),
            degraded_articles: records.iter().filter(|r| r.is_degraded()).count(),
            categories_count,
            sentiment_stats,
            execution_time_ms,
        }
    }
}

/// One line of the append-only error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: String,
    pub message: String,
    pub url: String,
    pub trace: String,
}

impl ErrorLogEntry {
    pub fn new(
        message: impl Into<String>,
        url: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now_rfc3339(),
            message: message.into(),
            url: url.into(),
            trace: trace.into(),
        }
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

//! Enrichment transforms applied to every harvested record.
//!
//! Each [`Enricher`] takes the record built so far and returns an updated
//! copy. A step that errors or panics is skipped and logged; the record moves
//! on to the next step unchanged, so enrichment can never drop a record.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{ArticleRecord, Sentiment, SentimentLabel};
use crate::utils::contain_fault;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnrichError {
    #[error("record has no content to analyze")]
    EmptyContent,
    #[error("{0}")]
    Failed(String),
}

/// A pure transform over a record.
pub trait Enricher: Send + Sync {
    fn name(&self) -> &str;

    fn enrich(&self, record: &ArticleRecord) -> Result<ArticleRecord, EnrichError>;
}

/// Ordered chain of enrichers.
#[derive(Default)]
pub struct EnrichmentPipeline {
    stages: Vec<Box<dyn Enricher>>,
}

impl EnrichmentPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl Enricher + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Run every stage in order, skipping the ones that fail.
    pub fn apply(&self, record: ArticleRecord) -> ArticleRecord {
        self.stages.iter().fold(record, |current, stage| {
            match contain_fault(|| stage.enrich(&current)) {
                Ok(Ok(next)) => next,
                Ok(Err(EnrichError::EmptyContent)) => {
                    debug!(
                        stage = stage.name(),
                        url = %current.url,
                        "Skipping enrichment of empty record"
                    );
                    current
                }
                Ok(Err(e)) => {
                    warn!(
                        stage = stage.name(),
                        url = %current.url,
                        error = %e,
                        "Enrichment step failed; skipping"
                    );
                    current
                }
                Err(panic) => {
                    warn!(
                        stage = stage.name(),
                        url = %current.url,
                        panic = %panic,
                        "Enrichment step panicked; skipping"
                    );
                    current
                }
            }
        })
    }
}

/// Substring lexicons for the sentiment scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentLexicon {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl Default for SentimentLexicon {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect();
        Self {
            positive: words(&[
                "рост", "успех", "побед", "прибыл", "улучш", "развити", "рекорд", "growth",
                "success", "profit", "improv", "record", "gain",
            ]),
            negative: words(&[
                "кризис", "паден", "убыт", "санкци", "угроз", "проблем", "снижен", "crisis", "loss",
                "declin", "threat", "collapse", "recession",
            ]),
        }
    }
}

/// Lexical sentiment: counts tokens containing a positive or negative stem.
#[derive(Debug, Clone, Default)]
pub struct SentimentScorer {
    lexicon: SentimentLexicon,
}

impl SentimentScorer {
    pub fn new(lexicon: SentimentLexicon) -> Self {
        let fold = |list: Vec<String>| -> Vec<String> {
            list.into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            lexicon: SentimentLexicon {
                positive: fold(lexicon.positive),
                negative: fold(lexicon.negative),
            },
        }
    }

    /// Score a text. A token can count toward both sides, in which case
    /// `neutral` (tokens minus both counts) goes below zero.
    pub fn score(&self, text: &str) -> Sentiment {
        let folded = text.to_lowercase();
        let mut tokens = 0i64;
        let mut positive = 0i64;
        let mut negative = 0i64;

        for token in folded.split_whitespace() {
            tokens += 1;
            if self.lexicon.positive.iter().any(|w| token.contains(w.as_str())) {
                positive += 1;
            }
            if self.lexicon.negative.iter().any(|w| token.contains(w.as_str())) {
                negative += 1;
            }
        }

        let sentiment = if positive > negative {
            SentimentLabel::Positive
        } else if negative > positive {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        Sentiment {
            positive,
            negative,
            neutral: tokens - positive - negative,
            sentiment,
        }
    }
}

impl Enricher for SentimentScorer {
    fn name(&self) -> &str {
        "sentiment"
    }

    fn enrich(&self, record: &ArticleRecord) -> Result<ArticleRecord, EnrichError> {
        if !record.has_content() {
            return Err(EnrichError::EmptyContent);
        }
        if self.lexicon.positive.is_empty() && self.lexicon.negative.is_empty() {
            return Err(EnrichError::Failed("sentiment lexicons are empty".to_string()));
        }
        Ok(ArticleRecord {
            sentiment: Some(self.score(&record.content)),
            ..record.clone()
        })
    }
}

/// Fills a missing summary with the first sentence of the content.
#[derive(Debug, Clone)]
pub struct LeadSummary {
    max_chars: usize,
}

impl Default for LeadSummary {
    fn default() -> Self {
        Self { max_chars: 280 }
    }
}

impl LeadSummary {
    fn lead(&self, content: &str) -> String {
        let first_paragraph = content
            .split("\n\n")
            .map(str::trim)
            .find(|p| !p.is_empty())
            .unwrap_or("");
        let sentence_end = first_paragraph
            .char_indices()
            .find(|(i, c)| {
                matches!(c, '.' | '!' | '?')
                    && first_paragraph[i + c.len_utf8()..]
                        .chars()
                        .next()
                        .is_none_or(char::is_whitespace)
            })
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(first_paragraph.len());
        let sentence = &first_paragraph[..sentence_end];
        if sentence.chars().count() <= self.max_chars {
            sentence.to_string()
        } else {
            let cut: String = sentence.chars().take(self.max_chars).collect();
            format!("{}…", cut.trim_end())
        }
    }
}

impl Enricher for LeadSummary {
    fn name(&self) -> &str {
        "lead_summary"
    }

    fn enrich(&self, record: &ArticleRecord) -> Result<ArticleRecord, EnrichError> {
        if record.summary.as_deref().is_some_and(|s| !s.trim().is_empty()) {
            return Ok(record.clone());
        }
        if !record.has_content() {
            return Err(EnrichError::EmptyContent);
        }
        Ok(ArticleRecord {
            summary: Some(self.lead(&record.content)),
            ..record.clone()
        })
    }
}

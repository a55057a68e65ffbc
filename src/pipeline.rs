//! The harvest run: listing, details, enrichment, statistics, outputs.
//!
//! Only listing acquisition can fail a run. Everything after it degrades per
//! article and is reported through the statistics and the error log.

use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::classify::CategoryClassifier;
use crate::config::{HarvestConfig, OutputConfig};
use crate::enrich::{EnrichmentPipeline, LeadSummary, SentimentScorer};
use crate::error::HarvestError;
use crate::extract::AnchorFallback;
use crate::models::{ArticleRecord, ErrorLogEntry, HarvestStats};
use crate::outputs::{WriteOutcome, csv, json, report};
use crate::render::RenderClient;
use crate::scrapers::{DetailFetcher, ListingExtractor};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub records: Vec<ArticleRecord>,
    pub stats: HarvestStats,
    /// Per-article problems destined for the error log
    pub failures: Vec<ErrorLogEntry>,
    pub strategy_index: Option<usize>,
}

pub struct Harvester<C> {
    config: HarvestConfig,
    client: C,
    classifier: CategoryClassifier,
    fallback: AnchorFallback,
    enrichment: EnrichmentPipeline,
}

impl<C: RenderClient> Harvester<C> {
    /// Validate `config` and prepare the run.
    pub fn new(config: HarvestConfig, client: C) -> Result<Self, HarvestError> {
        config.validate()?;
        let classifier = config.classifier();
        let fallback = config.anchor_fallback()?;
        let enrichment = EnrichmentPipeline::new()
            .with_stage(SentimentScorer::new(config.sentiment.clone()))
            .with_stage(LeadSummary::default());
        debug!(
            strategies = config.selectors.listing.len(),
            enrichment_stages = enrichment.len(),
            fetch_details = config.fetch_details,
            "Harvester ready"
        );
        Ok(Self {
            config,
            client,
            classifier,
            fallback,
            enrichment,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    #[instrument(level = "info", skip_all, fields(url = %self.config.url))]
    pub async fn run(&self) -> Result<HarvestReport, HarvestError> {
        let t0 = Instant::now();
        let config = &self.config;
        let url = config.listing_url()?;

        let extractor = ListingExtractor {
            cascade: &config.selectors.listing,
            fallback: &self.fallback,
            classifier: &self.classifier,
            categories: &config.categories,
            max_articles: config.max_articles,
        };
        let listing = extractor
            .index_articles(&self.client, &url, &config.retry_policy, config.timeout())
            .await?;
        if listing.stubs.is_empty() {
            warn!(matched = listing.matched, "Listing yielded no articles");
        }

        let (records, failures) = if config.fetch_details && !listing.stubs.is_empty() {
            let fetcher = DetailFetcher {
                client: &self.client,
                cascade: &config.selectors.detail,
                classifier: &self.classifier,
                policy: config.retry_policy,
                timeout: config.article_timeout(),
                site_name: &config.site_name,
            };
            let batch = fetcher.fetch_all(&listing.stubs, config.concurrency).await;
            (batch.records, batch.failures)
        } else {
            let records = listing
                .stubs
                .iter()
                .map(|stub| {
                    let category = self
                        .classifier
                        .resolve(&stub.url, stub.category_hint.as_deref());
                    ArticleRecord::from_stub(stub, category, &config.site_name)
                })
                .collect();
            (records, Vec::new())
        };

        let records: Vec<ArticleRecord> = records
            .into_iter()
            .map(|record| self.enrichment.apply(record))
            .collect();

        let stats = HarvestStats::from_records(&records, t0.elapsed().as_millis() as u64);
        info!(
            total = stats.total_articles,
            with_content = stats.articles_with_content,
            degraded = stats.degraded_articles,
            positive = stats.sentiment_stats.positive,
            negative = stats.sentiment_stats.negative,
            neutral = stats.sentiment_stats.neutral,
            elapsed_ms = stats.execution_time_ms,
            "Harvest complete"
        );

        Ok(HarvestReport {
            records,
            stats,
            failures,
            strategy_index: listing.strategy_index,
        })
    }
}

/// Write every artifact of a finished run.
///
/// A writer that fails is logged and the rest still run. Returns the outcome
/// of each writer in order: records JSON, CSV, statistics, failed records,
/// error log. With zero records nothing is written at all.
#[instrument(level = "info", skip_all, fields(records = harvest.records.len()))]
pub async fn write_outputs(harvest: &HarvestReport, outputs: &OutputConfig) -> Vec<WriteOutcome> {
    if harvest.records.is_empty() {
        warn!("No records harvested; nothing to serialize");
        return Vec::new();
    }

    let results = [
        ("json", json::write_records(&harvest.records, &outputs.json_path).await),
        ("csv", csv::write_csv(&harvest.records, &outputs.csv_path, outputs.csv_bom).await),
        ("stats", report::write_stats(&harvest.stats, &outputs.stats_path).await),
        ("failed", report::write_failed(&harvest.records, &outputs.failed_path).await),
        ("error_log", report::append_error_log(&harvest.failures, &outputs.error_log_path).await),
    ];

    results
        .into_iter()
        .map(|(artifact, result)| match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(artifact, error = %e, "Failed to write output");
                WriteOutcome::Skipped
            }
        })
        .collect()
}

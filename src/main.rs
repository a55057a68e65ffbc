//! # News Harvest
//!
//! Harvests structured article records from news listing pages that change
//! their markup without notice.
//!
//! ## Features
//!
//! - Ordered selector cascades with an anchor-pattern fallback, so a redesign
//!   degrades extraction instead of breaking it
//! - Retry with per-attempt timeouts around every page load
//! - Concurrent, failure-isolated article fetching that keeps listing order
//! - Lexical sentiment and lead-sentence summaries as enrichment steps
//! - JSON, union-header CSV, statistics, and an append-only error log
//!
//! ## Usage
//!
//! ```sh
//! news_harvest -c harvest.yaml
//! RUST_LOG=news_harvest=debug news_harvest --url https://news.example.com/ -n 20
//! ```
//!
//! ## Architecture
//!
//! 1. **Indexing**: render the listing page and resolve the listing cascade
//! 2. **Fetching**: render each article (bounded concurrency) and read it
//!    through the content cascade
//! 3. **Enrichment**: sentiment and summary transforms
//! 4. **Output**: JSON and CSV records, statistics, failed records, error log

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod config;
mod enrich;
mod error;
mod extract;
mod models;
mod outputs;
mod pipeline;
mod render;
mod scrapers;
mod utils;

use cli::Cli;
use config::HarvestConfig;
use models::ErrorLogEntry;
use outputs::report::append_error_log;
use pipeline::{Harvester, write_outputs};
use render::HttpRenderClient;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_harvest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = match &args.config {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    args.apply(&mut config);

    let client = HttpRenderClient::new(config.render.clone())?;
    let error_log_path = config.outputs.error_log_path.clone();
    let listing_url = config.url.clone();
    let harvester = Harvester::new(config, client).inspect_err(|e| {
        error!(error = %e, "Invalid configuration");
    })?;

    let report = match harvester.run().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Harvest aborted");
            let entry = ErrorLogEntry::new(e.to_string(), listing_url, e.trace());
            if let Err(log_err) = append_error_log(&[entry], &error_log_path).await {
                error!(error = %log_err, "Failed to record the failure in the error log");
            }
            return Err(e.into());
        }
    };

    let outcomes = write_outputs(&report, &harvester.config().outputs).await;
    let written = outcomes.iter().filter(|o| o.is_written()).count();

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        strategy_index = ?report.strategy_index,
        records = report.records.len(),
        degraded = report.stats.degraded_articles,
        files_written = written,
        "Execution complete"
    );

    Ok(())
}

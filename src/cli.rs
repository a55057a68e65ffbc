//! Command-line interface.
//!
//! Every option can come from a flag or an environment variable and wins over
//! the configuration file.

use clap::Parser;
use std::path::PathBuf;

use crate::config::HarvestConfig;

/// Harvest article records from a news listing page.
///
/// # Examples
///
/// ```sh
/// # Everything from the config file
/// news_harvest -c harvest.yaml
///
/// # Override the listing and the filter
/// news_harvest -c harvest.yaml --url https://news.example.com/economics \
///     --categories economics,finance
///
/// # Listing only, no article visits
/// news_harvest --url https://news.example.com/ --no-details -j out/articles.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listing page URL
    #[arg(short, long, env = "HARVEST_URL")]
    pub url: Option<String>,

    /// Maximum number of articles to harvest
    #[arg(short = 'n', long, env = "HARVEST_MAX_ARTICLES")]
    pub max_articles: Option<usize>,

    /// Comma-separated category filter terms
    #[arg(long, env = "HARVEST_CATEGORIES", value_delimiter = ',')]
    pub categories: Option<Vec<String>>,

    /// Only read the listing; skip article pages
    #[arg(long)]
    pub no_details: bool,

    /// Maximum article pages fetched at once
    #[arg(long, env = "HARVEST_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Output path for the JSON records
    #[arg(short, long, env = "HARVEST_JSON_OUTPUT")]
    pub json_output: Option<PathBuf>,

    /// Output path for the CSV records
    #[arg(long, env = "HARVEST_CSV_OUTPUT")]
    pub csv_output: Option<PathBuf>,

    /// Prefix the CSV with a UTF-8 byte order mark
    #[arg(long)]
    pub bom: Option<bool>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut HarvestConfig) {
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(max) = self.max_articles {
            config.max_articles = max;
        }
        if let Some(categories) = &self.categories {
            config.categories = categories
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if self.no_details {
            config.fetch_details = false;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(path) = &self.json_output {
            config.outputs.json_path = path.clone();
        }
        if let Some(path) = &self.csv_output {
            config.outputs.csv_path = path.clone();
        }
        if let Some(bom) = self.bom {
            config.outputs.csv_bom = bom;
        }
    }
}

//! Harvest configuration.
//!
//! Loaded from a YAML file with camelCase keys. Every field has a default, so
//! a file only needs the listing `url`; CLI flags are applied on top before
//! [`HarvestConfig::validate`] runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::classify::{CategoryClassifier, CategoryRule, DEFAULT_CATEGORY, default_rules};
use crate::enrich::SentimentLexicon;
use crate::error::HarvestError;
use crate::extract::compiled::precompile;
use crate::extract::{AnchorFallback, ContentCascade, Strategy};
use crate::render::{RenderOptions, RetryPolicy};

/// Top-level configuration for one harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HarvestConfig {
    /// Listing page to harvest
    pub url: String,
    /// Default author for articles that name none
    pub site_name: String,
    /// Upper bound on listing entries carried forward
    pub max_articles: usize,
    /// Category filter terms; empty keeps everything
    pub categories: Vec<String>,
    /// Visit each article page for content and metadata
    pub fetch_details: bool,
    /// Listing navigation timeout (milliseconds)
    pub timeout_ms: u64,
    /// Per-article navigation timeout (milliseconds)
    pub article_timeout_ms: u64,
    pub retry_policy: RetryPolicy,
    /// Maximum article pages in flight
    pub concurrency: usize,
    pub default_category: String,
    pub category_rules: Vec<CategoryRule>,
    /// User agent and blocked resource suffixes
    #[serde(flatten)]
    pub render: RenderOptions,
    pub selectors: SelectorConfig,
    pub sentiment: SentimentLexicon,
    pub outputs: OutputConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            site_name: "Unknown".to_string(),
            max_articles: 50,
            categories: Vec::new(),
            fetch_details: true,
            timeout_ms: 30_000,
            article_timeout_ms: 20_000,
            retry_policy: RetryPolicy::default(),
            concurrency: 5,
            default_category: DEFAULT_CATEGORY.to_string(),
            category_rules: default_rules(),
            render: RenderOptions::default(),
            selectors: SelectorConfig::default(),
            sentiment: SentimentLexicon::default(),
            outputs: OutputConfig::default(),
        }
    }
}

/// Listing and article selector cascades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectorConfig {
    /// Listing strategies, tried in order
    pub listing: Vec<Strategy>,
    /// Regexes over `href` used when no listing strategy matches
    pub fallback_link_patterns: Vec<String>,
    pub detail: ContentCascade,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing: [
                "[class*=list-item]",
                "[class*=news-item]",
                "[class*=card]",
                "article",
            ]
            .into_iter()
            .map(Strategy::new)
            .collect(),
            fallback_link_patterns: vec![
                r"/\d{4}/\d{2}/\d{2}/".to_string(),
                r"/\d{8}/".to_string(),
                r"/(news|article|story)/".to_string(),
            ],
            detail: ContentCascade::default(),
        }
    }
}

/// Where run artifacts are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    pub stats_path: PathBuf,
    /// Side file holding only degraded records
    pub failed_path: PathBuf,
    /// Append-only JSON-lines error log
    pub error_log_path: PathBuf,
    /// Prefix the CSV with a UTF-8 byte order mark (spreadsheet friendly)
    pub csv_bom: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_path: PathBuf::from("output/articles.json"),
            csv_path: PathBuf::from("output/articles.csv"),
            stats_path: PathBuf::from("output/stats.json"),
            failed_path: PathBuf::from("output/failed.json"),
            error_log_path: PathBuf::from("output/errors.log"),
            csv_bom: true,
        }
    }
}

impl HarvestConfig {
    /// Read a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        info!(path = %path.display(), url = %config.url, "Loaded configuration");
        Ok(config)
    }

    /// Check the invariants the pipeline relies on.
    ///
    /// Selectors that do not compile are only warned about: they count as
    /// zero matches and the cascade moves on.
    pub fn validate(&self) -> Result<(), HarvestError> {
        self.listing_url()?;
        if self.max_articles == 0 {
            return Err(HarvestError::Config("maxArticles must be greater than 0".into()));
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(HarvestError::Config("retryPolicy.maxAttempts must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(HarvestError::Config("concurrency must be at least 1".into()));
        }
        if self.timeout_ms == 0 || self.article_timeout_ms == 0 {
            return Err(HarvestError::Config("timeouts must be greater than 0".into()));
        }
        self.anchor_fallback()?;

        let listing = self.selectors.listing.iter().flat_map(|strategy| {
            let fields = &strategy.fields;
            std::iter::once(strategy.selector.as_str())
                .chain(fields.title.selectors())
                .chain(fields.link.selectors())
                .chain(fields.category.selectors())
                .chain(fields.date.selectors())
                .chain(fields.image.selectors())
                .chain(fields.summary.selectors())
        });
        let invalid = precompile(listing.chain(self.selectors.detail.selectors()));
        if !invalid.is_empty() {
            warn!(?invalid, "Some selectors do not compile and will never match");
        }
        Ok(())
    }

    /// The listing URL, which must be absolute http(s).
    pub fn listing_url(&self) -> Result<Url, HarvestError> {
        if self.url.trim().is_empty() {
            return Err(HarvestError::Config("url is required".into()));
        }
        let url = Url::parse(self.url.trim()).map_err(|source| HarvestError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HarvestError::Config(format!(
                "url must be http or https, got {}",
                url.scheme()
            )));
        }
        Ok(url)
    }

    pub fn classifier(&self) -> CategoryClassifier {
        CategoryClassifier::new(self.category_rules.clone(), &self.default_category)
    }

    pub fn anchor_fallback(&self) -> Result<AnchorFallback, HarvestError> {
        AnchorFallback::new(&self.selectors.fallback_link_patterns)
            .map_err(|e| HarvestError::Config(format!("invalid fallbackLinkPatterns: {}", e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn article_timeout(&self) -> Duration {
        Duration::from_millis(self.article_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::cascade::SelectorSpec;
    use std::io::Write;

    fn valid() -> HarvestConfig {
        HarvestConfig {
            url: "https://news.example.com/latest".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_validate_once_url_is_set() {
        assert!(HarvestConfig::default().validate().is_err());
        valid().validate().unwrap();
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
url: https://news.example.com/
siteName: Example News
maxArticles: 10
categories: [economics, politics]
retryPolicy:
  maxAttempts: 4
userAgent: harvest-test
outputs:
  jsonPath: out/a.json
"#;
        let config: HarvestConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.site_name, "Example News");
        assert_eq!(config.max_articles, 10);
        assert_eq!(config.categories, vec!["economics", "politics"]);
        assert_eq!(config.retry_policy.max_attempts, 4);
        assert_eq!(config.retry_policy.delay_ms, 1000);
        assert_eq!(config.render.user_agent, "harvest-test");
        assert!(!config.render.blocked_resources.is_empty());
        assert_eq!(config.outputs.json_path, PathBuf::from("out/a.json"));
        assert_eq!(config.outputs.csv_path, PathBuf::from("output/articles.csv"));
        assert_eq!(config.concurrency, 5);
        assert!(config.fetch_details);
        config.validate().unwrap();
    }

    #[test]
    fn test_yaml_selector_cascades() {
        let yaml = r#"
url: https://news.example.com/
selectors:
  listing:
    - .Card
    - selector: a[href]
      fields:
        title: [":self"]
        link: [[":self", "href"]]
  fallbackLinkPatterns: ["/story/"]
  detail:
    containers: [".article-body"]
    author: [["meta[name=author]", "content"]]
"#;
        let config: HarvestConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.selectors.listing.len(), 2);
        assert_eq!(config.selectors.listing[0], Strategy::new(".Card"));
        assert_eq!(
            config.selectors.listing[1].fields.link.0,
            vec![SelectorSpec::attr(":self", "href")]
        );
        assert_eq!(config.selectors.detail.containers, vec![".article-body"]);
        assert_eq!(config.selectors.detail.paragraphs, "p");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: Vec<HarvestConfig> = vec![
            HarvestConfig {
                max_articles: 0,
                ..valid()
            },
            HarvestConfig {
                concurrency: 0,
                ..valid()
            },
            HarvestConfig {
                retry_policy: RetryPolicy {
                    max_attempts: 0,
                    delay_ms: 0,
                },
                ..valid()
            },
            HarvestConfig {
                url: "ftp://news.example.com/".into(),
                ..valid()
            },
            HarvestConfig {
                url: "/relative/path".into(),
                ..valid()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "should reject {:?}", config.url);
        }
    }

    #[test]
    fn test_validate_rejects_bad_fallback_regex() {
        let mut config = valid();
        config.selectors.fallback_link_patterns = vec!["(unclosed".into()];
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_invalid_css_is_not_fatal() {
        let mut config = valid();
        config.selectors.listing.insert(0, Strategy::new("div[[["));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "url: https://news.example.com/\nconcurrency: 2").unwrap();
        let config = HarvestConfig::load(file.path()).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.listing_url().unwrap().as_str(), "https://news.example.com/");
    }

    #[test]
    fn test_classifier_uses_configured_rules() {
        let config = HarvestConfig {
            category_rules: vec![CategoryRule::new("/money/", "finance")],
            default_category: "misc".into(),
            ..valid()
        };
        let classifier = config.classifier();
        assert_eq!(classifier.classify("https://e.com/money/1"), "finance");
        assert_eq!(classifier.classify("https://e.com/sport/1"), "misc");
    }
}

//! Error taxonomy for the harvesting pipeline.
//!
//! Only a handful of these ever reach the top of a run. Navigation failures on
//! individual articles are folded into degraded records by the detail fetcher,
//! evaluation faults become extraction misses, and an empty record set turns
//! into a logged skip. What remains for the caller is listing acquisition,
//! configuration, and I/O.

use std::time::Duration;
use thiserror::Error;

/// Errors produced while acquiring, evaluating, or writing harvested pages.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The render client could not load the page.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        url: String,
        reason: String,
        transient: bool,
    },

    /// A single navigation attempt exceeded its time budget.
    #[error("navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The URL matches a blocked-resource rule and was never requested.
    #[error("navigation to {0} refused by resource-blocking rules")]
    Blocked(String),

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// An extraction function panicked while reading the document.
    #[error("document evaluation fault: {0}")]
    Evaluation(String),

    /// Every attempt allowed by the retry policy failed.
    #[error("gave up on {url} after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<HarvestError>,
        history: Vec<String>,
    },

    /// The listing page could not be acquired; the run has nothing to work on.
    #[error("listing page {url} unavailable")]
    ListingUnavailable {
        url: String,
        #[source]
        source: Box<HarvestError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            HarvestError::Navigation { transient, .. } => *transient,
            HarvestError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Attempt-by-attempt history for exhausted retries, or the source chain
    /// for everything else. Used as the trace text of error-log entries.
    pub fn trace(&self) -> String {
        if let HarvestError::RetriesExhausted { history, .. } = self {
            return history.join("\n");
        }
        let mut lines = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            lines.push(format!("caused by: {}", err));
            source = err.source();
        }
        lines.join("\n")
    }
}

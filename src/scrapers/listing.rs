//! Listing page extraction.
//!
//! Turns a rendered listing page into an ordered, deduplicated list of
//! [`ArticleStub`]s:
//!
//! 1. Resolve the listing cascade (declared strategies, then the anchor
//!    fallback)
//! 2. Build one stub per matched element; an element that faults is skipped
//! 3. Keep stubs whose record category matches the filter
//! 4. Drop repeated URLs, first occurrence wins
//! 5. Keep the first `max_articles`

use itertools::Itertools;
use scraper::{ElementRef, Html};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::classify::CategoryClassifier;
use crate::error::HarvestError;
use crate::extract::{AnchorFallback, ListingFields, Resolution, Strategy, resolve};
use crate::models::ArticleStub;
use crate::render::{RenderClient, RetryPolicy, render_with_retry};
use crate::utils::{contain_fault, resolve_link};

/// Title used when no title candidate yields text.
pub const UNTITLED: &str = "Untitled";

/// Everything needed to read stubs off a listing document.
#[derive(Debug, Clone)]
pub struct ListingExtractor<'a> {
    pub cascade: &'a [Strategy],
    pub fallback: &'a AnchorFallback,
    pub classifier: &'a CategoryClassifier,
    /// Filter terms; empty keeps every stub.
    pub categories: &'a [String],
    pub max_articles: usize,
}

/// Stubs found on a listing page and how they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub stubs: Vec<ArticleStub>,
    /// Index of the declared strategy that matched, `None` for the anchor
    /// fallback or no match at all.
    pub strategy_index: Option<usize>,
    /// Elements matched before filtering and deduplication.
    pub matched: usize,
}

impl<'a> ListingExtractor<'a> {
    /// Extract stubs from an already parsed listing document.
    pub fn extract(&self, document: &Html, base: &Url) -> Listing {
        let resolution = resolve(document, self.cascade, self.fallback);
        let fallback_fields;
        let fields = match &resolution {
            Resolution::Strategy { index, .. } => &self.cascade[*index].fields,
            Resolution::AnchorFallback(_) => {
                fallback_fields = ListingFields::default();
                &fallback_fields
            }
            Resolution::NoMatch => {
                warn!(url = %base, "No listing strategy or fallback pattern matched");
                return Listing {
                    stubs: Vec::new(),
                    strategy_index: None,
                    matched: 0,
                };
            }
        };

        let elements = resolution.elements();
        debug!(
            strategy_index = ?resolution.strategy_index(),
            matched = elements.len(),
            "Resolved listing cascade"
        );

        let stubs = elements
            .iter()
            .enumerate()
            .filter_map(|(position, element)| {
                match contain_fault(|| build_stub(*element, fields, base)) {
                    Ok(stub) => stub,
                    Err(panic) => {
                        warn!(position, panic = %panic, "Listing element faulted; skipping");
                        None
                    }
                }
            })
            .filter(|stub| self.matches_filter(stub))
            .unique_by(|stub| stub.url.clone())
            .take(self.max_articles)
            .collect::<Vec<_>>();

        Listing {
            stubs,
            strategy_index: resolution.strategy_index(),
            matched: elements.len(),
        }
    }

    /// Case-insensitive substring match of the stub's category against any
    /// filter term. The category is the one its record will carry, see
    /// [`CategoryClassifier::resolve`].
    pub fn matches_filter(&self, stub: &ArticleStub) -> bool {
        let terms: Vec<String> = self
            .categories
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return true;
        }
        let category = self
            .classifier
            .resolve(&stub.url, stub.category_hint.as_deref())
            .to_lowercase();
        terms.iter().any(|term| category.contains(term.as_str()))
    }

    /// Acquire the listing page and extract its stubs.
    ///
    /// Failing to load the listing is the one failure that ends the run, so
    /// it is returned as [`HarvestError::ListingUnavailable`].
    #[instrument(level = "info", skip_all, fields(url = %url))]
    pub async fn index_articles<C: RenderClient>(
        &self,
        client: &C,
        url: &Url,
        policy: &RetryPolicy,
        timeout: Duration,
    ) -> Result<Listing, HarvestError> {
        let page = render_with_retry(client, url, policy, timeout)
            .await
            .map_err(|e| HarvestError::ListingUnavailable {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let listing = page
            .evaluate(|document, base| self.extract(document, base))
            .map_err(|e| HarvestError::ListingUnavailable {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        info!(
            count = listing.stubs.len(),
            matched = listing.matched,
            strategy_index = ?listing.strategy_index,
            "Indexed listing articles"
        );
        Ok(listing)
    }
}

fn build_stub(element: ElementRef<'_>, fields: &ListingFields, base: &Url) -> Option<ArticleStub> {
    let url = fields
        .link
        .all(element)
        .iter()
        .find_map(|href| resolve_link(base, href))?;

    let title = fields.title.first(element).unwrap_or_else(|| UNTITLED.to_string());
    Some(ArticleStub {
        category_hint: fields.category.first(element),
        published_at: fields.date.first(element),
        image_url: fields
            .image
            .first(element)
            .and_then(|src| resolve_link(base, &src))
            .map(|u| u.to_string()),
        summary: fields.summary.first(element),
        ..ArticleStub::new(title, url.to_string())
    })
}

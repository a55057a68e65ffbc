//! Process-wide cache of compiled CSS selectors.
//!
//! Cascades are static configuration evaluated against every listing card and
//! every article page, so each selector string is parsed once. Invalid
//! selectors are cached as `None` and behave as "matches nothing".

use once_cell::sync::Lazy;
use scraper::Selector;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Get a compiled selector, compiling and caching it on first use.
///
/// Returns `None` for selectors that fail to parse.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(selector = css, error = %e, "Invalid CSS selector; treating as no match");
            None
        }
    };
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    cache
        .entry(css.to_string())
        .or_insert(compiled)
        .clone()
}

/// Compile a batch of selectors up front, returning the ones that failed.
///
/// Used when loading configuration so bad selectors are reported once at
/// startup instead of silently matching nothing mid-run.
pub fn precompile<I, S>(selectors: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    selectors
        .into_iter()
        .filter(|css| get_or_compile(css.as_ref()).is_none())
        .map(|css| css.as_ref().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_selector_is_cached() {
        assert!(get_or_compile("div.card").is_some());
        assert!(get_or_compile("div.card").is_some());
    }

    #[test]
    fn test_invalid_selector_returns_none() {
        assert!(get_or_compile("[[[invalid").is_none());
        assert!(get_or_compile("[[[invalid").is_none());
    }

    #[test]
    fn test_precompile_reports_failures() {
        let failed = precompile(["h1", "a[href]", "div[[", "p.lead"]);
        assert_eq!(failed, vec!["div[[".to_string()]);
    }
}

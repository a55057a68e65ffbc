//! URL-to-category classification.
//!
//! Rules are `(pattern, label)` pairs checked in order against the lowercased
//! input; the first rule whose pattern is a substring wins. Order matters when
//! patterns overlap: a URL containing both `/economics/` and `/politics/`
//! gets whichever rule is listed first.

use serde::{Deserialize, Serialize};

/// Label used when no rule matches.
pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub label: String,
}

impl CategoryRule {
    pub fn new(pattern: &str, label: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            label: label.to_string(),
        }
    }
}

/// Default rule set for common news-site path layouts.
pub fn default_rules() -> Vec<CategoryRule> {
    [
        ("/politics", "politics"),
        ("/economics", "economics"),
        ("/economy", "economics"),
        ("/business", "business"),
        ("/finance", "finance"),
        ("/technology", "technology"),
        ("/tech", "technology"),
        ("/science", "science"),
        ("/society", "society"),
        ("/world", "world"),
        ("/sport", "sport"),
        ("/culture", "culture"),
        ("/health", "health"),
    ]
    .into_iter()
    .map(|(pattern, label)| CategoryRule::new(pattern, label))
    .collect()
}

#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    rules: Vec<CategoryRule>,
    default_label: String,
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new(default_rules(), DEFAULT_CATEGORY)
    }
}

impl CategoryClassifier {
    pub fn new(rules: Vec<CategoryRule>, default_label: &str) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CategoryRule {
                pattern: rule.pattern.to_lowercase(),
                label: rule.label,
            })
            .collect();
        Self {
            rules,
            default_label: default_label.to_string(),
        }
    }

    /// Label of the first rule matching `input`, or the default label.
    pub fn classify(&self, input: &str) -> String {
        let haystack = input.to_lowercase();
        self.rules
            .iter()
            .find(|rule| !rule.pattern.is_empty() && haystack.contains(&rule.pattern))
            .map(|rule| rule.label.clone())
            .unwrap_or_else(|| self.default_label.clone())
    }

    /// Category for a record: the URL's label, unless that is the default
    /// and the listing supplied a non-blank category tag.
    pub fn resolve(&self, url: &str, hint: Option<&str>) -> String {
        let label = self.classify(url);
        if label != self.default_label {
            return label;
        }
        match hint.map(str::trim) {
            Some(hint) if !hint.is_empty() => hint.to_string(),
            _ => label,
        }
    }
}

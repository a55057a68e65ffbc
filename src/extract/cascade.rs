//! Ordered selector cascades.
//!
//! A cascade is a list of extraction strategies tried in declared order. The
//! first strategy whose selector matches at least one element wins and the
//! rest are never consulted. When every declared strategy comes up empty the
//! resolver falls back to scanning anchors whose `href` looks like an article
//! path; when that is empty too the outcome is [`Resolution::NoMatch`], which
//! is a normal result and not an error.
//!
//! Fields inside a matched element cascade the same way: each field has an
//! ordered list of [`SelectorSpec`] candidates and the first one producing a
//! non-empty value wins.

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::extract::compiled::get_or_compile;
use crate::utils::normalize_whitespace;

/// Pseudo-selector addressing the matched element itself rather than a
/// descendant. Lets an anchor strategy read its own `href` and text.
pub const SELF_SELECTOR: &str = ":self";

/// One candidate for a field.
///
/// In configuration a bare string selects text (`"h2.title"`) and a
/// two-element list selects an attribute (`["img", "src"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorSpec {
    Css(String),
    CssAttr(Vec<String>),
}

impl SelectorSpec {
    pub fn text(css: &str) -> Self {
        SelectorSpec::Css(css.to_string())
    }

    pub fn attr(css: &str, attr: &str) -> Self {
        SelectorSpec::CssAttr(vec![css.to_string(), attr.to_string()])
    }

    /// The CSS part of this candidate.
    pub fn css(&self) -> Option<&str> {
        match self {
            SelectorSpec::Css(css) => Some(css),
            SelectorSpec::CssAttr(parts) => parts.first().map(String::as_str),
        }
    }

    /// Every non-empty value this candidate yields under `scope`.
    pub fn extract(&self, scope: ElementRef<'_>) -> Vec<String> {
        match self {
            SelectorSpec::Css(css) => targets(scope, css)
                .into_iter()
                .filter_map(element_text)
                .collect(),
            SelectorSpec::CssAttr(parts) => match parts.as_slice() {
                [css, attr, ..] => targets(scope, css)
                    .into_iter()
                    .filter_map(|el| el.value().attr(attr))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
                [css] => targets(scope, css).into_iter().filter_map(element_text).collect(),
                [] => Vec::new(),
            },
        }
    }
}

fn targets<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    if css.trim() == SELF_SELECTOR {
        return vec![scope];
    }
    match get_or_compile(css) {
        Some(selector) => scope.select(&selector).collect(),
        None => Vec::new(),
    }
}

/// Whitespace-normalized text of an element, `None` when blank.
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

/// Ordered candidates for a single field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldCascade(pub Vec<SelectorSpec>);

impl FieldCascade {
    pub fn new(candidates: Vec<SelectorSpec>) -> Self {
        Self(candidates)
    }

    /// First value of the first candidate that yields anything.
    pub fn first(&self, scope: ElementRef<'_>) -> Option<String> {
        self.all(scope).into_iter().next()
    }

    /// All values of the first candidate that yields anything.
    pub fn all(&self, scope: ElementRef<'_>) -> Vec<String> {
        first_match(&self.0, |_, spec| spec.extract(scope))
            .map(|(_, values)| values)
            .unwrap_or_default()
    }

    /// Whether any candidate matches at least one element.
    pub fn any_present(&self, scope: ElementRef<'_>) -> bool {
        self.0
            .iter()
            .filter_map(SelectorSpec::css)
            .any(|css| !targets(scope, css).is_empty())
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(SelectorSpec::css).filter(|css| css.trim() != SELF_SELECTOR)
    }
}

fn texts(selectors: &[&str]) -> FieldCascade {
    FieldCascade::new(selectors.iter().map(|s| SelectorSpec::text(s)).collect())
}

/// Per-field candidates applied to each element a listing strategy matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingFields {
    pub title: FieldCascade,
    pub link: FieldCascade,
    pub category: FieldCascade,
    pub date: FieldCascade,
    pub image: FieldCascade,
    pub summary: FieldCascade,
}

impl Default for ListingFields {
    fn default() -> Self {
        Self {
            title: texts(&["h1", "h2", "h3", "[class*=title]", "a", SELF_SELECTOR]),
            link: FieldCascade(vec![
                SelectorSpec::attr(SELF_SELECTOR, "href"),
                SelectorSpec::attr("a[href]", "href"),
            ]),
            category: texts(&["[class*=category]", "[class*=rubric]", "[class*=section]"]),
            date: FieldCascade(vec![
                SelectorSpec::attr("time[datetime]", "datetime"),
                SelectorSpec::text("time"),
                SelectorSpec::text("[class*=date]"),
            ]),
            image: FieldCascade(vec![
                SelectorSpec::attr("img[src]", "src"),
                SelectorSpec::attr("img[data-src]", "data-src"),
            ]),
            summary: texts(&["[class*=summary]", "[class*=lead]", "[class*=anons]", "p"]),
        }
    }
}

/// A listing strategy: a primary selector plus its field cascades.
///
/// Deserializes from a bare selector string (default fields) or from a map
/// with `selector` and optional `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StrategyDef")]
pub struct Strategy {
    pub selector: String,
    pub fields: ListingFields,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StrategyDef {
    Selector(String),
    Full {
        selector: String,
        #[serde(default)]
        fields: ListingFields,
    },
}

impl From<StrategyDef> for Strategy {
    fn from(def: StrategyDef) -> Self {
        match def {
            StrategyDef::Selector(selector) => Strategy::new(&selector),
            StrategyDef::Full { selector, fields } => Strategy { selector, fields },
        }
    }
}

impl Strategy {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            fields: ListingFields::default(),
        }
    }

    fn query<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match get_or_compile(&self.selector) {
            Some(selector) => document.select(&selector).collect(),
            None => Vec::new(),
        }
    }
}

/// Candidates used when extracting an article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentCascade {
    /// Containers holding the article body, most specific first.
    pub containers: Vec<String>,
    /// Paragraph selector applied inside the winning container.
    pub paragraphs: String,
    pub author: FieldCascade,
    pub tags: FieldCascade,
    pub published_at: FieldCascade,
    pub image: FieldCascade,
    pub summary: FieldCascade,
    /// Presence of any of these marks the article as carrying video.
    pub video: FieldCascade,
}

impl Default for ContentCascade {
    fn default() -> Self {
        Self {
            containers: vec![
                "[itemprop=articleBody]".to_string(),
                "[class*=article__text]".to_string(),
                "[class*=article-body]".to_string(),
                "article".to_string(),
                "main".to_string(),
            ],
            paragraphs: "p".to_string(),
            author: FieldCascade(vec![
                SelectorSpec::attr("meta[name=author]", "content"),
                SelectorSpec::text("[itemprop=author]"),
                SelectorSpec::text("[rel=author]"),
                SelectorSpec::text("[class*=author]"),
            ]),
            tags: texts(&["[rel=tag]", "[class*=tags] a", "[class*=tag]"]),
            published_at: FieldCascade(vec![
                SelectorSpec::attr("meta[property='article:published_time']", "content"),
                SelectorSpec::attr("time[datetime]", "datetime"),
                SelectorSpec::text("time"),
            ]),
            image: FieldCascade(vec![
                SelectorSpec::attr("meta[property='og:image']", "content"),
                SelectorSpec::attr("article img[src]", "src"),
            ]),
            summary: FieldCascade(vec![
                SelectorSpec::attr("meta[name=description]", "content"),
                SelectorSpec::attr("meta[property='og:description']", "content"),
            ]),
            video: texts(&[
                "video",
                "iframe[src*=youtube]",
                "iframe[src*=vimeo]",
                "[class*=video-player]",
            ]),
        }
    }
}

impl ContentCascade {
    /// Body text: paragraphs of the first container that has any text,
    /// or the container's whole text when it has no paragraphs.
    pub fn content(&self, document: &Html) -> Option<String> {
        first_match(&self.containers, |_, css| {
            targets(document.root_element(), css)
                .into_iter()
                .filter_map(|container| self.container_text(container))
                .take(1)
                .collect::<Vec<_>>()
        })
        .and_then(|(_, mut found)| found.pop())
    }

    fn container_text(&self, container: ElementRef<'_>) -> Option<String> {
        let paragraphs: Vec<String> = targets(container, &self.paragraphs)
            .into_iter()
            .filter_map(element_text)
            .collect();
        if paragraphs.is_empty() {
            element_text(container)
        } else {
            Some(paragraphs.join("\n\n"))
        }
    }

    pub fn selectors(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self.containers.iter().map(String::as_str).collect();
        all.push(&self.paragraphs);
        for field in [
            &self.author,
            &self.tags,
            &self.published_at,
            &self.image,
            &self.summary,
            &self.video,
        ] {
            all.extend(field.selectors());
        }
        all
    }
}

/// Last-resort anchor scan used when no declared strategy matches.
#[derive(Debug, Clone)]
pub struct AnchorFallback {
    patterns: Vec<Regex>,
}

impl AnchorFallback {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Anchors whose `href` matches at least one pattern, in document order.
    pub fn anchors<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        if self.patterns.is_empty() {
            return Vec::new();
        }
        let Some(selector) = get_or_compile("a[href]") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter(|a| {
                a.value()
                    .attr("href")
                    .is_some_and(|href| self.patterns.iter().any(|p| p.is_match(href)))
            })
            .collect()
    }
}

/// Outcome of resolving a cascade against a document.
#[derive(Debug)]
pub enum Resolution<'a> {
    /// Declared strategy `index` matched these elements.
    Strategy {
        index: usize,
        elements: Vec<ElementRef<'a>>,
    },
    /// No strategy matched; these anchors matched a fallback path pattern.
    AnchorFallback(Vec<ElementRef<'a>>),
    NoMatch,
}

impl<'a> Resolution<'a> {
    pub fn strategy_index(&self) -> Option<usize> {
        match self {
            Resolution::Strategy { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn elements(&self) -> &[ElementRef<'a>] {
        match self {
            Resolution::Strategy { elements, .. } | Resolution::AnchorFallback(elements) => {
                elements.as_slice()
            }
            Resolution::NoMatch => &[],
        }
    }
}

/// Try `query` on each item in order and return the first non-empty result
/// with its index. Items after the winning one are never passed to `query`.
pub fn first_match<S, T>(
    items: &[S],
    mut query: impl FnMut(usize, &S) -> Vec<T>,
) -> Option<(usize, Vec<T>)> {
    items.iter().enumerate().find_map(|(index, item)| {
        let found = query(index, item);
        (!found.is_empty()).then_some((index, found))
    })
}

/// Resolve a listing cascade against a document.
pub fn resolve<'a>(
    document: &'a Html,
    cascade: &[Strategy],
    fallback: &AnchorFallback,
) -> Resolution<'a> {
    if let Some((index, elements)) = first_match(cascade, |_, strategy| strategy.query(document)) {
        return Resolution::Strategy { index, elements };
    }
    let anchors = fallback.anchors(document);
    if anchors.is_empty() {
        Resolution::NoMatch
    } else {
        Resolution::AnchorFallback(anchors)
    }
}

//! Match engine: layered keyword and relevance filtering.
//!
//! Pure functions over a record's already-fetched fields; enrichment
//! (body fetch, PDF fetch) is the scan orchestrator's job. All comparisons
//! happen on normalized text (lowercase, accents stripped), with keywords
//! normalized identically, so "alimentación" and "alimentacion" are the
//! same token.

use regex::Regex;

use crate::models::{DocumentRecord, MatchLocation};
use crate::normalize::normalize;

/// Combine per-keyword results with AND or OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    All,
    Any,
}

/// What to do with an HTML-level match whose PDF rendition was readable
/// but did not match. Extraction failure never discards a match in either
/// policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfPolicy {
    /// Keep the HTML match (default, least surprising).
    Permissive,
    /// Drop the record.
    Strict,
}

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Baseline relevance pattern over normalized text. None disables the
    /// coarse pre-filter.
    pub domain_filter: Option<Regex>,
    pub keywords: Vec<String>,
    pub mode: MatchMode,
    /// Whole-word matching instead of raw substring containment.
    pub exact_word: bool,
    /// Include full body text in the searchable text (requires the deep
    /// fetch).
    pub search_body: bool,
    /// Include PDF-extracted text in the searchable text when a PDF link
    /// exists.
    pub search_pdf: bool,
}

impl MatchConfig {
    /// No filters at all: every record matches. Used for diagnostic
    /// "show me everything" queries.
    pub fn passthrough() -> Self {
        Self {
            domain_filter: None,
            keywords: Vec::new(),
            mode: MatchMode::Any,
            exact_word: false,
            search_body: false,
            search_pdf: false,
        }
    }
}

/// Does the record pass the active filter configuration?
pub fn matches(record: &DocumentRecord, pdf_text: Option<&str>, config: &MatchConfig) -> bool {
    locate_match(record, pdf_text, config).is_some()
}

/// The field in which the match is confirmed: fields are accumulated in
/// title → summary → body → pdf order and the predicate is evaluated after
/// each, so the reported location is the first at which the whole filter
/// configuration is satisfied (keywords in ALL mode may span fields).
pub fn locate_match(
    record: &DocumentRecord,
    pdf_text: Option<&str>,
    config: &MatchConfig,
) -> Option<MatchLocation> {
    let mut cumulative = String::new();
    for (location, part) in searchable_layers(record, pdf_text, config) {
        cumulative.push(' ');
        cumulative.push_str(&normalize(part));
        if predicate(&cumulative, config) {
            return Some(location);
        }
    }
    None
}

/// Evaluate the filter configuration against a free-standing text, e.g.
/// the extracted PDF rendition during cross-validation.
pub fn text_matches(text: &str, config: &MatchConfig) -> bool {
    predicate(&normalize(text), config)
}

/// The enabled text layers of a record, in evaluation order. Title and
/// summary are always searched; body and PDF only on request.
fn searchable_layers<'a>(
    record: &'a DocumentRecord,
    pdf_text: Option<&'a str>,
    config: &MatchConfig,
) -> Vec<(MatchLocation, &'a str)> {
    let mut layers = vec![(MatchLocation::Title, record.title.as_str())];
    if let Some(summary) = &record.summary {
        layers.push((MatchLocation::Summary, summary.as_str()));
    }
    if config.search_body {
        if let Some(body) = &record.body_text {
            layers.push((MatchLocation::Body, body.as_str()));
        }
    }
    if config.search_pdf {
        if let Some(pdf) = pdf_text {
            layers.push((MatchLocation::Pdf, pdf));
        }
    }
    layers
}

/// Evaluate the filter configuration against normalized text.
fn predicate(text: &str, config: &MatchConfig) -> bool {
    if let Some(pattern) = &config.domain_filter {
        if !pattern.is_match(text) {
            return false;
        }
    }
    if config.keywords.is_empty() {
        // Baseline-filter result stands alone.
        return true;
    }
    let mut hits = config
        .keywords
        .iter()
        .map(|k| keyword_hit(text, k, config.exact_word));
    match config.mode {
        MatchMode::All => hits.all(|h| h),
        MatchMode::Any => hits.any(|h| h),
    }
}

/// Containment test for one keyword against normalized text.
fn keyword_hit(text: &str, keyword: &str, exact_word: bool) -> bool {
    let kw = normalize(keyword);
    if kw.is_empty() {
        return true;
    }
    if !exact_word {
        return text.contains(kw.as_str());
    }
    match Regex::new(&format!(r"\b{}\b", regex::escape(&kw))) {
        Ok(rx) => rx.is_match(text),
        // An unbuildable pattern from escaped input should not happen;
        // degrade to substring rather than dropping the keyword.
        Err(_) => text.contains(kw.as_str()),
    }
}

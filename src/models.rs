//! Core data models for the bulletin discovery pipeline.
//!
//! These types represent the issues, publication items, and scan statistics
//! that flow through the locate → expand → match → aggregate pipeline.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// How a record (or the issue it belongs to) was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Resolved from the bulletin's live feed of recent publications.
    LiveFeed,
    /// Resolved from a dated day page or the year calendar index.
    DirectDayPage,
    /// Reconstructed by issue-number estimation and probing.
    HistoricalIndex,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceMode::LiveFeed => "live_feed",
            SourceMode::DirectDayPage => "direct_day_page",
            SourceMode::HistoricalIndex => "historical_index",
        };
        f.write_str(s)
    }
}

/// The field in which a match was confirmed. Recorded for transparency in
/// the output table, never used as a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLocation {
    Title,
    Summary,
    Body,
    Pdf,
}

impl std::fmt::Display for MatchLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchLocation::Title => "title",
            MatchLocation::Summary => "summary",
            MatchLocation::Body => "body",
            MatchLocation::Pdf => "pdf",
        };
        f.write_str(s)
    }
}

/// One discovered publication item.
///
/// Created as a partial candidate by the link-graph walker, enriched on
/// demand (body text, PDF link) by the scan orchestrator, and either
/// filtered out by the match engine or persisted into the final list by the
/// aggregator. Never mutated after aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    /// Which publication stream this came from (e.g. `"boja"`).
    pub bulletin_id: String,
    pub source_mode: SourceMode,
    /// Link text or heading text; may be truncated by the source site.
    pub title: String,
    /// Short excerpt: feed summary or a constructed snippet.
    pub summary: Option<String>,
    /// Full extracted text. Only populated when deep-content search is
    /// requested, since it costs one fetch per candidate.
    pub body_text: Option<String>,
    /// Canonical absolute URL. The dedup key.
    pub url: String,
    /// Present only when a binary rendition link was discovered.
    pub pdf_url: Option<String>,
    /// Date-only precision. Many historical records never get an exact
    /// date; they stay in the result set and sort after dated records.
    pub published_at: Option<NaiveDate>,
    /// Structural section the item was found under.
    pub section_label: Option<String>,
    /// Set once the match engine confirms a match.
    pub match_location: Option<MatchLocation>,
}

/// One resolved periodical issue.
#[derive(Debug, Clone, Serialize)]
pub struct IssueReference {
    pub bulletin_id: String,
    pub year: i32,
    /// Sequential number within the year. Day-page and feed resolutions may
    /// reach the front page without ever learning the number.
    pub issue_number: Option<u32>,
    pub front_page_url: String,
    /// None until confirmed by a date signature in the page content. A
    /// probing candidate accepted on the near-estimate tolerance keeps this
    /// unset rather than guessing.
    pub resolved_date: Option<NaiveDate>,
    pub source_mode: SourceMode,
}

/// Per-bulletin counters collected during a scan.
///
/// Raw candidate counts are reported alongside matched counts so a
/// zero-result query can be told apart from a source outage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceCounts {
    /// Dates in the requested range that were attempted.
    pub dates_scanned: u64,
    /// Dates for which an issue front page was resolved.
    pub dates_resolved: u64,
    /// Candidate documents discovered before filtering.
    pub candidates: u64,
    /// Candidates that passed the active filter configuration.
    pub matched: u64,
    /// Individual fetches that failed after retries and were skipped.
    pub fetch_failures: u64,
}

/// Scan-wide statistics, keyed by bulletin id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub per_bulletin: BTreeMap<String, SourceCounts>,
}

impl ScanReport {
    pub fn counts_mut(&mut self, bulletin_id: &str) -> &mut SourceCounts {
        self.per_bulletin.entry(bulletin_id.to_string()).or_default()
    }

    /// Total candidates across all bulletins (the "raw" half of the
    /// raw/filtered count pair).
    pub fn total_candidates(&self) -> u64 {
        self.per_bulletin.values().map(|c| c.candidates).sum()
    }

    pub fn total_matched(&self) -> u64 {
        self.per_bulletin.values().map(|c| c.matched).sum()
    }

    pub fn total_fetch_failures(&self) -> u64 {
        self.per_bulletin.values().map(|c| c.fetch_failures).sum()
    }
}

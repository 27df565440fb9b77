//! Scan orchestration: drive the full pipeline over a date range.
//!
//! For each requested bulletin and each date in the range: locate the
//! issue, expand its link graph, enrich candidates on demand (body text,
//! PDF rendition), filter through the match engine, and fold everything
//! into one aggregated, capped result list plus a [`ScanReport`] of raw
//! and filtered counts per source.
//!
//! Failures local to one URL or one date are absorbed here as counters and
//! skipped records; only configuration errors abort before fetching.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::aggregate::aggregate;
use crate::config::{Config, LinkRules};
use crate::extract::extract_pdf_text;
use crate::fetch::Fetcher;
use crate::locator::{IssueLocator, LocateOutcome};
use crate::matcher::{self, MatchConfig, PdfPolicy};
use crate::models::{DocumentRecord, MatchLocation, ScanReport};
use crate::normalize::html_to_text;
use crate::progress::{ScanEvent, ScanReporter};
use crate::walker::{find_pdf_link, LinkGraphWalker};

/// Ranges longer than this with deep or PDF options get a slowness
/// warning (never a silent cap).
const WIDE_RANGE_DAYS: i64 = 31;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Bulletin ids to scan; empty means all configured bulletins.
    pub bulletins: Vec<String>,
    /// Fetch each candidate's page and populate `body_text`.
    pub deep: bool,
    /// Cross-validate HTML matches against the official PDF rendition.
    pub validate_pdf: bool,
    pub pdf_policy: PdfPolicy,
    /// Result cap after aggregation; 0 = unlimited.
    pub cap: usize,
}

#[derive(Debug)]
pub struct ScanOutput {
    pub records: Vec<DocumentRecord>,
    pub report: ScanReport,
}

pub async fn run_scan(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    options: &ScanOptions,
    match_config: &MatchConfig,
    reporter: &dyn ScanReporter,
) -> Result<ScanOutput> {
    if options.to < options.from {
        bail!(
            "invalid date range: --to {} is before --from {}",
            options.to,
            options.from
        );
    }

    let bulletin_ids: Vec<String> = if options.bulletins.is_empty() {
        config.bulletins.keys().cloned().collect()
    } else {
        for id in &options.bulletins {
            if !config.bulletins.contains_key(id) {
                bail!(
                    "unknown bulletin '{}'; configured: {}",
                    id,
                    config
                        .bulletins
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        options.bulletins.clone()
    };
    if bulletin_ids.is_empty() {
        bail!("no bulletins configured");
    }

    let range_days = (options.to - options.from).num_days() + 1;
    let expensive = options.deep
        || options.validate_pdf
        || match_config.search_body
        || match_config.search_pdf;
    if expensive && range_days > WIDE_RANGE_DAYS {
        tracing::warn!(
            range_days,
            "deep-content or PDF options over a wide date range will be slow; \
             narrowing the range or disabling them speeds this up"
        );
    }

    let mut report = ScanReport::default();
    let mut matched_records: Vec<DocumentRecord> = Vec::new();

    for bulletin_id in &bulletin_ids {
        let profile = &config.bulletins[bulletin_id];
        let rules = profile.rules()?;
        let locator = IssueLocator::new(bulletin_id, profile.clone(), fetcher.clone());
        let walker = LinkGraphWalker::new(rules.clone(), fetcher.clone(), config.http.concurrency);

        let mut date = options.from;
        while date <= options.to {
            let counts = report.counts_mut(bulletin_id);
            counts.dates_scanned += 1;
            reporter.report(ScanEvent::Locating {
                bulletin: bulletin_id.clone(),
                date,
            });

            let issue = match locator.locate(date).await {
                LocateOutcome::Found(issue) => issue,
                LocateOutcome::NotFound => {
                    date = next_day(date);
                    continue;
                }
            };

            report.counts_mut(bulletin_id).dates_resolved += 1;
            reporter.report(ScanEvent::Expanding {
                bulletin: bulletin_id.clone(),
                date,
            });

            let expansion = walker.expand(&issue).await;
            let candidates = expansion.records.len() as u64;
            {
                let counts = report.counts_mut(bulletin_id);
                counts.fetch_failures += expansion.fetch_failures;
                counts.candidates += candidates;
            }

            let (kept, failures) = filter_candidates(
                expansion.records,
                fetcher.clone(),
                &rules,
                options,
                match_config,
                config.http.concurrency,
            )
            .await;

            let matched = kept.len() as u64;
            {
                let counts = report.counts_mut(bulletin_id);
                counts.fetch_failures += failures;
                counts.matched += matched;
            }
            reporter.report(ScanEvent::Filtered {
                bulletin: bulletin_id.clone(),
                date,
                matched,
                candidates,
            });
            matched_records.extend(kept);

            date = next_day(date);
        }
    }

    Ok(ScanOutput {
        records: aggregate(matched_records, options.cap),
        report,
    })
}

/// Enrich and filter one issue's candidates with a bounded worker pool.
/// Returns the surviving records and the number of soft fetch failures.
async fn filter_candidates(
    candidates: Vec<DocumentRecord>,
    fetcher: Arc<dyn Fetcher>,
    rules: &LinkRules,
    options: &ScanOptions,
    match_config: &MatchConfig,
    concurrency: usize,
) -> (Vec<DocumentRecord>, u64) {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join = tokio::task::JoinSet::new();

    for record in candidates {
        let fetcher = fetcher.clone();
        let rules = rules.clone();
        let options = options.clone();
        let match_config = match_config.clone();
        let sem = sem.clone();
        join.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            evaluate_candidate(record, fetcher, &rules, &options, &match_config).await
        });
    }

    let mut kept = Vec::new();
    let mut failures = 0u64;
    while let Some(joined) = join.join_next().await {
        if let Ok((record, fails)) = joined {
            failures += fails;
            if let Some(record) = record {
                kept.push(record);
            }
        }
    }
    (kept, failures)
}

/// Lazily enrich one candidate, run the match protocol, and apply the PDF
/// cross-validation policy.
async fn evaluate_candidate(
    mut record: DocumentRecord,
    fetcher: Arc<dyn Fetcher>,
    rules: &LinkRules,
    options: &ScanOptions,
    match_config: &MatchConfig,
) -> (Option<DocumentRecord>, u64) {
    let mut failures = 0u64;

    let wants_body = (options.deep || match_config.search_body) && record.body_text.is_none();
    let wants_pdf = match_config.search_pdf || options.validate_pdf;
    let needs_page = wants_body || (wants_pdf && record.pdf_url.is_none());

    if needs_page {
        match fetcher.get_text(&record.url).await {
            Ok(html) => {
                if record.pdf_url.is_none() {
                    record.pdf_url = find_pdf_link(&html, &record.url, rules);
                }
                if wants_body {
                    record.body_text = Some(html_to_text(&html));
                }
            }
            Err(e) => {
                tracing::warn!(url = %record.url, error = %e, "candidate page fetch failed");
                failures += 1;
            }
        }
    }

    // PDF text is fetched at most once and reused by both the pdf search
    // layer and the validation pass. Empty text means extraction was
    // unavailable, not that the document is blank.
    let mut pdf_text: Option<String> = None;
    if wants_pdf {
        if let Some(pdf_url) = record.pdf_url.clone() {
            match fetcher.get_bytes(&pdf_url).await {
                Ok(bytes) => match extract_pdf_text(&bytes) {
                    Ok(text) if !text.trim().is_empty() => pdf_text = Some(text),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(url = %pdf_url, error = %e, "PDF extraction failed");
                    }
                },
                Err(e) => {
                    tracing::warn!(url = %pdf_url, error = %e, "PDF fetch failed");
                    failures += 1;
                }
            }
        }
    }

    let location = match matcher::locate_match(&record, pdf_text.as_deref(), match_config) {
        Some(loc) => loc,
        None => return (None, failures),
    };
    record.match_location = Some(location);

    if options.validate_pdf && location != MatchLocation::Pdf {
        match &pdf_text {
            // Extraction unavailable: the HTML match stands.
            None => {}
            Some(text) => {
                if matcher::text_matches(text, match_config) {
                    record.match_location = Some(MatchLocation::Pdf);
                } else if options.pdf_policy == PdfPolicy::Strict {
                    return (None, failures);
                }
                // Permissive: keep the HTML match as recorded.
            }
        }
    }

    (Some(record), failures)
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

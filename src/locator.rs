//! Issue location: resolve a calendar date to the periodical issue
//! published on that date.
//!
//! There is no stable historical index, so resolution runs an explicit
//! ordered list of strategies until one succeeds:
//!
//! 1. **Live feed** — for dates inside the bulletin's recency window, the
//!    RSS feed of recent publications is cheap and authoritative.
//! 2. **Day page** — bulletins with dated summary URLs resolve directly.
//! 3. **Year calendar** — scan the year index for the anchor whose link
//!    text is the day number and whose href is a day summary.
//! 4. **Estimation + probing** — estimate the issue number from the date
//!    (business-day heuristic), then probe candidate front pages in
//!    increasing distance from the estimate, confirming against a date
//!    signature in the page text; escalating to a whole-month scan before
//!    giving up.
//!
//! Fetch failures on individual candidates mean "try the next candidate",
//! never an aborted search.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::BulletinProfile;
use crate::fetch::{FetchError, Fetcher};
use crate::models::{IssueReference, SourceMode};
use crate::normalize::{html_to_text, normalize};

/// Discriminated result of a locate attempt. A miss for one date never
/// stops a range query.
#[derive(Debug, Clone)]
pub enum LocateOutcome {
    Found(IssueReference),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    RecentFeed,
    DayPage,
    YearCalendar,
    EstimateAndProbe,
}

/// Upper bound on verification fetches when the year calendar shows the
/// same day number more than once (one anchor per month).
const CALENDAR_VERIFY_LIMIT: usize = 12;

lazy_static! {
    static ref SEL_ANCHOR: Selector = Selector::parse("a[href]").expect("valid selector");
    /// `/{year}/{issue}/` shape inside an item URL, used to recover the
    /// issue number from a feed entry link.
    static ref ISSUE_PATH: Regex = Regex::new(r"/(\d{4})/(\d{1,4})/").expect("valid regex");
}

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

pub struct IssueLocator {
    bulletin_id: String,
    profile: BulletinProfile,
    fetcher: Arc<dyn Fetcher>,
    today: NaiveDate,
}

impl IssueLocator {
    pub fn new(bulletin_id: &str, profile: BulletinProfile, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            bulletin_id: bulletin_id.to_string(),
            profile,
            fetcher,
            today: Utc::now().date_naive(),
        }
    }

    /// Pin "now" for deterministic recency-window behavior in tests.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Which strategies apply to this date, in escalation order. Driven by
    /// which URL templates the profile carries.
    fn strategies(&self, date: NaiveDate) -> Vec<Strategy> {
        let mut out = Vec::new();
        let age_days = (self.today - date).num_days();
        if self.profile.feed_url.is_some()
            && age_days >= 0
            && age_days <= self.profile.recency_window_days
        {
            out.push(Strategy::RecentFeed);
        }
        if self.profile.day_page.is_some() {
            out.push(Strategy::DayPage);
        }
        if self.profile.year_index.is_some() {
            out.push(Strategy::YearCalendar);
        }
        if self.profile.issue_front.is_some() {
            out.push(Strategy::EstimateAndProbe);
        }
        out
    }

    pub async fn locate(&self, date: NaiveDate) -> LocateOutcome {
        for strategy in self.strategies(date) {
            let outcome = match strategy {
                Strategy::RecentFeed => self.try_recent_feed(date).await,
                Strategy::DayPage => self.try_day_page(date).await,
                Strategy::YearCalendar => self.try_year_calendar(date).await,
                Strategy::EstimateAndProbe => self.try_estimate_and_probe(date).await,
            };
            if let LocateOutcome::Found(issue) = outcome {
                tracing::debug!(
                    bulletin = %self.bulletin_id,
                    %date,
                    strategy = ?strategy,
                    url = %issue.front_page_url,
                    "issue resolved"
                );
                return LocateOutcome::Found(issue);
            }
        }
        tracing::debug!(bulletin = %self.bulletin_id, %date, "no issue found for date");
        LocateOutcome::NotFound
    }

    async fn try_recent_feed(&self, date: NaiveDate) -> LocateOutcome {
        let feed_url = match &self.profile.feed_url {
            Some(u) => u,
            None => return LocateOutcome::NotFound,
        };
        let xml = match self.fetcher.get_text(feed_url).await {
            Ok(xml) => xml,
            Err(e) => {
                tracing::warn!(bulletin = %self.bulletin_id, url = %feed_url, error = %e, "feed fetch failed");
                return LocateOutcome::NotFound;
            }
        };

        for entry in parse_feed(&xml) {
            if entry.pub_date != Some(date) {
                continue;
            }
            // Prefer reconstructing the issue front page from the item URL
            // shape; fall back to the item link itself, which the walker
            // degrades to a single-section page.
            let (front, number) = match issue_from_item_url(&self.profile, &entry.link) {
                Some((url, n)) => (url, Some(n)),
                None => (entry.link.clone(), None),
            };
            return LocateOutcome::Found(IssueReference {
                bulletin_id: self.bulletin_id.clone(),
                year: date.year(),
                issue_number: number,
                front_page_url: front,
                resolved_date: Some(date),
                source_mode: SourceMode::LiveFeed,
            });
        }
        LocateOutcome::NotFound
    }

    async fn try_day_page(&self, date: NaiveDate) -> LocateOutcome {
        let url = match self.profile.day_page_url(date) {
            Some(u) => u,
            None => return LocateOutcome::NotFound,
        };
        match self.fetcher.get_text(&url).await {
            Ok(_) => LocateOutcome::Found(IssueReference {
                bulletin_id: self.bulletin_id.clone(),
                year: date.year(),
                issue_number: None,
                front_page_url: url,
                resolved_date: Some(date),
                source_mode: SourceMode::DirectDayPage,
            }),
            // 404 here usually means no publication that day.
            Err(_) => LocateOutcome::NotFound,
        }
    }

    async fn try_year_calendar(&self, date: NaiveDate) -> LocateOutcome {
        let index_url = match self.profile.year_index_url(date.year()) {
            Some(u) => u,
            None => return LocateOutcome::NotFound,
        };
        let html = match self.fetcher.get_text(&index_url).await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(bulletin = %self.bulletin_id, url = %index_url, error = %e, "year index fetch failed");
                return LocateOutcome::NotFound;
            }
        };

        let candidates = find_day_links(&html, date, &index_url);
        if candidates.is_empty() {
            return LocateOutcome::NotFound;
        }
        if candidates.len() == 1 {
            return LocateOutcome::Found(self.day_issue(date, candidates[0].clone()));
        }
        // The same day number appears once per month; disambiguate by
        // checking each candidate page for the date's signature.
        for url in candidates.iter().take(CALENDAR_VERIFY_LIMIT) {
            if let Ok(html) = self.fetcher.get_text(url).await {
                if contains_date_signature(&normalize(&html_to_text(&html)), date) {
                    return LocateOutcome::Found(self.day_issue(date, url.clone()));
                }
            }
        }
        LocateOutcome::NotFound
    }

    fn day_issue(&self, date: NaiveDate, url: String) -> IssueReference {
        let issue_number = ISSUE_PATH
            .captures(&url)
            .and_then(|c| c.get(2))
            .and_then(|m| m.as_str().parse().ok());
        IssueReference {
            bulletin_id: self.bulletin_id.clone(),
            year: date.year(),
            issue_number,
            front_page_url: url,
            resolved_date: Some(date),
            source_mode: SourceMode::DirectDayPage,
        }
    }

    async fn try_estimate_and_probe(&self, date: NaiveDate) -> LocateOutcome {
        let estimate = estimate_issue_number(date, self.profile.issues_per_year);
        let mut tried: HashSet<u32> = HashSet::new();
        // Best candidate accepted on proximity alone, kept only if no
        // textual confirmation turns up anywhere in the window.
        let mut fallback: Option<(u32, String)> = None;

        for window in [self.profile.probe_window, self.profile.probe_window_max] {
            for offset in probe_offsets(window) {
                let candidate = estimate as i64 + offset;
                if candidate < 1 {
                    continue;
                }
                let number = candidate as u32;
                if !tried.insert(number) {
                    continue;
                }
                match self.probe_candidate(date, number).await {
                    ProbeResult::Confirmed(issue) => return LocateOutcome::Found(issue),
                    ProbeResult::NearMiss(url) => {
                        if offset.unsigned_abs() as u32 <= self.profile.probe_tolerance
                            && fallback.is_none()
                        {
                            fallback = Some((number, url));
                        }
                    }
                    ProbeResult::Miss => {}
                }
            }
        }

        // Intentional relaxation: a near-estimate page with substantial
        // content but no recognizable date signature. resolved_date stays
        // unset so downstream never treats the guess as confirmed.
        if let Some((number, url)) = fallback {
            tracing::debug!(
                bulletin = %self.bulletin_id,
                %date,
                issue = number,
                "accepting near-estimate candidate without date signature"
            );
            return LocateOutcome::Found(IssueReference {
                bulletin_id: self.bulletin_id.clone(),
                year: date.year(),
                issue_number: Some(number),
                front_page_url: url,
                resolved_date: None,
                source_mode: SourceMode::HistoricalIndex,
            });
        }

        self.scan_month_range(date, &mut tried).await
    }

    /// Last escalation: walk the estimated issue range of the whole month.
    async fn scan_month_range(&self, date: NaiveDate, tried: &mut HashSet<u32>) -> LocateOutcome {
        let first = date.with_day(1).unwrap_or(date);
        let last = last_day_of_month(date);
        let lo = estimate_issue_number(first, self.profile.issues_per_year).saturating_sub(2);
        let hi = estimate_issue_number(last, self.profile.issues_per_year) + 2;

        for number in lo.max(1)..=hi {
            if !tried.insert(number) {
                continue;
            }
            if let ProbeResult::Confirmed(issue) = self.probe_candidate(date, number).await {
                return LocateOutcome::Found(issue);
            }
        }
        LocateOutcome::NotFound
    }

    async fn probe_candidate(&self, date: NaiveDate, number: u32) -> ProbeResult {
        let url = match self.profile.issue_front_url(date.year(), number) {
            Some(u) => u,
            None => return ProbeResult::Miss,
        };
        let html = match self.fetcher.get_text(&url).await {
            Ok(h) => h,
            // Absence and transient failure alike: try the next candidate.
            Err(FetchError::NotFound) => return ProbeResult::Miss,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "probe fetch failed");
                return ProbeResult::Miss;
            }
        };
        let text = normalize(&html_to_text(&html));
        if contains_date_signature(&text, date) {
            return ProbeResult::Confirmed(IssueReference {
                bulletin_id: self.bulletin_id.clone(),
                year: date.year(),
                issue_number: Some(number),
                front_page_url: url,
                resolved_date: Some(date),
                source_mode: SourceMode::HistoricalIndex,
            });
        }
        if text.len() >= self.profile.min_content_len {
            return ProbeResult::NearMiss(url);
        }
        ProbeResult::Miss
    }
}

enum ProbeResult {
    /// Page text contains a recognized formatting of the target date.
    Confirmed(IssueReference),
    /// Page exists with substantial content but no date signature.
    NearMiss(String),
    Miss,
}

/// Estimate the sequential issue number for a date.
///
/// Issues appear only on business days (≈5/7 of calendar days, ≈260 per
/// year), so the elapsed business days scaled by the bulletin's annual
/// issue count gives a starting point for probing.
pub fn estimate_issue_number(date: NaiveDate, issues_per_year: u32) -> u32 {
    let day_of_year = f64::from(date.ordinal());
    let business_days = day_of_year * 5.0 / 7.0;
    let estimate = business_days * f64::from(issues_per_year) / 260.0;
    (estimate.round() as u32).max(1)
}

/// Offsets in increasing distance from the estimate: 0, +1, −1, +2, −2, …
pub fn probe_offsets(window: u32) -> Vec<i64> {
    let mut out = Vec::with_capacity(window as usize * 2 + 1);
    out.push(0);
    for d in 1..=i64::from(window) {
        out.push(d);
        out.push(-d);
    }
    out
}

/// Literal renditions of a date as they appear in gazette page headers.
/// All lowercase without accents, matching [`normalize`]d text.
pub fn date_signatures(date: NaiveDate) -> Vec<String> {
    let (d, m, y) = (date.day(), date.month(), date.year());
    let mut out = vec![
        format!("{:02}/{:02}/{}", d, m, y),
        format!("{}/{}/{}", d, m, y),
        format!("{} de {} de {}", d, MONTHS_ES[(m - 1) as usize], y),
        format!("{}-{:02}-{:02}", y, m, d),
    ];
    out.dedup();
    out
}

pub fn contains_date_signature(normalized_text: &str, date: NaiveDate) -> bool {
    date_signatures(date)
        .iter()
        .any(|sig| normalized_text.contains(sig.as_str()))
}

/// Anchors on a year calendar page whose link text is the bare day number
/// and whose href points at a day summary (ends in `/index.html` or a
/// trailing slash). Returns absolute URLs, order preserved, deduplicated.
pub fn find_day_links(html: &str, date: NaiveDate, base_url: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let day_text = date.day().to_string();
    let base = url::Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for anchor in doc.select(&SEL_ANCHOR) {
        let text: String = anchor.text().collect::<String>().trim().to_string();
        if text != day_text {
            continue;
        }
        let href = match anchor.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        if !(href.ends_with("/index.html") || href.ends_with('/')) {
            continue;
        }
        let abs = resolve_href(base.as_ref(), href);
        if let Some(abs) = abs {
            if seen.insert(abs.clone()) {
                out.push(abs);
            }
        }
    }
    out
}

fn resolve_href(base: Option<&url::Url>, href: &str) -> Option<String> {
    if let Ok(u) = url::Url::parse(href) {
        return Some(u.to_string());
    }
    base.and_then(|b| b.join(href).ok()).map(|u| u.to_string())
}

/// Recover `(front_page_url, issue_number)` from a feed item link using
/// the `/{year}/{issue}/` path shape.
fn issue_from_item_url(profile: &BulletinProfile, item_url: &str) -> Option<(String, u32)> {
    let caps = ISSUE_PATH.captures(item_url)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let number: u32 = caps.get(2)?.as_str().parse().ok()?;
    let front = profile.issue_front_url(year, number)?;
    Some((front, number))
}

/// One entry of a live RSS feed.
#[derive(Debug, Clone, Default)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub pub_date: Option<NaiveDate>,
}

/// Minimal RSS item parser: `<item>` elements with `title`, `link` and
/// `pubDate` (RFC 2822) children. Anything malformed is skipped.
pub fn parse_feed(xml: &str) -> Vec<FeedEntry> {
    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<&'static str> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"item" => current = Some(FeedEntry::default()),
                b"title" if current.is_some() => field = Some("title"),
                b"link" if current.is_some() => field = Some("link"),
                b"pubDate" if current.is_some() => field = Some("pubDate"),
                _ => field = None,
            },
            Ok(quick_xml::events::Event::Text(t)) => {
                if let (Some(entry), Some(name)) = (current.as_mut(), field) {
                    let value = t.unescape().unwrap_or_default().trim().to_string();
                    apply_field(entry, name, &value);
                }
            }
            Ok(quick_xml::events::Event::CData(t)) => {
                if let (Some(entry), Some(name)) = (current.as_mut(), field) {
                    let value = String::from_utf8_lossy(&t.into_inner()).trim().to_string();
                    apply_field(entry, name, &value);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"item" => {
                    if let Some(entry) = current.take() {
                        if !entry.link.is_empty() {
                            entries.push(entry);
                        }
                    }
                }
                _ => field = None,
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    entries
}

fn apply_field(entry: &mut FeedEntry, name: &str, value: &str) {
    match name {
        "title" => entry.title = value.to_string(),
        "link" => entry.link = value.to_string(),
        "pubDate" => {
            entry.pub_date = DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|dt| dt.date_naive());
        }
        _ => {}
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (y, m) = (date.year(), date.month());
    let first_next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    first_next
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

//! End-to-end pipeline tests against a canned in-memory gazette.
//!
//! A `MapFetcher` serves a small fake bulletin (year calendar, issue front
//! pages, section pages, document pages, a broken PDF) so the full
//! locate → expand → match → aggregate flow runs without any network.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

use boletin_finder::config::Config;
use boletin_finder::fetch::{FetchError, Fetcher};
use boletin_finder::matcher::{MatchConfig, MatchMode, PdfPolicy};
use boletin_finder::models::MatchLocation;
use boletin_finder::progress::NoReporter;
use boletin_finder::scan::{run_scan, ScanOptions};

const BASE: &str = "https://gazette.test";

struct MapFetcher {
    pages: HashMap<String, String>,
    binaries: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.pages.get(url).cloned().ok_or(FetchError::NotFound)
    }
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.binaries.get(url).cloned().ok_or(FetchError::NotFound)
    }
}

/// A fake gazette under construction: one issue per published day, one
/// section per issue, documents under the section.
struct Gazette {
    pages: HashMap<String, String>,
    binaries: HashMap<String, Vec<u8>>,
    calendar_links: Vec<String>,
}

impl Gazette {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            binaries: HashMap::new(),
            calendar_links: Vec::new(),
        }
    }

    fn add_day(&mut self, date: NaiveDate, issue: u32, docs: &[(&str, &str)]) {
        use chrono::Datelike;
        let front = format!("{}/{}/{}/index.html", BASE, date.year(), issue);
        self.calendar_links.push(format!(
            r#"<a href="/{}/{}/index.html">{}</a>"#,
            date.year(),
            issue,
            date.day()
        ));
        self.pages.insert(
            front,
            format!(
                r#"<body><h1>Gaceta número {} - {}</h1>
                   <a href="s1.html">1. Disposiciones y anuncios</a></body>"#,
                issue, date
            ),
        );
        let mut section_body = String::from("<body>");
        for (doc_id, title) in docs {
            section_body.push_str(&format!(r#"<a href="{}.html">{}</a>"#, doc_id, title));
        }
        section_body.push_str("</body>");
        self.pages.insert(
            format!("{}/{}/{}/s1.html", BASE, date.year(), issue),
            section_body,
        );
        for (doc_id, title) in docs {
            self.pages.insert(
                format!("{}/{}/{}/{}.html", BASE, date.year(), issue, doc_id),
                format!(
                    r#"<body><h1>{}</h1><p>Texto completo de la disposición.</p>
                       <a href="{}.pdf">Descargar PDF</a></body>"#,
                    title, doc_id
                ),
            );
            self.binaries.insert(
                format!("{}/{}/{}/{}.pdf", BASE, date.year(), issue, doc_id),
                b"not really a pdf".to_vec(),
            );
        }
    }

    fn finish(mut self, year: i32) -> Arc<MapFetcher> {
        self.pages.insert(
            format!("{}/{}/", BASE, year),
            format!("<body>{}</body>", self.calendar_links.join("\n")),
        );
        Arc::new(MapFetcher {
            pages: self.pages,
            binaries: self.binaries,
        })
    }
}

fn test_config() -> Config {
    let toml_str = format!(
        r#"
[bulletins.gaceta]
base_url = "{base}"
year_index = "{base}/{{year}}/"
issue_front = "{base}/{{year}}/{{issue}}/index.html"
issues_per_year = 250
min_content_len = 200
section_link_pattern = "/s\\d+\\.html$"
document_link_pattern = "/\\d{{4}}/\\d+/\\d+\\.html$"
min_link_text_len = 10
"#,
        base = BASE
    );
    toml::from_str(&toml_str).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn base_options(from: NaiveDate, to: NaiveDate) -> ScanOptions {
    ScanOptions {
        from,
        to,
        bulletins: vec!["gaceta".to_string()],
        deep: false,
        validate_pdf: false,
        pdf_policy: PdfPolicy::Permissive,
        cap: 0,
    }
}

fn keyword_config(config: &Config, keywords: &[&str]) -> MatchConfig {
    MatchConfig {
        domain_filter: Some(config.search.domain_regex().unwrap()),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        mode: MatchMode::Any,
        exact_word: true,
        search_body: false,
        search_pdf: false,
    }
}

#[tokio::test]
async fn range_continues_past_unresolvable_dates() {
    let mut gazette = Gazette::new();
    // Ten-day range; the 7th and 8th never publish (nothing resolves).
    let published_days = [3u32, 4, 5, 6, 9, 10, 11, 12];
    for (i, day) in published_days.iter().enumerate() {
        let docs: Vec<(String, &str)> = vec![
            (format!("{}0", i + 1), "Orden de ayudas a la vivienda protegida"),
            (format!("{}1", i + 1), "Nombramiento de personal funcionario"),
        ];
        let docs_ref: Vec<(&str, &str)> = docs.iter().map(|(a, b)| (a.as_str(), *b)).collect();
        gazette.add_day(date(2025, 3, *day), 40 + i as u32, &docs_ref);
    }
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let options = base_options(date(2025, 3, 3), date(2025, 3, 12));
    let match_config = keyword_config(&config, &["vivienda"]);

    let output = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap();

    let counts = &output.report.per_bulletin["gaceta"];
    assert_eq!(counts.dates_scanned, 10);
    assert_eq!(counts.dates_resolved, 8);
    assert_eq!(counts.candidates, 16);
    // One housing order per resolved day.
    assert_eq!(output.records.len(), 8);
    assert!(output
        .records
        .iter()
        .all(|r| r.title.contains("vivienda")));
}

#[tokio::test]
async fn domain_filter_and_keyword_select_single_record() {
    let mut gazette = Gazette::new();
    gazette.add_day(
        date(2025, 3, 3),
        45,
        &[
            ("10", "Ayudas para vivienda"),
            ("11", "Nombramiento de funcionario"),
        ],
    );
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let options = base_options(date(2025, 3, 3), date(2025, 3, 3));
    let match_config = keyword_config(&config, &["vivienda"]);

    let output = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap();

    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert!(record.url.ends_with("/2025/45/10.html"));
    assert_eq!(record.published_at, Some(date(2025, 3, 3)));
    assert_eq!(record.match_location, Some(MatchLocation::Title));
    assert_eq!(record.section_label.as_deref(), Some("1. Disposiciones y anuncios"));
}

#[tokio::test]
async fn cap_keeps_most_recent_dates_in_descending_order() {
    let mut gazette = Gazette::new();
    for (i, day) in [1u32, 2, 3, 4, 5].iter().enumerate() {
        let doc_id = format!("{}0", i + 1);
        let docs = [(doc_id.as_str(), "Convocatoria de ayudas a la vivienda rural")];
        gazette.add_day(date(2025, 9, *day), 180 + i as u32, &docs);
    }
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let mut options = base_options(date(2025, 9, 1), date(2025, 9, 5));
    options.cap = 3;
    let match_config = keyword_config(&config, &["vivienda"]);

    let output = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap();

    let dates: Vec<_> = output
        .records
        .iter()
        .map(|r| r.published_at.unwrap())
        .collect();
    assert_eq!(
        dates,
        vec![date(2025, 9, 5), date(2025, 9, 4), date(2025, 9, 3)]
    );
}

#[tokio::test]
async fn passthrough_returns_every_candidate() {
    let mut gazette = Gazette::new();
    gazette.add_day(
        date(2025, 3, 3),
        45,
        &[
            ("10", "Ayudas para vivienda"),
            ("11", "Nombramiento de funcionario"),
        ],
    );
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let options = base_options(date(2025, 3, 3), date(2025, 3, 3));
    let match_config = MatchConfig::passthrough();

    let output = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap();

    assert_eq!(output.records.len(), 2);
}

#[tokio::test]
async fn unreadable_pdf_never_discards_an_html_match() {
    let mut gazette = Gazette::new();
    gazette.add_day(date(2025, 3, 3), 45, &[("10", "Ayudas para vivienda")]);
    // The PDF bytes in the fixture are garbage, so extraction fails.
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let mut options = base_options(date(2025, 3, 3), date(2025, 3, 3));
    options.validate_pdf = true;
    let match_config = keyword_config(&config, &["vivienda"]);

    let output = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap();

    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    // Kept, with the HTML-level location and the discovered PDF link.
    assert_eq!(record.match_location, Some(MatchLocation::Title));
    assert!(record.pdf_url.as_deref().unwrap().ends_with("/10.pdf"));
}

#[tokio::test]
async fn strict_policy_also_keeps_match_when_extraction_fails() {
    let mut gazette = Gazette::new();
    gazette.add_day(date(2025, 3, 3), 45, &[("10", "Ayudas para vivienda")]);
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let mut options = base_options(date(2025, 3, 3), date(2025, 3, 3));
    options.validate_pdf = true;
    options.pdf_policy = PdfPolicy::Strict;
    let match_config = keyword_config(&config, &["vivienda"]);

    let output = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap();

    // Strict mode only drops matches whose PDF was readable but did not
    // match; unreadable PDFs leave the HTML match alone.
    assert_eq!(output.records.len(), 1);
}

#[tokio::test]
async fn deep_search_reaches_body_text() {
    let mut gazette = Gazette::new();
    // Title says nothing; the body text (same for every fixture doc)
    // contains "disposición".
    gazette.add_day(
        date(2025, 3, 3),
        45,
        &[("10", "Resolución de la Dirección General de ayudas")],
    );
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let mut options = base_options(date(2025, 3, 3), date(2025, 3, 3));
    options.deep = true;
    let mut match_config = keyword_config(&config, &["disposicion"]);
    match_config.search_body = true;

    let output = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap();

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].match_location, Some(MatchLocation::Body));
    assert!(output.records[0].body_text.is_some());
}

#[tokio::test]
async fn inverted_range_is_a_configuration_error() {
    let gazette = Gazette::new();
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let options = base_options(date(2025, 3, 10), date(2025, 3, 3));
    let match_config = MatchConfig::passthrough();

    let err = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid date range"));
}

#[tokio::test]
async fn unknown_bulletin_is_a_configuration_error() {
    let gazette = Gazette::new();
    let fetcher = gazette.finish(2025);

    let config = test_config();
    let mut options = base_options(date(2025, 3, 3), date(2025, 3, 3));
    options.bulletins = vec!["gaceta-inexistente".to_string()];
    let match_config = MatchConfig::passthrough();

    let err = run_scan(&config, fetcher, &options, &match_config, &NoReporter)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown bulletin"));
}

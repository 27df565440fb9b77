//! TOML configuration: HTTP client settings, search defaults, and bulletin
//! profiles.
//!
//! A bulletin profile describes one publication stream entirely as data —
//! URL templates, link-shape patterns, and probing parameters — so the
//! locator and walker heuristics are unit-testable without touching live
//! HTML. Built-in profiles for BOJA and BOE are compiled in and used when
//! no config file exists.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub bulletins: BTreeMap<String, BulletinProfile>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Bound on concurrent fetches within one pipeline phase.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_concurrency() -> usize {
    6
}
fn default_user_agent() -> String {
    // Gazette sites serve reduced markup to obvious bots.
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Result cap applied after aggregation. 0 means unlimited.
    #[serde(default = "default_cap")]
    pub cap: usize,
    /// Baseline relevance pattern, applied to normalized text (lowercase,
    /// accents stripped) when the domain filter is enabled.
    #[serde(default = "default_domain_pattern")]
    pub domain_pattern: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cap: default_cap(),
            domain_pattern: default_domain_pattern(),
        }
    }
}

fn default_cap() -> usize {
    200
}
fn default_domain_pattern() -> String {
    r"\b(ayuda|ayudas|subvencion|subvenciones|convocatoria|convocatorias|bases reguladoras|beca|becas|premio|premios|incentivo|incentivos)\b"
        .to_string()
}

impl SearchConfig {
    pub fn domain_regex(&self) -> Result<Regex> {
        Regex::new(&self.domain_pattern)
            .with_context(|| format!("invalid search.domain_pattern: {}", self.domain_pattern))
    }
}

/// One publication stream, described as data.
///
/// URL templates use `{year}`, `{issue}`, `{month}`, `{day}` placeholders
/// (month and day zero-padded to two digits). Which locate strategies apply
/// to a bulletin follows from which templates are present: a feed URL
/// enables the recency lookup, `day_page` enables direct day resolution,
/// `year_index` enables the calendar scan, and `issue_front` enables
/// estimation and probing.
#[derive(Debug, Deserialize, Clone)]
pub struct BulletinProfile {
    pub base_url: String,
    /// Year calendar index listing day links, e.g. `".../boja/{year}/"`.
    #[serde(default)]
    pub year_index: Option<String>,
    /// Issue front page, e.g. `".../boja/{year}/{issue}/index.html"`.
    #[serde(default)]
    pub issue_front: Option<String>,
    /// Dated day summary page, e.g. `".../boe/dias/{year}/{month}/{day}/"`.
    #[serde(default)]
    pub day_page: Option<String>,
    /// Live feed of recently published items (RSS).
    #[serde(default)]
    pub feed_url: Option<String>,
    /// Approximate annual issue count; one issue per business day is ~250.
    #[serde(default = "default_issues_per_year")]
    pub issues_per_year: u32,
    /// Dates at most this many days old may be resolved via the live feed.
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,
    /// Initial symmetric probing window around the estimated issue number.
    #[serde(default = "default_probe_window")]
    pub probe_window: u32,
    /// Escalated window when the initial one finds no date signature.
    #[serde(default = "default_probe_window_max")]
    pub probe_window_max: u32,
    /// A probed page with no date signature may still be accepted when its
    /// offset from the estimate is within this tolerance and the page has
    /// substantial content. Tune against known issue/date pairs.
    #[serde(default = "default_probe_tolerance")]
    pub probe_tolerance: u32,
    /// Minimum text length for the tolerance acceptance above.
    #[serde(default = "default_min_content_len")]
    pub min_content_len: usize,
    /// Href shape of section links on an issue front page. Absent means
    /// the bulletin has no section level and the front page lists items
    /// directly.
    #[serde(default)]
    pub section_link_pattern: Option<String>,
    /// Href shape of per-item document links.
    #[serde(default = "default_document_link_pattern")]
    pub document_link_pattern: String,
    /// Matched against link text or href to find the PDF rendition.
    #[serde(default = "default_pdf_link_pattern")]
    pub pdf_link_pattern: String,
    /// Links with shorter text are navigation, not content.
    #[serde(default = "default_min_link_text_len")]
    pub min_link_text_len: usize,
    /// Path segments that mark non-document links.
    #[serde(default = "default_exclude_path_segments")]
    pub exclude_path_segments: Vec<String>,
}

fn default_issues_per_year() -> u32 {
    250
}
fn default_recency_window_days() -> i64 {
    30
}
fn default_probe_window() -> u32 {
    20
}
fn default_probe_window_max() -> u32 {
    50
}
fn default_probe_tolerance() -> u32 {
    5
}
fn default_min_content_len() -> usize {
    1500
}
fn default_document_link_pattern() -> String {
    r"\.html?$".to_string()
}
fn default_pdf_link_pattern() -> String {
    r"(?i)descargar\s+pdf|\.pdf(\?|$)".to_string()
}
fn default_min_link_text_len() -> usize {
    15
}
fn default_exclude_path_segments() -> Vec<String> {
    ["sumario", "portada", "ayuda", "aviso-legal", "accesibilidad"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Compiled link heuristics for one bulletin.
#[derive(Debug, Clone)]
pub struct LinkRules {
    pub section_link: Option<Regex>,
    pub document_link: Regex,
    pub pdf_link: Regex,
    pub min_link_text_len: usize,
    pub exclude_path_segments: Vec<String>,
}

impl BulletinProfile {
    pub fn year_index_url(&self, year: i32) -> Option<String> {
        self.year_index
            .as_ref()
            .map(|t| t.replace("{year}", &year.to_string()))
    }

    pub fn issue_front_url(&self, year: i32, issue: u32) -> Option<String> {
        self.issue_front.as_ref().map(|t| {
            t.replace("{year}", &year.to_string())
                .replace("{issue}", &issue.to_string())
        })
    }

    pub fn day_page_url(&self, date: NaiveDate) -> Option<String> {
        self.day_page.as_ref().map(|t| {
            t.replace("{year}", &date.year().to_string())
                .replace("{month}", &format!("{:02}", date.month()))
                .replace("{day}", &format!("{:02}", date.day()))
        })
    }

    /// Compile the link-shape patterns. Called once per scan; validated at
    /// config load so failures surface before any fetching.
    pub fn rules(&self) -> Result<LinkRules> {
        let section_link = match &self.section_link_pattern {
            Some(p) => Some(
                Regex::new(p).with_context(|| format!("invalid section_link_pattern: {}", p))?,
            ),
            None => None,
        };
        let document_link = Regex::new(&self.document_link_pattern).with_context(|| {
            format!(
                "invalid document_link_pattern: {}",
                self.document_link_pattern
            )
        })?;
        let pdf_link = Regex::new(&self.pdf_link_pattern)
            .with_context(|| format!("invalid pdf_link_pattern: {}", self.pdf_link_pattern))?;
        Ok(LinkRules {
            section_link,
            document_link,
            pdf_link,
            min_link_text_len: self.min_link_text_len,
            exclude_path_segments: self.exclude_path_segments.clone(),
        })
    }
}

/// Load and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config file when it exists, otherwise the built-in profiles.
pub fn load_or_builtin(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::builtin())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.http.concurrency == 0 {
        bail!("http.concurrency must be > 0");
    }
    config.search.domain_regex()?;

    for (id, profile) in &config.bulletins {
        if profile.base_url.is_empty() {
            bail!("bulletins.{}: base_url must not be empty", id);
        }
        let has_route = profile.feed_url.is_some()
            || profile.year_index.is_some()
            || profile.day_page.is_some()
            || profile.issue_front.is_some();
        if !has_route {
            bail!(
                "bulletins.{}: needs at least one of feed_url, year_index, day_page, issue_front",
                id
            );
        }
        if let Some(t) = &profile.year_index {
            if !t.contains("{year}") {
                bail!("bulletins.{}: year_index must contain {{year}}", id);
            }
        }
        if let Some(t) = &profile.issue_front {
            if !t.contains("{year}") || !t.contains("{issue}") {
                bail!(
                    "bulletins.{}: issue_front must contain {{year}} and {{issue}}",
                    id
                );
            }
        }
        if let Some(t) = &profile.day_page {
            if !t.contains("{year}") || !t.contains("{month}") || !t.contains("{day}") {
                bail!(
                    "bulletins.{}: day_page must contain {{year}}, {{month}} and {{day}}",
                    id
                );
            }
        }
        if profile.issues_per_year == 0 {
            bail!("bulletins.{}: issues_per_year must be > 0", id);
        }
        if profile.probe_window > profile.probe_window_max {
            bail!(
                "bulletins.{}: probe_window ({}) exceeds probe_window_max ({})",
                id,
                profile.probe_window,
                profile.probe_window_max
            );
        }
        profile
            .rules()
            .with_context(|| format!("bulletins.{}", id))?;
    }

    Ok(())
}

impl Config {
    /// Built-in profiles for the two streams the tool ships with.
    pub fn builtin() -> Self {
        let mut bulletins = BTreeMap::new();

        bulletins.insert(
            "boja".to_string(),
            BulletinProfile {
                base_url: "https://www.juntadeandalucia.es".to_string(),
                year_index: Some("https://www.juntadeandalucia.es/boja/{year}/".to_string()),
                issue_front: Some(
                    "https://www.juntadeandalucia.es/boja/{year}/{issue}/index.html".to_string(),
                ),
                day_page: None,
                feed_url: Some(
                    "https://www.juntadeandalucia.es/boja/distribucion/boja.xml".to_string(),
                ),
                issues_per_year: 250,
                recency_window_days: default_recency_window_days(),
                probe_window: default_probe_window(),
                probe_window_max: default_probe_window_max(),
                probe_tolerance: default_probe_tolerance(),
                min_content_len: default_min_content_len(),
                section_link_pattern: Some(r"/boja/\d{4}/\d+/s\d+\.html$".to_string()),
                document_link_pattern: r"/boja/\d{4}/\d+/.+\.html$".to_string(),
                pdf_link_pattern: default_pdf_link_pattern(),
                min_link_text_len: default_min_link_text_len(),
                exclude_path_segments: default_exclude_path_segments(),
            },
        );

        bulletins.insert(
            "boe".to_string(),
            BulletinProfile {
                base_url: "https://www.boe.es".to_string(),
                year_index: None,
                issue_front: None,
                day_page: Some("https://www.boe.es/boe/dias/{year}/{month}/{day}/".to_string()),
                feed_url: Some("https://www.boe.es/rss/boe.php".to_string()),
                issues_per_year: 310,
                recency_window_days: default_recency_window_days(),
                probe_window: default_probe_window(),
                probe_window_max: default_probe_window_max(),
                probe_tolerance: default_probe_tolerance(),
                min_content_len: default_min_content_len(),
                section_link_pattern: Some(r"/boe/dias/\d{4}/\d{2}/\d{2}/index\.php\?s=".to_string()),
                document_link_pattern: r"/diario_boe/txt\.php\?id=BOE-[A-Z]+-\d{4}-\d+".to_string(),
                pdf_link_pattern: default_pdf_link_pattern(),
                min_link_text_len: default_min_link_text_len(),
                exclude_path_segments: default_exclude_path_segments(),
            },
        );

        Config {
            http: HttpConfig::default(),
            search: SearchConfig::default(),
            bulletins,
        }
    }
}

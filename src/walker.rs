//! Link-graph walker: expand an issue front page into candidate records.
//!
//! Two-level descent driven by the bulletin profile's URL-shape patterns:
//! front page → section pages → per-item document links. Link-text
//! heuristics (minimum length, excluded path segments) keep navigation
//! links out. When a front page shows no recognizable sections it is
//! treated as a single section; when a section shows no recognizable
//! document links, records are mined from its structure (headings, list
//! items), bottoming out at one record for the whole page.
//!
//! Section fetches within one issue run concurrently under a bounded
//! semaphore. Output order is not meaningful; the aggregator imposes the
//! final ordering.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

use crate::config::LinkRules;
use crate::fetch::Fetcher;
use crate::models::{DocumentRecord, IssueReference};
use crate::normalize::html_to_text;

lazy_static! {
    static ref SEL_ANCHOR: Selector = Selector::parse("a[href]").expect("valid selector");
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_BLOCKS: Selector = Selector::parse("h1, h2, h3, h4, li").expect("valid selector");
}

/// Snippet length for whole-page fallback summaries.
const SNIPPET_CHARS: usize = 240;

/// One anchor with resolved absolute URL and trimmed text.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct ExpandResult {
    pub records: Vec<DocumentRecord>,
    pub fetch_failures: u64,
}

pub struct LinkGraphWalker {
    rules: LinkRules,
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
}

impl LinkGraphWalker {
    pub fn new(rules: LinkRules, fetcher: Arc<dyn Fetcher>, concurrency: usize) -> Self {
        Self {
            rules,
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Expand an issue front page into partial document records (no body
    /// text yet). Failures on individual pages are counted and skipped.
    pub async fn expand(&self, issue: &IssueReference) -> ExpandResult {
        let mut result = ExpandResult::default();

        let front_url = &issue.front_page_url;
        let front_html = match self.fetcher.get_text(front_url).await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(url = %front_url, error = %e, "issue front page fetch failed");
                result.fetch_failures = 1;
                return result;
            }
        };

        let links = extract_links(&front_html, front_url);
        let sections = self.section_links(&links, front_url);

        // Graceful degradation: a front page without section links is
        // itself the only section, and its HTML is already in hand.
        let (sections, mut cached): (Vec<(String, Option<String>)>, Option<String>) =
            if sections.is_empty() {
                (vec![(front_url.clone(), None)], Some(front_html))
            } else {
                (
                    sections
                        .into_iter()
                        .map(|l| (l.url, Some(l.text)))
                        .collect(),
                    None,
                )
            };

        // Concurrent section fetches, bounded by the shared pool size.
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut join = tokio::task::JoinSet::new();
        let mut htmls: Vec<Option<String>> = vec![None; sections.len()];
        for (idx, (section_url, _)) in sections.iter().enumerate() {
            if idx == 0 && cached.is_some() {
                htmls[0] = cached.take();
                continue;
            }
            let fetcher = self.fetcher.clone();
            let sem = sem.clone();
            let section_url = section_url.clone();
            join.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                (idx, fetcher.get_text(&section_url).await)
            });
        }
        while let Some(joined) = join.join_next().await {
            if let Ok((idx, fetched)) = joined {
                match fetched {
                    Ok(html) => htmls[idx] = Some(html),
                    Err(e) => {
                        tracing::warn!(url = %sections[idx].0, error = %e, "section fetch failed");
                        result.fetch_failures += 1;
                    }
                }
            }
        }

        let mut seen_urls: HashSet<String> = HashSet::new();
        for (idx, (section_url, section_label)) in sections.iter().enumerate() {
            let html = match &htmls[idx] {
                Some(h) => h,
                None => continue,
            };
            let docs = self.document_links(&extract_links(html, section_url), front_url, section_url);
            if docs.is_empty() {
                for record in self.mine_structure(html, section_url, section_label.clone(), issue) {
                    if seen_urls.insert(record.url.clone()) {
                        result.records.push(record);
                    }
                }
                continue;
            }
            for link in docs {
                if !seen_urls.insert(link.url.clone()) {
                    continue;
                }
                result.records.push(DocumentRecord {
                    bulletin_id: issue.bulletin_id.clone(),
                    source_mode: issue.source_mode,
                    title: link.text,
                    summary: None,
                    body_text: None,
                    url: link.url,
                    pdf_url: None,
                    published_at: issue.resolved_date,
                    section_label: section_label.clone(),
                    match_location: None,
                });
            }
        }

        result
    }

    /// Section-shaped links on the front page, order preserved.
    fn section_links(&self, links: &[Link], front_url: &str) -> Vec<Link> {
        let pattern = match &self.rules.section_link {
            Some(p) => p,
            None => return Vec::new(),
        };
        links
            .iter()
            .filter(|l| l.url != front_url && pattern.is_match(&l.url))
            .cloned()
            .collect()
    }

    /// Document-shaped links within a section, after the navigation
    /// heuristics.
    fn document_links(&self, links: &[Link], front_url: &str, section_url: &str) -> Vec<Link> {
        links
            .iter()
            .filter(|l| {
                l.url != front_url
                    && l.url != section_url
                    && self.rules.document_link.is_match(&l.url)
                    && self
                        .rules
                        .section_link
                        .as_ref()
                        .map_or(true, |p| !p.is_match(&l.url))
                    && l.text.chars().count() >= self.rules.min_link_text_len
                    && !is_excluded_path(&l.url, &self.rules.exclude_path_segments)
            })
            .cloned()
            .collect()
    }

    /// Structural fallback: headings and list items become records; a page
    /// with neither becomes a single whole-page record.
    fn mine_structure(
        &self,
        html: &str,
        page_url: &str,
        section_label: Option<String>,
        issue: &IssueReference,
    ) -> Vec<DocumentRecord> {
        let doc = Html::parse_document(html);
        let mut records = Vec::new();

        for (i, block) in doc.select(&SEL_BLOCKS).enumerate() {
            let text = squash(&block.text().collect::<String>());
            if text.chars().count() < self.rules.min_link_text_len {
                continue;
            }
            records.push(DocumentRecord {
                bulletin_id: issue.bulletin_id.clone(),
                source_mode: issue.source_mode,
                title: text,
                summary: None,
                body_text: None,
                url: format!("{}#item-{}", page_url, i + 1),
                pdf_url: None,
                published_at: issue.resolved_date,
                section_label: section_label.clone(),
                match_location: None,
            });
        }

        if !records.is_empty() {
            return records;
        }

        // Whole page as one record.
        let page_text = html_to_text(html);
        let title = doc
            .select(&SEL_TITLE)
            .next()
            .map(|t| squash(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| page_url.to_string());
        let snippet: String = page_text.chars().take(SNIPPET_CHARS).collect();
        vec![DocumentRecord {
            bulletin_id: issue.bulletin_id.clone(),
            source_mode: issue.source_mode,
            title,
            summary: Some(snippet),
            body_text: Some(page_text),
            url: page_url.to_string(),
            pdf_url: None,
            published_at: issue.resolved_date,
            section_label,
            match_location: None,
        }]
    }
}

/// All anchors of a page with hrefs resolved against the page URL,
/// deduplicated by URL (first occurrence wins).
pub fn extract_links(html: &str, base_url: &str) -> Vec<Link> {
    let doc = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for anchor in doc.select(&SEL_ANCHOR) {
        let href = match anchor.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        let abs = match Url::parse(href) {
            Ok(u) => u.to_string(),
            Err(_) => match base.as_ref().and_then(|b| b.join(href).ok()) {
                Some(u) => u.to_string(),
                None => continue,
            },
        };
        if !seen.insert(abs.clone()) {
            continue;
        }
        out.push(Link {
            url: abs,
            text: squash(&anchor.text().collect::<String>()),
        });
    }
    out
}

/// First link on a page that looks like the official PDF rendition, by
/// link text ("Descargar PDF" and variants) or by href shape.
pub fn find_pdf_link(html: &str, base_url: &str, rules: &LinkRules) -> Option<String> {
    extract_links(html, base_url)
        .into_iter()
        .find(|l| rules.pdf_link.is_match(&l.text) || rules.pdf_link.is_match(&l.url))
        .map(|l| l.url)
}

fn is_excluded_path(url: &str, segments: &[String]) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    segments.iter().any(|s| path.contains(s.as_str()))
}

/// Collapse internal whitespace runs and trim. Link text in gazette markup
/// is full of layout newlines.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fetch::FetchError;
    use crate::models::SourceMode;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            self.pages.get(url).cloned().ok_or(FetchError::NotFound)
        }
        async fn get_bytes(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::NotFound)
        }
    }

    fn boja_rules() -> LinkRules {
        Config::builtin().bulletins["boja"].rules().unwrap()
    }

    fn issue(front: &str) -> IssueReference {
        IssueReference {
            bulletin_id: "boja".to_string(),
            year: 2025,
            issue_number: Some(45),
            front_page_url: front.to_string(),
            resolved_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 3),
            source_mode: SourceMode::HistoricalIndex,
        }
    }

    const FRONT: &str = "https://www.juntadeandalucia.es/boja/2025/45/index.html";

    #[test]
    fn links_resolved_and_deduped() {
        let html = r##"
            <body>
              <a href="s1.html">Sección primera</a>
              <a href="/boja/2025/45/s1.html">Sección primera (otra vez)</a>
              <a href="#arriba">arriba</a>
              <a href="javascript:void(0)">menú</a>
            </body>"##;
        let links = extract_links(html, FRONT);
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0].url,
            "https://www.juntadeandalucia.es/boja/2025/45/s1.html"
        );
        assert_eq!(links[0].text, "Sección primera");
    }

    #[test]
    fn document_heuristics_reject_navigation() {
        let walker = LinkGraphWalker::new(
            boja_rules(),
            Arc::new(MapFetcher {
                pages: HashMap::new(),
            }),
            2,
        );
        let section = "https://www.juntadeandalucia.es/boja/2025/45/s3.html";
        let links = vec![
            Link {
                url: "https://www.juntadeandalucia.es/boja/2025/45/12.html".to_string(),
                text: "Orden por la que se convocan subvenciones de vivienda".to_string(),
            },
            Link {
                // Too short to be a content link.
                url: "https://www.juntadeandalucia.es/boja/2025/45/13.html".to_string(),
                text: "Siguiente".to_string(),
            },
            Link {
                // Excluded path segment.
                url: "https://www.juntadeandalucia.es/boja/2025/45/sumario.html".to_string(),
                text: "Sumario completo del boletín oficial".to_string(),
            },
            Link {
                // Section-shaped, not a document.
                url: "https://www.juntadeandalucia.es/boja/2025/45/s4.html".to_string(),
                text: "Sección de otras disposiciones y anuncios".to_string(),
            },
        ];
        let docs = walker.document_links(&links, FRONT, section);
        assert_eq!(docs.len(), 1);
        assert!(docs[0].url.ends_with("/12.html"));
    }

    #[test]
    fn pdf_link_found_by_text_or_href() {
        let rules = boja_rules();
        let by_text = r#"<body><a href="/boja/2025/45/12.pdf-file">Descargar PDF</a></body>"#;
        assert_eq!(
            find_pdf_link(by_text, FRONT, &rules).as_deref(),
            Some("https://www.juntadeandalucia.es/boja/2025/45/12.pdf-file")
        );
        let by_href = r#"<body><a href="/boja/2025/45/12.pdf">versión oficial</a></body>"#;
        assert_eq!(
            find_pdf_link(by_href, FRONT, &rules).as_deref(),
            Some("https://www.juntadeandalucia.es/boja/2025/45/12.pdf")
        );
        assert_eq!(find_pdf_link("<body></body>", FRONT, &rules), None);
    }

    #[tokio::test]
    async fn two_level_descent_collects_documents() {
        let mut pages = HashMap::new();
        pages.insert(
            FRONT.to_string(),
            r#"<body>
                 <a href="s1.html">1. Disposiciones generales</a>
                 <a href="s3.html">3. Otras disposiciones</a>
               </body>"#
                .to_string(),
        );
        pages.insert(
            "https://www.juntadeandalucia.es/boja/2025/45/s1.html".to_string(),
            r#"<body>
                 <a href="1.html">Decreto sobre ordenación del territorio andaluz</a>
               </body>"#
                .to_string(),
        );
        pages.insert(
            "https://www.juntadeandalucia.es/boja/2025/45/s3.html".to_string(),
            r#"<body>
                 <a href="7.html">Orden por la que se convocan ayudas a la vivienda</a>
                 <a href="7.html">Orden por la que se convocan ayudas a la vivienda</a>
               </body>"#
                .to_string(),
        );

        let walker = LinkGraphWalker::new(boja_rules(), Arc::new(MapFetcher { pages }), 2);
        let result = walker.expand(&issue(FRONT)).await;

        assert_eq!(result.fetch_failures, 0);
        assert_eq!(result.records.len(), 2);
        let labels: Vec<_> = result
            .records
            .iter()
            .map(|r| r.section_label.clone().unwrap())
            .collect();
        assert!(labels.contains(&"1. Disposiciones generales".to_string()));
        assert!(labels.contains(&"3. Otras disposiciones".to_string()));
    }

    #[tokio::test]
    async fn failed_section_is_skipped_not_fatal() {
        let mut pages = HashMap::new();
        pages.insert(
            FRONT.to_string(),
            r#"<body>
                 <a href="s1.html">1. Disposiciones generales</a>
                 <a href="s3.html">3. Otras disposiciones</a>
               </body>"#
                .to_string(),
        );
        // s1 missing entirely; s3 present.
        pages.insert(
            "https://www.juntadeandalucia.es/boja/2025/45/s3.html".to_string(),
            r#"<body><a href="7.html">Orden por la que se convocan ayudas a la vivienda</a></body>"#
                .to_string(),
        );

        let walker = LinkGraphWalker::new(boja_rules(), Arc::new(MapFetcher { pages }), 2);
        let result = walker.expand(&issue(FRONT)).await;

        assert_eq!(result.fetch_failures, 1);
        assert_eq!(result.records.len(), 1);
    }

    #[tokio::test]
    async fn front_without_sections_mines_structure() {
        let mut pages = HashMap::new();
        pages.insert(
            FRONT.to_string(),
            r#"<body>
                 <h2>Resolución de ayudas al alquiler de vivienda habitual</h2>
                 <li>Anuncio de licitación de obras en el litoral</li>
                 <li>corto</li>
               </body>"#
                .to_string(),
        );

        let walker = LinkGraphWalker::new(boja_rules(), Arc::new(MapFetcher { pages }), 2);
        let result = walker.expand(&issue(FRONT)).await;

        assert_eq!(result.records.len(), 2);
        assert!(result.records[0].url.starts_with(FRONT));
        assert!(result.records[0].url.contains("#item-"));
    }

    #[tokio::test]
    async fn empty_page_degrades_to_whole_page_record() {
        let mut pages = HashMap::new();
        pages.insert(
            FRONT.to_string(),
            "<html><head><title>BOJA 45</title></head><body><p>Texto breve del día.</p></body></html>"
                .to_string(),
        );

        let walker = LinkGraphWalker::new(boja_rules(), Arc::new(MapFetcher { pages }), 2);
        let result = walker.expand(&issue(FRONT)).await;

        assert_eq!(result.records.len(), 1);
        let rec = &result.records[0];
        assert_eq!(rec.url, FRONT);
        assert_eq!(rec.title, "BOJA 45");
        assert!(rec.body_text.as_deref().unwrap().contains("Texto breve"));
    }
}

//! # Boletín Finder CLI (`bof`)
//!
//! The `bof` binary is the query surface for the bulletin search pipeline.
//!
//! ## Usage
//!
//! ```bash
//! bof --config ./config/bof.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bof search` | Scan a date range for matching publications |
//! | `bof locate` | Resolve a single date to its issue front page |
//! | `bof sources` | List configured bulletin profiles |
//!
//! ## Examples
//!
//! ```bash
//! # Grants and subsidies mentioning housing, two weeks of BOJA
//! bof search --from 2025-03-03 --to 2025-03-16 --keyword vivienda
//!
//! # Any of several terms, whole words, validated against the PDF
//! bof search --from 2025-03-01 --to 2025-03-31 \
//!     --keyword vivienda --keyword alquiler --mode any --exact-word \
//!     --validate-pdf --csv resultados.csv
//!
//! # Everything published on one day (diagnostic pass-through)
//! bof search --from 2025-03-03 --to 2025-03-03 --no-domain-filter
//!
//! # Check the issue-number estimation against a known date
//! bof locate --bulletin boja --date 2025-03-03
//! ```

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use boletin_finder::config;
use boletin_finder::export;
use boletin_finder::fetch::HttpFetcher;
use boletin_finder::locator::{IssueLocator, LocateOutcome};
use boletin_finder::matcher::{MatchConfig, MatchMode, PdfPolicy};
use boletin_finder::models::{DocumentRecord, ScanReport};
use boletin_finder::progress::ProgressMode;
use boletin_finder::scan::{run_scan, ScanOptions};
use boletin_finder::sources;

/// Boletín Finder — monitor official gazette streams for grants,
/// subsidies, or arbitrary terms without browsing hundreds of pages.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; without one, the built-in BOJA and BOE profiles are used. See
/// `config/bof.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bof",
    about = "Search official gazette publications across a date range",
    version,
    long_about = "Boletín Finder resolves each date in a range to the gazette issue \
    published that day (live feed, day page, calendar scan, or issue-number estimation \
    with corrective probing), walks its section/document links, filters the text through \
    a keyword and relevance protocol — optionally cross-validated against the official \
    PDF — and prints one deduplicated, date-ordered result table."
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in profiles are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/bof.toml")]
    config: PathBuf,

    /// Progress reporting on stderr. Defaults to human lines when stderr
    /// is a terminal, off otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a date range for matching publications.
    ///
    /// Every date in the range is resolved and expanded independently;
    /// dates that fail to resolve are skipped and counted, never fatal.
    /// Raw candidate counts are reported next to matched counts so an
    /// empty result can be told apart from a source outage.
    Search {
        /// Start of the date range (YYYY-MM-DD).
        #[arg(long)]
        from: NaiveDate,

        /// End of the date range (YYYY-MM-DD), inclusive.
        #[arg(long)]
        to: NaiveDate,

        /// Keyword to search for; repeat for several. Empty means the
        /// baseline relevance filter alone decides.
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// Combine keywords with AND (`all`) or OR (`any`).
        #[arg(long, value_enum, default_value = "any")]
        mode: ModeArg,

        /// Match whole words only instead of substrings.
        #[arg(long)]
        exact_word: bool,

        /// Disable the baseline grants/subsidies relevance filter.
        #[arg(long)]
        no_domain_filter: bool,

        /// Fetch each candidate's full page and search its body text.
        /// One extra fetch per candidate — expect a slow scan.
        #[arg(long)]
        deep: bool,

        /// Also search the text of the official PDF rendition when a PDF
        /// link exists. Implies fetching the PDF.
        #[arg(long)]
        search_pdf: bool,

        /// Cross-validate HTML matches against the official PDF. A PDF
        /// that cannot be fetched or read never discards a match.
        #[arg(long)]
        validate_pdf: bool,

        /// With --validate-pdf: discard matches whose PDF was readable
        /// but did not match. Default keeps them.
        #[arg(long)]
        strict_pdf: bool,

        /// Maximum number of results (0 = unlimited). Defaults to the
        /// configured cap.
        #[arg(long)]
        cap: Option<usize>,

        /// Bulletin id to scan; repeat for several. Empty means all
        /// configured bulletins.
        #[arg(long = "bulletin")]
        bulletins: Vec<String>,

        /// Also write the result table as CSV to this path.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Also write records and counters as JSON to this path.
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Resolve a single date to its issue front page.
    ///
    /// Exposes the locator alone, which is the way to validate the
    /// issue-number estimation against known issue/date pairs before
    /// trusting a long historical scan.
    Locate {
        /// Bulletin id (see `bof sources`).
        #[arg(long)]
        bulletin: String,

        /// Date to resolve (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,
    },

    /// List configured bulletin profiles.
    Sources,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    All,
    Any,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "boletin_finder=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_builtin(&cli.config)?;
    let progress = cli
        .progress
        .map(ProgressArg::mode)
        .unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Search {
            from,
            to,
            keywords,
            mode,
            exact_word,
            no_domain_filter,
            deep,
            search_pdf,
            validate_pdf,
            strict_pdf,
            cap,
            bulletins,
            csv,
            json,
        } => {
            let match_config = MatchConfig {
                domain_filter: if no_domain_filter {
                    None
                } else {
                    Some(cfg.search.domain_regex()?)
                },
                keywords,
                mode: match mode {
                    ModeArg::All => MatchMode::All,
                    ModeArg::Any => MatchMode::Any,
                },
                exact_word,
                search_body: deep,
                search_pdf,
            };
            let options = ScanOptions {
                from,
                to,
                bulletins,
                deep,
                validate_pdf,
                pdf_policy: if strict_pdf {
                    PdfPolicy::Strict
                } else {
                    PdfPolicy::Permissive
                },
                cap: cap.unwrap_or(cfg.search.cap),
            };

            let fetcher = Arc::new(HttpFetcher::new(&cfg.http)?);
            let reporter = progress.reporter();
            let output = run_scan(&cfg, fetcher, &options, &match_config, reporter.as_ref()).await?;

            print_results(&output.records, &output.report);

            if let Some(path) = csv {
                export::write_csv(&output.records, Some(&path))?;
            }
            if let Some(path) = json {
                export::write_json(&output.records, &output.report, Some(&path))?;
            }
        }
        Commands::Locate { bulletin, date } => {
            let profile = cfg
                .bulletins
                .get(&bulletin)
                .ok_or_else(|| anyhow::anyhow!("unknown bulletin '{}'", bulletin))?
                .clone();
            let fetcher = Arc::new(HttpFetcher::new(&cfg.http)?);
            let locator = IssueLocator::new(&bulletin, profile, fetcher);
            match locator.locate(date).await {
                LocateOutcome::Found(issue) => {
                    println!("{} {} resolved", bulletin, date);
                    match issue.issue_number {
                        Some(n) => println!("    issue: {}/{}", issue.year, n),
                        None => println!("    issue: {}/?", issue.year),
                    }
                    println!("    url: {}", issue.front_page_url);
                    println!("    via: {}", issue.source_mode);
                    match issue.resolved_date {
                        Some(d) => println!("    date confirmed: {}", d),
                        None => println!("    date confirmed: no (accepted near estimate)"),
                    }
                }
                LocateOutcome::NotFound => {
                    println!("{} {} not found (all strategies exhausted)", bulletin, date);
                }
            }
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
    }

    Ok(())
}

fn print_results(records: &[DocumentRecord], report: &ScanReport) {
    for (i, record) in records.iter().enumerate() {
        println!("{}. {} / {}", i + 1, record.bulletin_id, record.title);
        match record.published_at {
            Some(d) => println!("    date: {}", d),
            None => println!("    date: (unknown)"),
        }
        if let Some(section) = &record.section_label {
            println!("    section: {}", section);
        }
        if let Some(location) = record.match_location {
            println!("    matched in: {}", location);
        }
        println!("    via: {}", record.source_mode);
        println!("    url: {}", record.url);
        if let Some(pdf) = &record.pdf_url {
            println!("    pdf: {}", pdf);
        }
        println!();
    }

    let candidates = report.total_candidates();
    let failures = report.total_fetch_failures();
    if records.is_empty() {
        if candidates == 0 && failures > 0 {
            println!(
                "No results: nothing could be fetched ({} failed fetches). Suspect a source outage.",
                failures
            );
        } else if candidates == 0 {
            println!("No results: no publications found for these dates.");
        } else {
            println!(
                "No results: {} candidate documents found, none matched the filters. \
                 Try --mode any, fewer keywords, or --no-domain-filter.",
                candidates
            );
        }
    } else {
        println!(
            "Matched {} of {} candidate documents.",
            report.total_matched(),
            candidates
        );
    }
    for (id, counts) in &report.per_bulletin {
        println!(
            "  {}: {} candidates, {} matched, {}/{} dates resolved, {} fetch failures",
            id,
            counts.candidates,
            counts.matched,
            counts.dates_resolved,
            counts.dates_scanned,
            counts.fetch_failures
        );
    }
}

//! # Boletín Finder
//!
//! Search official gazette publications for grants, subsidies, and
//! arbitrary terms across a date range, with provenance metadata.
//!
//! Government bulletins publish hundreds of pages per month behind
//! unstable indexes. This crate resolves each date in a range to the
//! periodical issue published that day (live feed, day page, calendar
//! scan, or issue-number estimation with corrective probing), walks the
//! issue's section/document link graph, normalizes the text, applies a
//! layered keyword/relevance filter — optionally cross-validated against
//! the official PDF rendition — and returns one deduplicated, date-ordered
//! result table.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ IssueLocator │──▶│ LinkGraph    │──▶│ MatchEngine │
//! │ feed/day/    │   │ Walker       │   │ normalize + │
//! │ estimate+    │   │ sections →   │   │ keywords +  │
//! │ probe        │   │ documents    │   │ PDF check   │
//! └──────────────┘   └──────────────┘   └──────┬──────┘
//!                                              │
//!                                       ┌──────▼──────┐
//!                                       │ Aggregator  │
//!                                       │ dedup/sort/ │
//!                                       │ cap         │
//!                                       └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bof search --from 2025-03-03 --to 2025-03-16 --keyword vivienda
//! bof search --from 2025-03-03 --to 2025-03-16 --keyword vivienda --validate-pdf --csv out.csv
//! bof locate --bulletin boja --date 2025-03-03
//! bof sources
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and bulletin profiles |
//! | [`models`] | Core data types |
//! | [`fetch`] | HTTP collaborator with retry/backoff |
//! | [`normalize`] | Accent-insensitive text normalization |
//! | [`locator`] | Date → issue resolution strategies |
//! | [`walker`] | Issue link-graph expansion |
//! | [`matcher`] | Keyword and relevance filtering |
//! | [`extract`] | PDF text extraction |
//! | [`aggregate`] | Dedup, ordering, cap |
//! | [`scan`] | Date-range orchestration |
//! | [`export`] | CSV and JSON output |

pub mod aggregate;
pub mod config;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod locator;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod scan;
pub mod sources;
pub mod walker;

//! Scan progress reporting.
//!
//! A date-range scan over a slow gazette site can run for minutes, so the
//! orchestrator reports which date is being resolved and how matching is
//! going. Progress is emitted on **stderr** so stdout (and CSV/JSON
//! output) remains parseable for scripts.

use chrono::NaiveDate;
use std::io::Write;

/// A single progress event during a scan.
#[derive(Clone, Debug)]
pub enum ScanEvent {
    /// The locator is resolving this date.
    Locating { bulletin: String, date: NaiveDate },
    /// An issue was resolved and its link graph is being expanded.
    Expanding { bulletin: String, date: NaiveDate },
    /// Candidates from one date were filtered: matched out of found.
    Filtered {
        bulletin: String,
        date: NaiveDate,
        matched: u64,
        candidates: u64,
    },
}

/// Reports scan progress. Implementations write to stderr (human or JSON).
pub trait ScanReporter: Send + Sync {
    fn report(&self, event: ScanEvent);
}

/// Human-friendly lines: `scan boja 2025-03-03  filtered 2 / 41`.
pub struct StderrReporter;

impl ScanReporter for StderrReporter {
    fn report(&self, event: ScanEvent) {
        let line = match &event {
            ScanEvent::Locating { bulletin, date } => {
                format!("scan {} {}  locating...\n", bulletin, date)
            }
            ScanEvent::Expanding { bulletin, date } => {
                format!("scan {} {}  expanding...\n", bulletin, date)
            }
            ScanEvent::Filtered {
                bulletin,
                date,
                matched,
                candidates,
            } => {
                format!(
                    "scan {} {}  filtered {} / {}\n",
                    bulletin, date, matched, candidates
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonReporter;

impl ScanReporter for JsonReporter {
    fn report(&self, event: ScanEvent) {
        let obj = match &event {
            ScanEvent::Locating { bulletin, date } => serde_json::json!({
                "event": "progress",
                "bulletin": bulletin,
                "date": date.to_string(),
                "phase": "locating"
            }),
            ScanEvent::Expanding { bulletin, date } => serde_json::json!({
                "event": "progress",
                "bulletin": bulletin,
                "date": date.to_string(),
                "phase": "expanding"
            }),
            ScanEvent::Filtered {
                bulletin,
                date,
                matched,
                candidates,
            } => serde_json::json!({
                "event": "progress",
                "bulletin": bulletin,
                "date": date.to_string(),
                "phase": "filtered",
                "matched": matched,
                "candidates": candidates
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoReporter;

impl ScanReporter for NoReporter {
    fn report(&self, _event: ScanEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ScanReporter> {
        match self {
            ProgressMode::Off => Box::new(NoReporter),
            ProgressMode::Human => Box::new(StderrReporter),
            ProgressMode::Json => Box::new(JsonReporter),
        }
    }
}

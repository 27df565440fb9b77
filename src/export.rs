//! Export the result table for spreadsheets and scripts.
//!
//! CSV carries the visible fields only; JSON carries full records plus the
//! per-source counters so scripted callers can apply the same outage
//! heuristics the terminal output shows. Both write to a file when a path
//! is given, otherwise to stdout for piping.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::models::{DocumentRecord, ScanReport};

const CSV_HEADER: &str = "bulletin_id,title,published_at,url,pdf_url,section_label,match_location";

/// Write records as CSV.
pub fn write_csv(records: &[DocumentRecord], output: Option<&Path>) -> Result<()> {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');
    for record in records {
        let fields = [
            record.bulletin_id.clone(),
            record.title.clone(),
            record
                .published_at
                .map(|d| d.to_string())
                .unwrap_or_default(),
            record.url.clone(),
            record.pdf_url.clone().unwrap_or_default(),
            record.section_label.clone().unwrap_or_default(),
            record
                .match_location
                .map(|l| l.to_string())
                .unwrap_or_default(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    write_out(&out, output, records.len(), "records")
}

#[derive(Serialize)]
struct JsonExport<'a> {
    records: &'a [DocumentRecord],
    report: &'a ScanReport,
}

/// Write records and the scan report as pretty JSON.
pub fn write_json(
    records: &[DocumentRecord],
    report: &ScanReport,
    output: Option<&Path>,
) -> Result<()> {
    let data = JsonExport { records, report };
    let json = serde_json::to_string_pretty(&data)?;
    write_out(&json, output, records.len(), "records")
}

fn write_out(content: &str, output: Option<&Path>, count: usize, what: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, content)?;
            eprintln!("Exported {} {} to {}", count, what, path.display());
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

/// RFC 4180 quoting: fields with commas, quotes, or newlines get wrapped,
/// embedded quotes doubled.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

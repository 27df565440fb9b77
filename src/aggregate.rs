//! Result aggregation: dedup, deterministic ordering, cap.
//!
//! A pure function of its input so it can be tested in isolation. This is
//! the only place in the pipeline where ordering is imposed; upstream
//! stages are free to complete fetches in any order.

use std::collections::HashSet;

use crate::models::DocumentRecord;

/// Merge records from all sources and strategies:
///
/// - deduplicate by canonical URL, first occurrence wins;
/// - sort by publication date descending; records without a date sort
///   after all dated records, keeping their original relative order
///   (they are never dropped — absence of date is not absence of
///   validity);
/// - truncate to `cap` when `cap > 0` (`0` means unlimited).
pub fn aggregate(records: Vec<DocumentRecord>, cap: usize) -> Vec<DocumentRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<DocumentRecord> = Vec::with_capacity(records.len());
    for record in records {
        if seen.insert(record.url.clone()) {
            out.push(record);
        }
    }

    // Stable sort keeps input order among equal keys, which is what gives
    // dateless records their original relative order.
    out.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(da), Some(db)) => db.cmp(&da),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    if cap > 0 {
        out.truncate(cap);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMode;
    use chrono::NaiveDate;

    fn record(url: &str, date: Option<(i32, u32, u32)>) -> DocumentRecord {
        DocumentRecord {
            bulletin_id: "boja".to_string(),
            source_mode: SourceMode::HistoricalIndex,
            title: format!("título de {}", url),
            summary: None,
            body_text: None,
            url: url.to_string(),
            pdf_url: None,
            published_at: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            section_label: None,
            match_location: None,
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let records = vec![
            record("u1", Some((2025, 1, 2))),
            record("u2", Some((2025, 1, 3))),
            record("u1", Some((2025, 1, 4))),
        ];
        let out = aggregate(records, 0);
        assert_eq!(out.len(), 2);
        let u1 = out.iter().find(|r| r.url == "u1").unwrap();
        assert_eq!(u1.published_at, NaiveDate::from_ymd_opt(2025, 1, 2));
    }

    #[test]
    fn dateless_records_kept_and_sorted_last() {
        let records = vec![
            record("n1", None),
            record("d1", Some((2025, 1, 1))),
            record("n2", None),
            record("d2", Some((2025, 1, 5))),
        ];
        let out = aggregate(records, 0);
        let urls: Vec<_> = out.iter().map(|r| r.url.as_str()).collect();
        // Dated first (descending), then dateless in original order.
        assert_eq!(urls, vec!["d2", "d1", "n1", "n2"]);
    }

    #[test]
    fn cap_keeps_most_recent() {
        let records: Vec<_> = (1..=5)
            .map(|d| record(&format!("u{}", d), Some((2025, 1, d as u32))))
            .collect();
        let out = aggregate(records, 3);
        let urls: Vec<_> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["u5", "u4", "u3"]);
    }

    #[test]
    fn zero_cap_means_unlimited() {
        let records: Vec<_> = (1..=5)
            .map(|d| record(&format!("u{}", d), Some((2025, 1, d as u32))))
            .collect();
        assert_eq!(aggregate(records, 0).len(), 5);
    }

    #[test]
    fn same_date_preserves_input_order() {
        let records = vec![
            record("a", Some((2025, 1, 1))),
            record("b", Some((2025, 1, 1))),
            record("c", Some((2025, 1, 1))),
        ];
        let urls: Vec<_> = aggregate(records, 0)
            .iter()
            .map(|r| r.url.clone())
            .collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
    }
}

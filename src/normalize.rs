//! Text normalization for accent-insensitive matching.
//!
//! All matching in this crate happens over normalized text: NFD
//! decomposition with combining marks removed (so "subvención" and
//! "subvencion" compare equal), lowercased, whitespace collapsed. The same
//! function is applied to page text and to user keywords so comparisons
//! stay consistent.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref SEL_BODY: Selector = Selector::parse("body").expect("valid selector");
}

/// Normalize text: decompose accents and drop combining marks, lowercase,
/// collapse whitespace runs to single spaces, trim.
///
/// Idempotent, and never fails on empty input.
pub fn normalize(raw: &str) -> String {
    let stripped: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut out = String::with_capacity(stripped.len());
    let mut in_space = true; // leading whitespace is dropped
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Strip markup down to plain text.
///
/// Takes the text content of `<body>` when present, otherwise of the whole
/// document, with element boundaries joined by spaces. The result is raw
/// (not normalized); pass it through [`normalize`] before matching.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let text: String = match doc.select(&SEL_BODY).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => doc.root_element().text().collect::<Vec<_>>().join(" "),
    };
    text.trim().to_string()
}

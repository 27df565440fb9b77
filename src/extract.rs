//! Text extraction from official PDF renditions.
//!
//! Extraction failures are expected in the wild (scanned images, damaged
//! files, encrypted annexes). Callers must treat a failure or an empty
//! result as "extraction unavailable", never as "the document has no text"
//! and never as a reason to discard an existing HTML-level match.

/// Extraction error. No panic: the pipeline logs it and carries on.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract plain text from PDF bytes.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

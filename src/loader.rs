//! Document loading: file path → ordered pages of text.
//!
//! PDF text comes from `pdf-extract`; the extractor emits a form feed
//! between pages, which is where page boundaries are recovered. Plain
//! text and Markdown files load as a single page.

use std::path::Path;

use crate::error::{Error, Result};
use crate::models::DocumentPage;

/// File extensions the loader accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "md"];

/// Whether `filename` has a supported extension (case-insensitive).
pub fn is_supported(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Load a document into an ordered page sequence.
///
/// Page numbers are 1-based. Pages that extract to pure whitespace are
/// dropped but keep their original numbering, so citations still point
/// at the right physical page.
pub fn load_pages(path: &Path) -> Result<Vec<DocumentPage>> {
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => load_pdf(path),
        "txt" | "md" => load_plain(path),
        other => Err(Error::InvalidArgument(format!(
            "Unsupported file type: '{}'. Supported: pdf, txt, md.",
            other
        ))),
    }
}

fn load_pdf(path: &Path) -> Result<Vec<DocumentPage>> {
    let bytes = std::fs::read(path).map_err(|e| Error::InvalidArgument(e.to_string()))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| Error::InvalidArgument(format!("PDF extraction failed: {}", e)))?;

    let pages: Vec<DocumentPage> = text
        .split('\u{c}')
        .enumerate()
        .filter(|(_, page_text)| !page_text.trim().is_empty())
        .map(|(i, page_text)| DocumentPage {
            text: page_text.trim().to_string(),
            page_number: i + 1,
        })
        .collect();

    Ok(pages)
}

fn load_plain(path: &Path) -> Result<Vec<DocumentPage>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::InvalidArgument(e.to_string()))?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![DocumentPage {
        text,
        page_number: 1,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported("paper.pdf"));
        assert!(is_supported("NOTES.TXT"));
        assert!(is_supported("readme.md"));
        assert!(!is_supported("archive.zip"));
        assert!(!is_supported("no_extension"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_pages(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_plain_text_single_page() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "Some document content.\n\nA second paragraph.").unwrap();

        let pages = load_pages(file.path()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
        assert!(pages[0].text.contains("second paragraph"));
    }

    #[test]
    fn test_empty_file_yields_no_pages() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let pages = load_pages(file.path()).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        let err = load_pages(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}

//! Text-extraction boundary: page text in, one document string out.
//!
//! PDF byte extraction is done by an external tool. The library reads its
//! output: a UTF-8 text file with pages separated by form feeds (`\f`), as
//! written by `pdftotext`.

use crate::error::TranslateError;
use std::path::{Path, PathBuf};
use tracing::debug;

const PAGE_BREAK: char = '\u{0C}';

/// Read a page-text file into its pages.
pub async fn load_pages(path: impl AsRef<Path>) -> Result<Vec<String>, TranslateError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TranslateError::SourceNotFound {
            path: PathBuf::from(path),
        },
        _ => TranslateError::SourceReadFailed {
            path: PathBuf::from(path),
            source: e,
        },
    })?;
    let pages = split_pages(&text);
    debug!("Loaded {} pages from {}", pages.len(), path.display());
    Ok(pages)
}

/// Split extracted text on form feeds. The empty page `pdftotext` leaves
/// after the final form feed is dropped.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Concatenate pages into one document, with a line break between pages
/// so the last line of a page never merges with the first of the next.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(page);
    }
    text
}

/// The first `limit` pages, or all of them.
pub fn limit_pages<S>(pages: &[S], limit: Option<usize>) -> &[S] {
    match limit {
        Some(n) => &pages[..n.min(pages.len())],
        None => pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_form_feed() {
        assert_eq!(split_pages("one\n\u{0C}two\n\u{0C}"), vec!["one\n", "two\n"]);
        assert_eq!(split_pages("single"), vec!["single"]);
        assert_eq!(split_pages(""), vec![""]);
    }

    #[test]
    fn join_inserts_line_breaks() {
        assert_eq!(join_pages(&["a", "b\n", "c"]), "a\nb\nc");
        assert_eq!(join_pages::<&str>(&[]), "");
    }

    #[test]
    fn limit_is_clamped() {
        let pages = ["a", "b", "c"];
        assert_eq!(limit_pages(&pages, Some(2)), &["a", "b"]);
        assert_eq!(limit_pages(&pages, Some(10)).len(), 3);
        assert_eq!(limit_pages(&pages, None).len(), 3);
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = load_pages("/definitely/not/here.txt").await.unwrap_err();
        assert!(matches!(err, TranslateError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn load_reads_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        std::fs::write(&path, "Title\nIntro\u{0C}Method\u{0C}").unwrap();
        let pages = load_pages(&path).await.unwrap();
        assert_eq!(pages, vec!["Title\nIntro", "Method"]);
    }
}

//! Persistence boundary: where the translated fragments go.
//!
//! The core never decides where a document ends up. A [`FragmentSink`]
//! receives the finished [`TranslationOutput`]; [`MarkdownFileSink`] is the
//! one shipped with the library.

use crate::error::TranslateError;
use crate::output::TranslationOutput;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receiver of a finished translation.
pub trait FragmentSink: Send + Sync {
    fn accept<'a>(
        &'a self,
        output: &'a TranslationOutput,
    ) -> BoxFuture<'a, Result<(), TranslateError>>;
}

/// Writes the assembled document to one Markdown file.
#[derive(Debug, Clone)]
pub struct MarkdownFileSink {
    path: PathBuf,
}

impl MarkdownFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FragmentSink for MarkdownFileSink {
    fn accept<'a>(
        &'a self,
        output: &'a TranslationOutput,
    ) -> BoxFuture<'a, Result<(), TranslateError>> {
        Box::pin(async move {
            write_atomic(&self.path, &output.markdown).await?;
            info!("Wrote {} bytes to {}", output.markdown.len(), self.path.display());
            Ok(())
        })
    }
}

/// Write `contents` to `path` through a temporary file and a rename, so a
/// crash never leaves a half-written document.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), TranslateError> {
    let write_err = |e| TranslateError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

static RE_VERSION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[\d.]+\]").unwrap());
static RE_INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|*?\x00-\x1F]"#).unwrap());

/// File name (with `.md`) derived from a document title.
///
/// Bracketed version markers such as `[2.1]` and characters invalid in
/// file names are removed. An empty result falls back to `paper.md`.
pub fn suggested_filename(title: &str) -> String {
    let stem = RE_VERSION_MARKER.replace_all(title, "");
    let stem = RE_INVALID_CHARS.replace_all(&stem, "");
    let stem = stem.trim().trim_start_matches('#').trim();
    if stem.is_empty() {
        "paper.md".to_string()
    } else {
        format!("{stem}.md")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TranslationStats;

    #[test]
    fn filename_drops_markers_and_invalid_chars() {
        assert_eq!(
            suggested_filename("[2.1] Attention: Is All/You Need?"),
            "Attention Is AllYou Need.md"
        );
        assert_eq!(suggested_filename("# Title"), "Title.md");
        assert_eq!(suggested_filename("  <>  "), "paper.md");
    }

    #[tokio::test]
    async fn file_sink_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.md");
        let output = TranslationOutput {
            title: "T".into(),
            keywords: vec![],
            fragments: vec![],
            markdown: "# T\n\n本文".into(),
            stats: TranslationStats::default(),
        };

        MarkdownFileSink::new(&path).accept(&output).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# T\n\n本文");
        assert!(!path.with_extension("md.tmp").exists());
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.md");
        std::fs::write(&path, "old").unwrap();

        tokio_test::block_on(write_atomic(&path, "new")).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}

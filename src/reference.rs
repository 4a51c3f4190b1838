//! Citation records and their canonical Markdown rendering.
//!
//! Every entry renders as a list item with a literal `1.` marker (Markdown
//! renumbers ordered lists) followed by a block anchor `^ref<anchor>`, which
//! is what inline citations rewritten to `[[#^ref<anchor>]]` link to.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Reference identifier as printed in the paper: `12` or `Smith2020`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Anchor {
    Number(u64),
    Text(String),
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Number(n) => write!(f, "{n}"),
            Anchor::Text(s) => f.write_str(s.trim()),
        }
    }
}

impl From<&str> for Anchor {
    fn from(s: &str) -> Self {
        Anchor::Text(s.to_string())
    }
}

impl From<u64> for Anchor {
    fn from(n: u64) -> Self {
        Anchor::Number(n)
    }
}

/// One structured citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub anchor: Anchor,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    /// Journal, conference or publisher.
    #[serde(default, alias = "magazine")]
    pub venue: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl Reference {
    /// Render as `1. [<title>](<link>) (<year>) ^ref<anchor>`.
    ///
    /// Without a link the title is plain text; without a year the
    /// parenthesised year is omitted.
    pub fn to_markdown(&self) -> String {
        let title = match self.link.as_deref().map(str::trim) {
            Some(link) if !link.is_empty() => format!("[{}]({})", self.title.trim(), link),
            _ => self.title.trim().to_string(),
        };
        match self.year {
            Some(year) => format!("1. {title} ({year}) ^ref{}", self.anchor),
            None => format!("1. {title} ^ref{}", self.anchor),
        }
    }
}

/// Render a list of references, one entry per line.
pub fn render_references(refs: &[Reference]) -> String {
    refs.iter()
        .map(Reference::to_markdown)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Return the first anchor that appears more than once, if any.
pub fn duplicate_anchor(refs: &[Reference]) -> Option<String> {
    let mut seen = HashSet::new();
    refs.iter()
        .map(|r| r.anchor.to_string())
        .find(|a| !seen.insert(a.clone()))
}

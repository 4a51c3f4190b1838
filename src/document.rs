//! Document model: the section outline and the line spans derived from it.
//!
//! The model answers with a recursive JSON tree ([`OutlineNode`]). Internally
//! the tree is flattened into an arena ([`Outline`]) of [`Section`] records
//! that point at their parent and children by index, so the line-range
//! invariant can be computed and checked with plain slices.
//!
//! Only top-level sections are translated; children are kept as structural
//! metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Index of a section inside its [`Outline`].
pub type SectionId = usize;

/// Wire shape of one outline node as emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub title: String,
    /// Zero-based line where the section starts.
    pub line: usize,
    #[serde(default)]
    pub is_references: bool,
    #[serde(default)]
    pub sections: Vec<OutlineNode>,
}

/// One section record in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub start_line: usize,
    pub is_references: bool,
    pub parent: Option<SectionId>,
    pub children: Vec<SectionId>,
    /// 0 for top-level sections.
    pub depth: usize,
}

/// Flat arena of sections in document (pre-)order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outline {
    sections: Vec<Section>,
    roots: Vec<SectionId>,
}

impl Outline {
    /// Flatten a recursive node tree into the arena.
    pub fn from_nodes(nodes: &[OutlineNode]) -> Self {
        let mut outline = Outline::default();
        // (node, parent, depth) in reverse so pops come out in document order
        let mut stack: Vec<(&OutlineNode, Option<SectionId>, usize)> =
            nodes.iter().rev().map(|n| (n, None, 0)).collect();

        while let Some((node, parent, depth)) = stack.pop() {
            let id = outline.sections.len();
            outline.sections.push(Section {
                title: node.title.clone(),
                start_line: node.line,
                is_references: node.is_references,
                parent,
                children: Vec::new(),
                depth,
            });
            match parent {
                Some(p) => outline.sections[p].children.push(id),
                None => outline.roots.push(id),
            }
            stack.extend(node.sections.iter().rev().map(|c| (c, Some(id), depth + 1)));
        }
        outline
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id)
    }

    /// Top-level sections in document order.
    pub fn roots(&self) -> impl Iterator<Item = (SectionId, &Section)> {
        self.roots.iter().map(move |&id| (id, &self.sections[id]))
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Direct children of a section in document order.
    pub fn children(&self, id: SectionId) -> impl Iterator<Item = &Section> {
        self.sections
            .get(id)
            .map(|s| s.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&c| &self.sections[c])
    }

    /// Compute the line span of every top-level section.
    ///
    /// Spans are contiguous and non-overlapping and cover
    /// `[0, total_lines)`: the first span starts at line 0, each span ends
    /// where the next begins, and the last ends at `total_lines`. Offsets
    /// beyond the document are clamped; a section whose offset goes
    /// backwards gets an empty span instead of overlapping its predecessor.
    pub fn top_level_spans(&self, total_lines: usize) -> Vec<SectionSpan> {
        let mut starts = Vec::with_capacity(self.roots.len());
        let mut floor = 0usize;
        for (i, (_, section)) in self.roots().enumerate() {
            let requested = section.start_line.min(total_lines);
            if requested < floor {
                warn!(
                    "Section '{}' starts at line {} before its predecessor (line {})",
                    section.title, section.start_line, floor
                );
            }
            let start = if i == 0 { 0 } else { requested.max(floor) };
            starts.push(start);
            floor = start;
        }

        self.roots
            .iter()
            .enumerate()
            .map(|(i, &id)| SectionSpan {
                id,
                start_line: starts[i],
                end_line: starts.get(i + 1).copied().unwrap_or(total_lines),
            })
            .collect()
    }

    /// True when at least one top-level section starts inside the document.
    pub fn is_usable(&self, total_lines: usize) -> bool {
        self.roots().any(|(_, s)| s.start_line < total_lines)
    }
}

/// Half-open line range `[start_line, end_line)` of a top-level section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    pub id: SectionId,
    pub start_line: usize,
    pub end_line: usize,
}

impl SectionSpan {
    /// Slice this span out of the document's lines.
    pub fn text(&self, lines: &[&str]) -> String {
        let end = self.end_line.min(lines.len());
        let start = self.start_line.min(end);
        lines[start..end].join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.end_line <= self.start_line
    }
}

/// The outline of a paper.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredDocument {
    pub title: String,
    pub keywords: BTreeSet<String>,
    pub outline: Outline,
}

impl StructuredDocument {
    pub fn new(title: impl Into<String>, keywords: &[String], nodes: &[OutlineNode]) -> Self {
        Self {
            title: title.into(),
            keywords: keywords.iter().cloned().collect(),
            outline: Outline::from_nodes(nodes),
        }
    }
}

/// Prefix every line with its zero-based number, `"{n}: {line}"`.
///
/// The outline model reads this form so it can answer with exact offsets.
pub fn number_lines(text: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| format!("{i}: {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Heading marker for a section at `depth` (the paper title owns `#`).
pub fn heading_marker(depth: usize) -> String {
    "#".repeat(depth + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(title: &str, line: usize, children: Vec<OutlineNode>) -> OutlineNode {
        OutlineNode {
            title: title.into(),
            line,
            is_references: false,
            sections: children,
        }
    }

    #[test]
    fn flattens_tree_in_document_order() {
        let nodes = vec![
            node("Intro", 0, vec![node("Motivation", 3, vec![]), node("Scope", 6, vec![])]),
            node("Method", 10, vec![node("Data", 12, vec![node("Cleaning", 14, vec![])])]),
        ];
        let outline = Outline::from_nodes(&nodes);

        assert_eq!(outline.len(), 6);
        let titles: Vec<_> = outline.roots().map(|(_, s)| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Intro", "Method"]);

        let (method_id, method) = outline.roots().nth(1).unwrap();
        assert_eq!(method.depth, 0);
        let data: Vec<_> = outline.children(method_id).collect();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].title, "Data");
        assert_eq!(data[0].depth, 1);
        assert_eq!(data[0].parent, Some(method_id));
        let cleaning = outline.get(data[0].children[0]).unwrap();
        assert_eq!(cleaning.title, "Cleaning");
        assert_eq!(cleaning.depth, 2);
    }

    #[test]
    fn spans_are_contiguous_and_cover_document() {
        let nodes = vec![node("A", 0, vec![]), node("B", 10, vec![]), node("C", 20, vec![])];
        let outline = Outline::from_nodes(&nodes);
        let spans = outline.top_level_spans(30);

        assert_eq!(spans.len(), 3);
        assert_eq!((spans[0].start_line, spans[0].end_line), (0, 10));
        assert_eq!((spans[1].start_line, spans[1].end_line), (10, 20));
        assert_eq!((spans[2].start_line, spans[2].end_line), (20, 30));
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end_line, pair[1].start_line);
        }
    }

    #[test]
    fn first_span_starts_at_zero() {
        let nodes = vec![node("Intro", 4, vec![]), node("End", 8, vec![])];
        let spans = Outline::from_nodes(&nodes).top_level_spans(12);
        assert_eq!(spans[0].start_line, 0);
        assert_eq!(spans[1].end_line, 12);
    }

    #[test]
    fn out_of_order_offsets_never_overlap() {
        let nodes = vec![
            node("A", 0, vec![]),
            node("B", 15, vec![]),
            node("C", 5, vec![]),
            node("D", 50, vec![]),
        ];
        let spans = Outline::from_nodes(&nodes).top_level_spans(30);

        assert_eq!(spans[0].start_line, 0);
        assert_eq!(spans.last().unwrap().end_line, 30);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end_line, pair[1].start_line);
            assert!(pair[0].start_line <= pair[0].end_line);
        }
        // C went backwards: empty span instead of overlap
        assert!(spans[2].is_empty());
        // D is beyond the end: clamped, empty
        assert!(spans[3].is_empty());
    }

    #[test]
    fn span_text_slices_lines() {
        let lines = vec!["l0", "l1", "l2", "l3"];
        let span = SectionSpan {
            id: 0,
            start_line: 1,
            end_line: 3,
        };
        assert_eq!(span.text(&lines), "l1\nl2");
        let past_end = SectionSpan {
            id: 0,
            start_line: 3,
            end_line: 9,
        };
        assert_eq!(past_end.text(&lines), "l3");
    }

    #[test]
    fn number_lines_prefixes_offsets() {
        assert_eq!(number_lines("a\nb\n"), "0: a\n1: b\n2: ");
    }

    #[test]
    fn usable_requires_a_section_inside_document() {
        let outline = Outline::from_nodes(&[node("Late", 40, vec![])]);
        assert!(!outline.is_usable(10));
        assert!(outline.is_usable(41));
        assert!(!Outline::default().is_usable(10));
    }

    #[test]
    fn heading_marker_depth() {
        assert_eq!(heading_marker(0), "##");
        assert_eq!(heading_marker(1), "###");
    }
}

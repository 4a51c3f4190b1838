//! Model tasks: one capability record per kind of model call.
//!
//! A [`Task`] names everything the [`crate::pipeline::llm::ModelCaller`]
//! needs to run a call: identity (cache namespace and log label), model
//! tier, prompt templates, retry bound and the expected output shape. The
//! output shape is carried by the associated [`ModelOutput`] type: free text,
//! or a JSON document with a declared schema that the answer is validated
//! against.

use crate::config::ModelTier;
use crate::document::OutlineNode;
use crate::pipeline::postprocess::{clean_json, clean_markdown};
use crate::prompts;
use crate::reference::{duplicate_anchor, Reference};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Expected shape of a model answer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape {
    /// Free text; no validation.
    Text,
    /// JSON conforming to the given schema.
    Json(Value),
}

impl OutputShape {
    pub fn is_structured(&self) -> bool {
        matches!(self, OutputShape::Json(_))
    }
}

/// A value a model call can produce.
pub trait ModelOutput: Serialize + DeserializeOwned + Send + Sized {
    fn shape() -> OutputShape;

    /// Parse and validate a raw answer. The error text is sent back to the
    /// model verbatim by the repair loop.
    fn parse(raw: &str) -> Result<Self, String>;
}

impl ModelOutput for String {
    fn shape() -> OutputShape {
        OutputShape::Text
    }

    fn parse(raw: &str) -> Result<Self, String> {
        Ok(clean_markdown(raw))
    }
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_str(&clean_json(raw)).map_err(|e| e.to_string())
}

/// Capability of one kind of model call.
pub trait Task {
    type Output: ModelOutput;

    /// Stable identity; namespaces cache entries.
    const NAME: &'static str;
    const TIER: ModelTier = ModelTier::Standard;
    const SYSTEM_TEMPLATE: &'static str;
    const MESSAGE_TEMPLATE: &'static str = prompts::TEXT_MESSAGE;
    /// Overrides the configured repair bound when set.
    const MAX_RETRIES: Option<u32> = None;
}

// ── Outline ──────────────────────────────────────────────────────────────

/// Answer of [`ExtractOutline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineResponse {
    pub paper: PaperOutline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperOutline {
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub sections: Vec<OutlineNode>,
}

impl ModelOutput for OutlineResponse {
    fn shape() -> OutputShape {
        OutputShape::Json(json!({
            "type": "object",
            "required": ["paper"],
            "properties": {
                "paper": {
                    "type": "object",
                    "required": ["title", "sections"],
                    "properties": {
                        "title": { "type": "string" },
                        "keywords": { "type": "array", "items": { "type": "string" } },
                        "sections": { "type": "array", "items": { "$ref": "#/$defs/section" } }
                    }
                }
            },
            "$defs": {
                "section": {
                    "type": "object",
                    "required": ["title", "line"],
                    "properties": {
                        "title": { "type": "string" },
                        "line": { "type": "integer", "minimum": 0 },
                        "is_references": { "type": "boolean", "default": false },
                        "sections": { "type": "array", "items": { "$ref": "#/$defs/section" } }
                    }
                }
            }
        }))
    }

    fn parse(raw: &str) -> Result<Self, String> {
        parse_json(raw)
    }
}

/// Section tree with line offsets from line-numbered paper text.
pub struct ExtractOutline;

impl Task for ExtractOutline {
    type Output = OutlineResponse;
    const NAME: &'static str = "extract_outline";
    const TIER: ModelTier = ModelTier::Outline;
    const SYSTEM_TEMPLATE: &'static str = prompts::OUTLINE_SYSTEM;
}

// ── Section translation ──────────────────────────────────────────────────

/// Translate one section span.
pub struct TranslateSection;

impl Task for TranslateSection {
    type Output = String;
    const NAME: &'static str = "translate_section";
    const SYSTEM_TEMPLATE: &'static str = prompts::TRANSLATE_SECTION_SYSTEM;
}

/// Rewrite remaining formulas into TeX math delimiters.
pub struct NormalizeEquations;

impl Task for NormalizeEquations {
    type Output = String;
    const NAME: &'static str = "normalize_equations";
    const SYSTEM_TEMPLATE: &'static str = prompts::NORMALIZE_EQUATIONS_SYSTEM;
}

// ── References ───────────────────────────────────────────────────────────

/// Answer of [`ConvertReferences`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceList {
    pub references: Vec<Reference>,
}

impl ModelOutput for ReferenceList {
    fn shape() -> OutputShape {
        OutputShape::Json(json!({
            "type": "object",
            "required": ["references"],
            "properties": {
                "references": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["anchor", "title"],
                        "properties": {
                            "anchor": { "type": ["string", "integer"] },
                            "title": { "type": "string" },
                            "link": { "type": ["string", "null"] },
                            "venue": { "type": ["string", "null"] },
                            "year": { "type": ["integer", "null"] }
                        }
                    }
                }
            }
        }))
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let list: ReferenceList = parse_json(raw)?;
        if let Some(anchor) = duplicate_anchor(&list.references) {
            return Err(format!("anchor '{anchor}' is used by more than one reference"));
        }
        Ok(list)
    }
}

/// References section to ordered citation records.
pub struct ConvertReferences;

impl Task for ConvertReferences {
    type Output = ReferenceList;
    const NAME: &'static str = "convert_references";
    const SYSTEM_TEMPLATE: &'static str = prompts::REFERENCES_SYSTEM;
}

// ── Chunked translator ───────────────────────────────────────────────────

/// Answer of [`ClassifyChunk`].
///
/// Missing flags default to "body, no references", the safe reading of a
/// mid-paper page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkKinds {
    #[serde(default = "default_true")]
    pub contains_body: bool,
    #[serde(default)]
    pub contains_references: bool,
}

fn default_true() -> bool {
    true
}

impl ModelOutput for ChunkKinds {
    fn shape() -> OutputShape {
        OutputShape::Json(json!({
            "type": "object",
            "required": ["contains_body", "contains_references"],
            "properties": {
                "contains_body": { "type": "boolean" },
                "contains_references": { "type": "boolean" }
            }
        }))
    }

    fn parse(raw: &str) -> Result<Self, String> {
        parse_json(raw)
    }
}

/// Does a chunk hold body prose, a reference list, or both.
pub struct ClassifyChunk;

impl Task for ClassifyChunk {
    type Output = ChunkKinds;
    const NAME: &'static str = "classify_chunk";
    const SYSTEM_TEMPLATE: &'static str = prompts::CLASSIFY_CHUNK_SYSTEM;
    const MESSAGE_TEMPLATE: &'static str = "<paper>\n${full_text}\n</paper>";
}

/// Translate a chunk; answer carries `<outline>` and `<translate>` tags.
pub struct TranslateChunk;

impl Task for TranslateChunk {
    type Output = String;
    const NAME: &'static str = "translate_chunk";
    const SYSTEM_TEMPLATE: &'static str = prompts::TRANSLATE_CHUNK_SYSTEM;
    const MESSAGE_TEMPLATE: &'static str = prompts::CHUNK_MESSAGE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_parses_fenced_json() {
        let raw = r#"```json
{"paper": {"title": "T", "keywords": ["k"], "sections": [
  {"title": "Intro", "line": 0, "sections": []},
  {"title": "References", "line": 20, "is_references": true}
]}}
```"#;
        let parsed = OutlineResponse::parse(raw).unwrap();
        assert_eq!(parsed.paper.title, "T");
        assert_eq!(parsed.paper.sections.len(), 2);
        assert!(parsed.paper.sections[1].is_references);
        assert!(!parsed.paper.sections[0].is_references);
    }

    #[test]
    fn outline_rejects_missing_line() {
        let err = OutlineResponse::parse(
            r#"{"paper": {"title": "T", "sections": [{"title": "Intro"}]}}"#,
        )
        .unwrap_err();
        assert!(err.contains("line"), "got: {err}");
    }

    #[test]
    fn references_reject_duplicate_anchors() {
        let err = ReferenceList::parse(
            r#"{"references": [{"anchor": 1, "title": "A"}, {"anchor": "1", "title": "B"}]}"#,
        )
        .unwrap_err();
        assert!(err.contains("anchor '1'"), "got: {err}");
    }

    #[test]
    fn chunk_kinds_default_to_body_only() {
        let k = ChunkKinds::parse("{}").unwrap();
        assert!(k.contains_body);
        assert!(!k.contains_references);
    }

    #[test]
    fn text_output_is_cleaned() {
        assert_eq!(String::parse("```markdown\nhi\n```").unwrap(), "hi");
        assert!(!String::shape().is_structured());
        assert!(ReferenceList::shape().is_structured());
    }

    #[test]
    fn task_identities_are_distinct() {
        let names = [
            ExtractOutline::NAME,
            TranslateSection::NAME,
            NormalizeEquations::NAME,
            ConvertReferences::NAME,
            ClassifyChunk::NAME,
            TranslateChunk::NAME,
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(ExtractOutline::TIER, ModelTier::Outline);
        assert_eq!(TranslateSection::TIER, ModelTier::Standard);
    }
}

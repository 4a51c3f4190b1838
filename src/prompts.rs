//! Prompt templates for every model task.
//!
//! Centralising every prompt here keeps the wording in one place and lets
//! unit tests inspect prompts without a live model. Templates use `${name}`
//! placeholders filled by [`fill_template`]; schema-typed tasks receive
//! their JSON Schema as `${json_schema}`.

use crate::error::TranslateError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Named placeholder values. Ordered so the map serialises deterministically
/// into cache keys.
pub type PromptInputs = BTreeMap<String, String>;

/// Default user message: the text span itself.
pub const TEXT_MESSAGE: &str = "${full_text}";

/// Outline extraction over line-numbered paper text.
pub const OUTLINE_SYSTEM: &str = r#"You are given the full text of a scientific paper. Every line is prefixed with its zero-based line number ("12: text").

Structure the paper into its sections:
- Report the paper title and its keywords.
- List the top-level sections in reading order; nest subsections under their parent.
- For every section give the line number where its heading starts.
- Mark the bibliography / references section with "is_references": true.

Output format
{
  "paper": {
    "title": str,
    "keywords": [str],
    "sections": [{ "title": str, "line": number, "is_references": bool, "sections": [{ "title": str, "line": number, "sections": [...] }] }]
  }
}

Reply with JSON only, conforming to this JSON Schema:
${json_schema}"#;

/// Translation of one section.
pub const TRANSLATE_SECTION_SYSTEM: &str = r#"Translate the input text into ${target_language} and output it as Markdown.

- Keep the heading marker on the first line as it is; use deeper markers for any subsection headings inside the text.
- Write every mathematical expression in TeX and wrap it in $...$ (inline) or $$...$$ (display).
- Keep citation markers such as [3] or [4, 7] unchanged.
- Output ONLY the translation. Do not wrap it in code fences and do not add commentary."#;

/// Second pass over a translated section: formulas to canonical TeX.
pub const NORMALIZE_EQUATIONS_SYSTEM: &str = r#"Convert every mathematical formula in the input text to TeX and wrap it in $...$ (inline) or $$...$$ (display).
Formulas that are already wrapped stay as they are. Change nothing else in the text.
Output ONLY the resulting text."#;

/// References section to structured citation records.
pub const REFERENCES_SYSTEM: &str = r#"Structure every entry of the input bibliography.

- "anchor" is the number or label the paper uses to cite the entry (e.g. 12 for "[12]").
- "link" is a URL or arXiv link if one is given, otherwise null.
- "venue" is the journal, conference or publisher, otherwise null.
- "year" is the publication year, otherwise null.
Keep the order of the input.

Output format
{
  "references": [
    { "anchor": str | number, "title": str, "link": str | null, "venue": str | null, "year": number | null }
  ]
}

Reply with JSON only, conforming to this JSON Schema:
${json_schema}"#;

/// Dual-flag content classification of a page chunk.
pub const CLASSIFY_CHUNK_SYSTEM: &str = r#"The input is a fragment of a scientific paper, enclosed in <paper></paper>.
Decide whether it contains body prose (anything other than the bibliography) and whether it contains a references / bibliography list. Both may be true.

Reply with JSON only, conforming to this JSON Schema:
${json_schema}"#;

/// Translation of a page chunk with rolling context.
pub const TRANSLATE_CHUNK_SYSTEM: &str = r#"The reader cannot read the language of the paper, so the fragment inside <paper></paper> must be translated in full into ${target_language} Markdown.

- Skip the references / bibliography section.
- Write mathematical expressions in TeX wrapped in $...$ or $$...$$.
- Markdown heading levels must follow the hierarchy of the table of contents.
- <previous>, when present, holds the outline so far and the last lines of the previous fragment (<last_input>) with their translation (<last_output>). Continue headings and sentences from there without repeating them.

Output the table of contents readable so far inside <outline></outline>, and the translation inside <translate></translate>."#;

/// User message of a chunk translation.
pub const CHUNK_MESSAGE: &str = "${previous}<paper>\n${full_text}\n</paper>";

/// Follow-up message of the repair loop.
pub const REPAIR_MESSAGE: &str =
    "Fix ValidationError: ${error}\nReply again with the complete corrected JSON only.";

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Substitute every `${name}` placeholder.
///
/// A placeholder without a value is an error rather than being left in the
/// prompt: the model would otherwise be asked to fill it in.
pub fn fill_template(template: &str, inputs: &PromptInputs) -> Result<String, TranslateError> {
    if let Some(missing) = RE_PLACEHOLDER
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .find(|name| !inputs.contains_key(name))
    {
        return Err(TranslateError::Internal(format!(
            "prompt placeholder '${{{missing}}}' has no value"
        )));
    }
    Ok(RE_PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| inputs[&caps[1]].clone())
        .into_owned())
}

/// Build a [`PromptInputs`] map from `(name, value)` pairs.
pub fn inputs<const N: usize>(pairs: [(&str, &str); N]) -> PromptInputs {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_named_placeholders() {
        let filled = fill_template(
            "into ${target_language}: ${full_text}",
            &inputs([("target_language", "German"), ("full_text", "hello")]),
        )
        .unwrap();
        assert_eq!(filled, "into German: hello");
    }

    #[test]
    fn values_are_not_rescanned() {
        let filled =
            fill_template("${full_text}", &inputs([("full_text", "cost ${price}")])).unwrap();
        assert_eq!(filled, "cost ${price}");
    }

    #[test]
    fn missing_placeholder_is_an_error() {
        let err = fill_template("${json_schema}", &PromptInputs::new()).unwrap_err();
        assert!(err.to_string().contains("json_schema"));
    }

    #[test]
    fn tex_dollars_are_not_placeholders() {
        let filled = fill_template("wrap in $...$ or $$x$$", &PromptInputs::new()).unwrap();
        assert_eq!(filled, "wrap in $...$ or $$x$$");
    }

    #[test]
    fn structured_prompts_request_schema() {
        for p in [OUTLINE_SYSTEM, REFERENCES_SYSTEM, CLASSIFY_CHUNK_SYSTEM] {
            assert!(p.contains("${json_schema}"));
        }
        assert!(TRANSLATE_CHUNK_SYSTEM.contains("<translate></translate>"));
        assert!(TRANSLATE_SECTION_SYSTEM.contains("${target_language}"));
    }
}

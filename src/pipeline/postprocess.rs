//! Post-processing: deterministic cleanup of model-generated text.
//!
//! Even well-prompted models wrap answers in ` ```markdown ` fences, emit
//! `\r\n`, pad lines with trailing spaces or scatter zero-width characters.
//! These rules fix such quirks without touching content. Each rule is a pure
//! `&str → String` pass.
//!
//! The module also reads tagged answers (`<translate>…</translate>`) used by
//! the chunked translator.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a free-text model answer.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim leading and trailing blank lines
pub fn clean_markdown(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

/// Prepare a structured answer for JSON parsing.
pub fn clean_json(input: &str) -> String {
    strip_code_fences(input).trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|json)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap()
});

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Tagged answers ───────────────────────────────────────────────────────────

/// Collect the contents of every `<tag>…</tag>` in `text`.
///
/// An unterminated tag runs to the end of the text: a length-limited answer
/// still yields the part that was generated.
pub fn extract_tag(text: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(&open) {
        let body = &rest[start + open.len()..];
        match body.find(&close) {
            Some(end) => {
                found.push(body[..end].to_string());
                rest = &body[end + close.len()..];
            }
            None => {
                found.push(body.to_string());
                break;
            }
        }
    }
    found
}

/// Last `n` non-blank lines of `text`, joined with `\n`.
pub fn last_non_blank_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        let input = "```markdown\n## 序論\n\n本文\n```";
        assert_eq!(clean_markdown(input), "## 序論\n\n本文");
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(clean_json("```json\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
        assert_eq!(clean_json("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn keeps_inner_code_blocks() {
        let input = "text\n```python\nprint(1)\n```\nmore";
        assert_eq!(clean_markdown(input), input);
    }

    #[test]
    fn normalises_whitespace() {
        let input = "a  \r\nb\r\n\r\n\r\n\r\n\r\nc\u{200B}\n\n";
        assert_eq!(clean_markdown(input), "a\nb\n\n\nc");
    }

    #[test]
    fn extracts_tags() {
        let text = "<outline>1. Intro</outline>\n<translate>one</translate> x <translate>two";
        assert_eq!(extract_tag(text, "outline"), vec!["1. Intro"]);
        assert_eq!(extract_tag(text, "translate"), vec!["one", "two"]);
        assert!(extract_tag(text, "missing").is_empty());
    }

    #[test]
    fn last_lines_skip_blanks() {
        let text = "a\n\nb\n  \nc\nd\n\n";
        assert_eq!(last_non_blank_lines(text, 3), "b\nc\nd");
        assert_eq!(last_non_blank_lines("x", 3), "x");
        assert_eq!(last_non_blank_lines("", 3), "");
    }
}

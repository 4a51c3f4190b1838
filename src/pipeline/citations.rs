//! Inline citation rewriting.
//!
//! `[3]` and `[4, 7]` in translated text become backlinks to the anchors
//! of the rendered reference list: `[[#^ref3]]`, `[[#^ref4]] [[#^ref7]]`.
//! Brackets inside `$…$` or `$$…$$` are mathematics (`$[a, b]$`) and are
//! left alone.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// Math spans are matched first so the citation branch never sees their content.
static RE_CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\$\$[^$]*\$\$|\$[^$]*\$)|\[(\d+(?:\s*,\s*\d+)*)\]").unwrap()
});

/// Rewrite every bracketed numeric citation group outside math spans.
pub fn rewrite_citations(text: &str) -> String {
    RE_CITATION
        .replace_all(text, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return caps[0].to_string();
            }
            caps[2]
                .split(',')
                .map(|n| format!("[[#^ref{}]]", n.trim()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_groups_and_skips_math() {
        assert_eq!(
            rewrite_citations("see [1,2] and $[3]$"),
            "see [[#^ref1]] [[#^ref2]] and $[3]$"
        );
    }

    #[test]
    fn single_and_spaced_groups() {
        assert_eq!(rewrite_citations("as in [12]."), "as in [[#^ref12]].");
        assert_eq!(
            rewrite_citations("[4, 7,  9]"),
            "[[#^ref4]] [[#^ref7]] [[#^ref9]]"
        );
    }

    #[test]
    fn display_math_is_untouched() {
        let text = "$$x \\in [0, 1]$$ cited [5]";
        assert_eq!(rewrite_citations(text), "$$x \\in [0, 1]$$ cited [[#^ref5]]");
    }

    #[test]
    fn non_numeric_brackets_are_untouched() {
        let text = "[link](http://x) and [a] and [1-3]";
        assert_eq!(rewrite_citations(text), text);
    }

    #[test]
    fn text_without_citations_is_unchanged() {
        assert_eq!(rewrite_citations("序論です。"), "序論です。");
    }
}

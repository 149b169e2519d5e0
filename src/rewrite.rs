//! Replace label, reference, and citation markup with display text.
//!
//! Math spans and HTML comments are lifted out before rewriting and restored
//! verbatim afterwards.

use std::collections::BTreeMap;

use regex::Captures;

use crate::bibtex::{self, BibEntry};
use crate::citations::CitationMap;
use crate::extract::{self, CITATION, LABEL_MARKUP};
use crate::registry::{DuplicateSet, LabelRegistry};

/// Equation-style enumerations whose references render parenthesized.
pub const DEFAULT_TAGGABLE: &[&str] = &["eq"];

/// Display options shared by every unit of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Render citations as links to `#cite-<key>` anchors.
    pub citation_links: bool,
    /// Enumeration names rendered like tagged equations, lower-case.
    pub taggable: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        return Self {
            citation_links: false,
            taggable: DEFAULT_TAGGABLE.iter().map(|s| return (*s).to_string()).collect(),
        };
    }
}

impl RenderOptions {
    /// Whether references into this enumeration render as `(n)`.
    pub fn is_taggable(&self, name: Option<&str>) -> bool {
        let Some(name) = name else {
            return false;
        };
        let lowered = name.to_lowercase();
        return self.taggable.iter().any(|t| return t.to_lowercase() == lowered);
    }
}

/// Format a label number. References into taggable enumerations are
/// parenthesized; definitions are always bare.
pub fn format_label(options: &RenderOptions, name: Option<&str>, n: u32, definition: bool) -> String {
    if !definition && options.is_taggable(name) {
        return format!("({n})");
    }
    return n.to_string();
}

/// Replace every `@label` and `#label` with its number or a warning marker.
pub fn rewrite_labels(
    text: &str,
    registry: &LabelRegistry,
    duplicates: &DuplicateSet,
    options: &RenderOptions,
) -> String {
    let shielded = extract::shield(text);
    let rewritten = LABEL_MARKUP.replace_all(&shielded.text, |cap: &Captures<'_>| {
        let key = extract::label_key_from_capture(cap, 2);
        if duplicates.contains(&key) {
            return format!("⚠️ {{duplicate: {key}}}");
        }
        let Some(n) = registry.get(&key) else {
            return format!("⚠️ {{undefined: {key}}}");
        };
        let definition = &cap[1] == "@";
        return format_label(options, key.name(), n, definition);
    });
    return shielded.restore(&rewritten);
}

/// Replace every `^key` with `[n]`, or `[?]` when the key is not cited anywhere.
pub fn rewrite_citations(text: &str, map: &CitationMap, options: &RenderOptions) -> String {
    let shielded = extract::shield(text);
    let rewritten = CITATION.replace_all(&shielded.text, |cap: &Captures<'_>| {
        let key = &cap[1];
        return match map.number(key) {
            None => "[?]".to_string(),
            Some(n) if options.citation_links => format!("[[{n}]](#cite-{key})"),
            Some(n) => format!("[{n}]"),
        };
    });
    return shielded.restore(&rewritten);
}

/// Replace the first `::: bibliography` container with the numbered
/// reference list, one entry per cited key in first-use order.
pub fn render_bibliography(
    text: &str,
    map: &CitationMap,
    entries: &BTreeMap<String, BibEntry>,
    options: &RenderOptions,
) -> String {
    let Some(block) = extract::find_bibliography_block(text) else {
        return text.to_string();
    };

    let items: Vec<String> = map
        .iter()
        .enumerate()
        .map(|(idx, key)| {
            let n = idx.saturating_add(1);
            let anchor = if options.citation_links {
                format!("<a id=\"cite-{key}\"></a>")
            } else {
                String::new()
            };
            return match entries.get(key) {
                None => format!("{n}. {anchor}**[?]** Missing entry for `{key}`"),
                Some(entry) => format!("{n}. {anchor}{}", bibtex::format_acm(entry)),
            };
        })
        .collect();

    let mut out = String::with_capacity(text.len());
    out.push_str(text.get(..block.range.start).unwrap_or(""));
    out.push_str(&items.join("\n\n"));
    out.push_str(text.get(block.range.end..).unwrap_or(""));
    return out;
}

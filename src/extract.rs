//! Targeted pattern extraction over one unit's Markdown text.
//!
//! Math spans and HTML comments are shielded before any marker pattern runs,
//! so `@`, `#`, and `^` inside them are never read as markup.

use std::ops::Range;
use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::{Captures, Regex};

use crate::types::{CitationKey, LabelFragment, LabelKey};

/// `$$...$$`, `$...$`, `\[...\]`, and `<!--...-->`, non-greedy across lines.
static SHIELDED_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"(?s)\$\$.+?\$\$|\$[^$]+\$|\\\[.+?\\\]|<!--.*?-->").expect("valid regex");
});

/// Placeholder left where a shielded span was lifted out.
static SHIELD_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"\x00SPAN(\d+)\x00").expect("valid regex"));

/// `@name:id` or `@id`.
static LABEL_DEFINITION: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"@([A-Za-z]+:)?([A-Za-z0-9:_\-]+)").expect("valid regex"));

/// `#name:id` or `#id`.
static LABEL_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"#([A-Za-z]+:)?([A-Za-z0-9:_\-]+)").expect("valid regex"));

/// Either marker; group 1 is the marker, 2 the optional `name:`, 3 the id.
pub static LABEL_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"([@#])([A-Za-z]+:)?([A-Za-z0-9:_\-]+)").expect("valid regex"));

/// `^key`.
pub static CITATION: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"\^([A-Za-z0-9_-]+)").expect("valid regex"));

/// Opening line of a bibliography container.
static BIBLIOGRAPHY_OPENER: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"(?m)^::: *bibliography").expect("valid regex"));

/// Whole `::: bibliography ... :::` container.
pub static BIBLIOGRAPHY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"(?ms)^::: *bibliography.*?:::\s*$").expect("valid regex"));

/// `src: <path-or-url>` line inside the container.
static BIBLIOGRAPHY_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"(?m)^src:[ \t]*(\S+)[ \t]*$").expect("valid regex"));

/// Text with math and comment spans swapped for numbered placeholders.
#[derive(Debug)]
pub struct Shielded {
    /// Lifted spans, indexed by placeholder number.
    spans: Vec<String>,
    /// Text with placeholders in place of the spans.
    pub text: String,
}

impl Shielded {
    /// Put every lifted span back, verbatim, into `rewritten`.
    pub fn restore(&self, rewritten: &str) -> String {
        return SHIELD_PLACEHOLDER
            .replace_all(rewritten, |cap: &Captures<'_>| {
                let span = cap[1].parse::<usize>().ok().and_then(|idx| return self.spans.get(idx));
                return match span {
                    None => cap[0].to_string(),
                    Some(original) => original.clone(),
                };
            })
            .into_owned();
    }
}

/// Lift math spans and HTML comments out of `text`.
pub fn shield(text: &str) -> Shielded {
    let mut spans = Vec::new();
    let masked = SHIELDED_SPAN.replace_all(text, |cap: &Captures<'_>| {
        let idx = spans.len();
        spans.push(cap[0].to_string());
        return format!("\u{0}SPAN{idx}\u{0}");
    });
    return Shielded {
        text: masked.into_owned(),
        spans,
    };
}

/// Build a label key from a match of any of the label patterns.
/// `name_group` is the capture holding the optional `name:` prefix.
pub fn label_key_from_capture(cap: &Captures<'_>, name_group: usize) -> LabelKey {
    let name = cap.get(name_group).map(|m| return m.as_str().trim_end_matches(':'));
    let id = cap.get(name_group.saturating_add(1)).map_or("", |m| return m.as_str());
    return LabelKey::new(name, id);
}

/// Find label definitions and references in one unit.
///
/// A definition repeated within the text stays in `defined` once and is also
/// recorded in `duplicates`. References carry no duplicate tracking.
pub fn analyze_labels(text: &str) -> LabelFragment {
    let shielded = shield(text);
    let mut fragment = LabelFragment::default();

    for cap in LABEL_DEFINITION.captures_iter(&shielded.text) {
        let key = label_key_from_capture(&cap, 1);
        if fragment.defined.contains(&key) {
            fragment.duplicates.insert(key);
        } else {
            fragment.defined.insert(key);
        }
    }

    for cap in LABEL_REFERENCE.captures_iter(&shielded.text) {
        fragment.referenced.insert(label_key_from_capture(&cap, 1));
    }

    return fragment;
}

/// Citation keys in first-use order.
pub fn analyze_citations(text: &str) -> IndexSet<CitationKey> {
    let shielded = shield(text);
    return CITATION
        .captures_iter(&shielded.text)
        .map(|cap| return cap[1].to_string())
        .collect();
}

/// A located `::: bibliography` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographyBlock {
    /// Byte range of the whole container in the unit text.
    pub range: Range<usize>,
    /// Value of the `src:` line, if the container has one.
    pub source: Option<String>,
}

/// Locate the first bibliography container in `text`.
pub fn find_bibliography_block(text: &str) -> Option<BibliographyBlock> {
    let block = BIBLIOGRAPHY_BLOCK.find(text)?;
    let source = BIBLIOGRAPHY_SOURCE
        .captures(block.as_str())
        .map(|cap| return cap[1].to_string());
    return Some(BibliographyBlock {
        range: block.range(),
        source,
    });
}

/// Whether the text opens a bibliography container.
pub fn has_bibliography_opener(text: &str) -> bool {
    return BIBLIOGRAPHY_OPENER.is_match(text);
}

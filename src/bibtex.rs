//! Bibliographic entries: the parser seam, a small BibTeX reader, and
//! reference-list formatting.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// ` and ` between author names.
static AUTHOR_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"\sand\s").expect("valid regex"));

/// Runs of whitespace, including line breaks inside field values.
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| return Regex::new(r"\s+").expect("valid regex"));

/// One parsed bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BibEntry {
    /// Entry type, lower-cased (`article`, `inproceedings`, ...).
    pub entry_type: String,
    /// Field values keyed by lower-cased field name.
    pub fields: BTreeMap<String, String>,
    /// Citation key.
    pub key: String,
}

impl BibEntry {
    /// A field value with display braces removed, if present and non-empty.
    pub fn field(&self, name: &str) -> Option<String> {
        let raw = self.fields.get(name)?;
        let cleaned = raw.replace(['{', '}'], "");
        if cleaned.trim().is_empty() {
            return None;
        }
        return Some(cleaned);
    }
}

/// Turns raw bibliography-format text into entries keyed by citation key.
pub trait EntryParser {
    /// Parse `content`. Unreadable entries are skipped, never fatal.
    fn parse(&self, content: &str) -> BTreeMap<String, BibEntry>;
}

/// Reads `@type{key, field = value, ...}` entries.
///
/// Values may be braced (with nesting), quoted, or bare. `@comment`,
/// `@preamble`, and `@string` blocks are skipped; string macros and `#`
/// concatenation are not expanded.
#[derive(Debug, Clone, Copy, Default)]
pub struct BibtexParser;

impl EntryParser for BibtexParser {
    fn parse(&self, content: &str) -> BTreeMap<String, BibEntry> {
        let mut entries = BTreeMap::new();
        let mut rest = content;

        while let Some(at) = rest.find('@') {
            rest = rest.get(at.saturating_add(1)..).unwrap_or("");
            let type_len = rest
                .find(|c: char| return !c.is_ascii_alphanumeric())
                .unwrap_or(rest.len());
            let entry_type = rest.get(..type_len).unwrap_or("").to_lowercase();
            rest = rest.get(type_len..).unwrap_or("").trim_start();

            let Some(close) = find_entry_close(rest) else {
                continue;
            };
            let body = rest.get(1..close).unwrap_or("");
            rest = rest.get(close.saturating_add(1)..).unwrap_or("");

            if entry_type.is_empty() || matches!(entry_type.as_str(), "comment" | "preamble" | "string") {
                continue;
            }
            if let Some(entry) = parse_entry_body(&entry_type, body) {
                entries.insert(entry.key.clone(), entry);
            }
        }

        return entries;
    }
}

/// Byte index of the delimiter closing the entry that opens at `text[0]`.
fn find_entry_close(text: &str) -> Option<usize> {
    let closer = match text.chars().next()? {
        '(' => ')',
        '{' => '}',
        _ => return None,
    };
    let mut depth = 0_u32;
    for (idx, c) in text.char_indices().skip(1) {
        match c {
            '{' => depth = depth.saturating_add(1),
            '}' if depth > 0 => depth = depth.saturating_sub(1),
            _ if c == closer && depth == 0 => return Some(idx),
            _ => {},
        }
    }
    return None;
}

/// Split on commas that sit outside braces and quotes.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_u32;
    let mut quoted = false;
    let mut start = 0_usize;
    for (idx, c) in body.char_indices() {
        match c {
            '"' if depth == 0 => quoted = !quoted,
            '{' => depth = depth.saturating_add(1),
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !quoted => {
                parts.push(body.get(start..idx).unwrap_or(""));
                start = idx.saturating_add(1);
            },
            _ => {},
        }
    }
    parts.push(body.get(start..).unwrap_or(""));
    return parts;
}

/// Parse `key, name = value, ...` into an entry.
fn parse_entry_body(entry_type: &str, body: &str) -> Option<BibEntry> {
    let mut parts = split_top_level(body).into_iter();
    let key = parts.next()?.trim().to_string();
    if key.is_empty() || key.contains('=') {
        return None;
    }

    let fields = parts
        .filter_map(|part| {
            let (name, value) = part.split_once('=')?;
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return None;
            }
            return Some((name, clean_value(value)));
        })
        .collect();

    return Some(BibEntry {
        entry_type: entry_type.to_string(),
        fields,
        key,
    });
}

/// Strip one layer of braces or quotes and collapse whitespace.
fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|v| return v.strip_suffix('}'))
        .or_else(|| return trimmed.strip_prefix('"').and_then(|v| return v.strip_suffix('"')))
        .unwrap_or(trimmed);
    return WHITESPACE_RUN.replace_all(inner.trim(), " ").into_owned();
}

/// Format one entry in a compact ACM-like style:
/// `Authors. Year. Title. *Venue* **Vol**, Num (Month Year), Pages. DOI-link`.
pub fn format_acm(entry: &BibEntry) -> String {
    let authors = entry.field("author").unwrap_or_default();
    let authors = format!("{}.", AUTHOR_SEPARATOR.replace_all(&authors, ", "));
    let year = entry.field("year").unwrap_or_default();
    let title = entry.field("title").map(|t| return format!(" {t}.")).unwrap_or_default();
    let venue = entry
        .field("journal")
        .or_else(|| return entry.field("booktitle"))
        .map(|v| return format!(" *{v}*"))
        .unwrap_or_default();
    let volume = entry.field("volume").map(|v| return format!(" **{v}**")).unwrap_or_default();
    let number = entry.field("number").map(|n| return format!(", {n}")).unwrap_or_default();
    let date = match (entry.field("month"), year.is_empty()) {
        (Some(month), false) => format!(" ({month} {year})"),
        (Some(month), true) => format!(" ({month})"),
        (None, false) => format!(" ({year})"),
        (None, true) => String::new(),
    };
    let pages = entry.field("pages").map(|p| return format!(", {p}")).unwrap_or_default();
    let doi = entry
        .field("doi")
        .map(|d| return format!(" [https://doi.org/{d}](https://doi.org/{d})"))
        .unwrap_or_default();

    return format!("{authors} {year}.{title}{venue}{volume}{number}{date}{pages}.{doi}");
}

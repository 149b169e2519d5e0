/// Core domain types for mdxref labels, citations, and document units.
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexSet;

/// A citation key as written after `^`. Case-sensitive.
pub type CitationKey = String;

/// A label identified by an optional enumeration name and an id, stored in
/// canonical form: `"name:id"`, or bare `"id"` for the global enumeration.
///
/// The id grammar admits `:`, so only the first colon separates the
/// enumeration name from the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct LabelKey(
    /// The canonical `name:id` or `id` string.
    String,
);

impl LabelKey {
    /// Build the canonical key from an optional enumeration name and an id.
    pub fn new(name: Option<&str>, id: &str) -> Self {
        return match name {
            None => Self(id.to_string()),
            Some(n) => Self(format!("{n}:{id}")),
        };
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        return &self.0;
    }

    /// Enumeration namespace this label counts in.
    pub fn enumeration(&self) -> Enumeration<'_> {
        return match self.0.split_once(':') {
            None => Enumeration::Global,
            Some((name, _)) => Enumeration::Named(name),
        };
    }

    /// The enumeration name, or `None` for the global enumeration.
    pub fn name(&self) -> Option<&str> {
        return self.0.split_once(':').map(|(name, _)| return name);
    }
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.as_str());
    }
}

/// An independent counting sequence for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Enumeration<'a> {
    /// Labels written without a `name:` prefix.
    Global,
    /// Labels written as `name:id`.
    Named(&'a str),
}

impl Enumeration<'_> {
    /// Owned form used as a counter key that outlives the label it came from.
    pub fn to_owned_name(self) -> Option<String> {
        return match self {
            Enumeration::Global => None,
            Enumeration::Named(name) => Some(name.to_string()),
        };
    }
}

/// Stable identity of a unit across edits (notebook cell id or chapter path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(
    /// The host-assigned identifier.
    pub String,
);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

/// Payload of a unit, tagged by kind. Only Markdown reaches the scanners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitContent {
    /// Executable source; passed through untouched.
    Code(String),
    /// Markdown prose carrying labels, references, and citations.
    Markdown(String),
    /// Raw or unknown cell kinds.
    Other(String),
}

/// One block of the host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Current text, tagged by kind.
    pub content: UnitContent,
    /// Identity that survives edits.
    pub id: UnitId,
}

impl Unit {
    /// Convenience constructor for a Markdown unit.
    pub fn markdown(id: &str, text: &str) -> Self {
        return Self {
            content: UnitContent::Markdown(text.to_string()),
            id: UnitId(id.to_string()),
        };
    }

    /// The Markdown text, or `None` for code and other units.
    pub fn markdown_text(&self) -> Option<&str> {
        return match &self.content {
            UnitContent::Markdown(text) => Some(text),
            UnitContent::Code(_) | UnitContent::Other(_) => None,
        };
    }

    /// Raw text regardless of kind.
    pub fn text(&self) -> &str {
        return match &self.content {
            UnitContent::Code(text) | UnitContent::Markdown(text) | UnitContent::Other(text) => text,
        };
    }
}

/// Labels found in one unit by the pattern extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFragment {
    /// Labels defined more than once within this unit.
    pub duplicates: IndexSet<LabelKey>,
    /// Labels whose `@` defining mark appears here, in first-occurrence order.
    pub defined: IndexSet<LabelKey>,
    /// Labels referenced with `#`, in first-occurrence order.
    pub referenced: IndexSet<LabelKey>,
}

/// Per-unit scan results, replaced wholesale on each rescan of the unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitMetadata {
    /// Source path or URL declared by this unit's bibliography block.
    pub bibliography_source: Option<String>,
    /// Citation keys in first-use order.
    pub citations_referenced: IndexSet<CitationKey>,
    /// Labels defined more than once within this unit.
    pub duplicate_labels: IndexSet<LabelKey>,
    /// Whether this unit hosts the `::: bibliography` placeholder block.
    pub is_bibliography_unit: bool,
    /// Labels defined in this unit, in occurrence order.
    pub labels_defined: IndexSet<LabelKey>,
    /// Labels referenced from this unit.
    pub labels_referenced: IndexSet<LabelKey>,
}

impl UnitMetadata {
    /// Swap in a fresh label fragment, keeping citation and bibliography fields.
    pub fn replace_labels(&mut self, fragment: LabelFragment) {
        self.duplicate_labels = fragment.duplicates;
        self.labels_defined = fragment.defined;
        self.labels_referenced = fragment.referenced;
    }
}

/// Side table from unit identity to the metadata of its last scan.
pub type MetadataTable = HashMap<UnitId, UnitMetadata>;

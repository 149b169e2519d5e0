//! Host documents and the per-document numbering state.
//!
//! A [`Document`] is an ordered list of units read from a notebook, a single
//! Markdown file, or a directory of Markdown chapters. A [`DocumentState`]
//! owns every table one open document needs; two documents never share state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::bibtex::EntryParser;
use crate::citations::{self, CitationMap};
use crate::config::Config;
use crate::error::Error;
use crate::freshness::{BibInfo, SourceFetcher};
use crate::registry::{self, DuplicateSet, LabelRegistry};
use crate::renumber;
use crate::rewrite::{self, RenderOptions};
use crate::types::{CitationKey, LabelKey, MetadataTable, Unit, UnitContent, UnitId};

/// Where a document's units came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A directory of `.md` chapters, one unit per file.
    Chapters,
    /// A single `.md` file.
    Markdown,
    /// A Jupyter `.ipynb` notebook, one unit per cell.
    Notebook,
}

/// An ordered sequence of units plus where they were read from.
#[derive(Debug, Clone)]
pub struct Document {
    /// Directory relative bibliography paths resolve against.
    base_dir: PathBuf,
    /// Source format.
    kind: DocumentKind,
    /// Path the document was loaded from.
    path: PathBuf,
    /// Units in document order.
    units: Vec<Unit>,
}

/// Notebook file shape; every other nbformat field is ignored.
#[derive(Deserialize)]
struct RawNotebook {
    /// Cells in notebook order.
    cells: Vec<RawCell>,
}

/// One notebook cell.
#[derive(Deserialize)]
struct RawCell {
    /// `markdown`, `code`, or `raw`.
    cell_type: String,
    /// Stable cell id (nbformat 4.5+).
    #[serde(default)]
    id: Option<String>,
    /// Cell text, as one string or a list of lines.
    #[serde(default)]
    source: RawSource,
}

/// nbformat allows either representation for multi-line strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSource {
    /// Lines that already carry their own newlines.
    Lines(Vec<String>),
    /// The whole text.
    Text(String),
}

impl Default for RawSource {
    fn default() -> Self {
        return Self::Text(String::new());
    }
}

impl RawSource {
    /// Join into one string.
    fn into_text(self) -> String {
        return match self {
            Self::Lines(lines) => lines.concat(),
            Self::Text(text) => text,
        };
    }
}

/// Directory that holds the document's `.mdxref.toml` and cache file:
/// the directory itself for chapters, the parent for a file.
pub fn document_dir(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }
    return match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
}

impl Document {
    /// Directory relative bibliography sources resolve against.
    pub fn base_dir(&self) -> &Path {
        return &self.base_dir;
    }

    /// Ids of units whose text differs between `self` and `newer`.
    /// Only meaningful when both have the same structure.
    pub fn edited_units(&self, newer: &Self) -> Vec<UnitId> {
        return self
            .units
            .iter()
            .zip(&newer.units)
            .filter(|(old, new)| return old.content != new.content)
            .map(|(_, new)| return new.id.clone())
            .collect();
    }

    /// Source format.
    pub const fn kind(&self) -> DocumentKind {
        return self.kind;
    }

    /// Load a notebook, a Markdown file, or a directory of chapters.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` if `path` does not exist,
    /// `Error::UnsupportedDocument` for other file types,
    /// `Error::Json` / `Error::NotebookMalformed` for unreadable notebooks,
    /// or `Error::Io` for read failures.
    pub fn load(path: &Path, config: &Config) -> Result<Self, Error> {
        if !path.exists() {
            return Err(Error::DocumentNotFound { path: path.to_path_buf() });
        }
        let base_dir = document_dir(path);

        if path.is_dir() {
            let units = load_chapters(path, config)?;
            debug!(path = %path.display(), units = units.len(), "loaded chapter directory");
            return Ok(Self {
                base_dir,
                kind: DocumentKind::Chapters,
                path: path.to_path_buf(),
                units,
            });
        }

        let extension = path.extension().and_then(|e| return e.to_str()).map(str::to_lowercase);
        let (kind, units) = match extension.as_deref() {
            Some("ipynb") => (DocumentKind::Notebook, load_notebook(path)?),
            Some("md") => {
                let text = std::fs::read_to_string(path)?;
                let id = path.file_name().map_or_else(String::new, |n| return n.to_string_lossy().into_owned());
                (DocumentKind::Markdown, vec![Unit::markdown(&id, &text)])
            },
            _ => return Err(Error::UnsupportedDocument { path: path.to_path_buf() }),
        };
        debug!(path = %path.display(), units = units.len(), "loaded document");
        return Ok(Self {
            base_dir,
            kind,
            path: path.to_path_buf(),
            units,
        });
    }

    /// Path the document was loaded from.
    pub fn path(&self) -> &Path {
        return &self.path;
    }

    /// Whether both documents list the same units, by id and kind, in the same order.
    pub fn same_structure(&self, other: &Self) -> bool {
        let shape = |u: &Unit| return (u.id.clone(), std::mem::discriminant(&u.content));
        return self.units.iter().map(shape).eq(other.units.iter().map(shape));
    }

    /// Replace a unit's text, keeping its kind.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnitNotInDocument` if no unit has this id.
    pub fn set_source(&mut self, id: &UnitId, text: &str) -> Result<(), Error> {
        let Some(unit) = self.units.iter_mut().find(|u| return &u.id == id) else {
            return Err(Error::UnitNotInDocument { id: id.0.clone() });
        };
        unit.content = match unit.content {
            UnitContent::Code(_) => UnitContent::Code(text.to_string()),
            UnitContent::Markdown(_) => UnitContent::Markdown(text.to_string()),
            UnitContent::Other(_) => UnitContent::Other(text.to_string()),
        };
        return Ok(());
    }

    /// Units in document order.
    pub fn units(&self) -> &[Unit] {
        return &self.units;
    }
}

/// One unit per cell; ids fall back to `cell-<index>`.
///
/// # Errors
///
/// Returns `Error::Json` if the file is not JSON,
/// or `Error::NotebookMalformed` if it lacks the nbformat cell list
/// or two cells end up with the same id.
fn load_notebook(path: &Path) -> Result<Vec<Unit>, Error> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let notebook: RawNotebook = serde_json::from_value(value).map_err(|e| {
        return Error::NotebookMalformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
    })?;

    let mut seen = HashSet::new();
    let mut units = Vec::with_capacity(notebook.cells.len());
    for (idx, cell) in notebook.cells.into_iter().enumerate() {
        let text = cell.source.into_text();
        let content = match cell.cell_type.as_str() {
            "code" => UnitContent::Code(text),
            "markdown" => UnitContent::Markdown(text),
            _ => UnitContent::Other(text),
        };
        let id = cell.id.unwrap_or_else(|| return format!("cell-{idx}"));
        // Units share metadata by id, so two cells may never resolve to the same one.
        if !seen.insert(id.clone()) {
            return Err(Error::NotebookMalformed {
                path: path.to_path_buf(),
                reason: format!("cell id `{id}` appears more than once"),
            });
        }
        units.push(Unit { content, id: UnitId(id) });
    }
    return Ok(units);
}

/// One Markdown unit per `.md` file under `dir`, sorted by relative path.
///
/// # Errors
///
/// Returns `Error::Io` if a chapter cannot be read.
fn load_chapters(dir: &Path, config: &Config) -> Result<Vec<Unit>, Error> {
    let mut units = Vec::new();
    let walker = WalkDir::new(dir).sort_by_file_name().into_iter().filter_entry(|entry| {
        // Skip hidden directories and files, but never the root itself.
        return entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.');
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                continue;
            },
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| return ext != "md") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| return c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !config.should_scan(&relative) {
            continue;
        }
        let text = std::fs::read_to_string(path)?;
        units.push(Unit::markdown(&relative, &text));
    }

    units.sort_by(|a, b| return a.id.cmp(&b.id));
    return Ok(units);
}

/// What one edit changed, for deciding which units to re-render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    /// Citation keys whose number changed, appeared, or disappeared.
    pub changed_citations: HashSet<CitationKey>,
    /// Labels whose number or duplicate status changed.
    pub changed_labels: HashSet<LabelKey>,
    /// Duplicates found in the enumerations the edit touched.
    pub duplicate_labels: DuplicateSet,
    /// The unit that was edited.
    pub edited: UnitId,
}

/// Everything one open document needs, owned in one place.
#[derive(Debug, Default)]
pub struct DocumentState {
    /// Active bibliography source and its parsed entries.
    pub bibliography: BibInfo,
    /// Citation numbering.
    pub citations: CitationMap,
    /// Labels defined more than once.
    pub duplicates: DuplicateSet,
    /// Label numbering.
    pub labels: LabelRegistry,
    /// Per-unit scan results.
    pub metadata: MetadataTable,
    /// Display options.
    pub options: RenderOptions,
}

impl DocumentState {
    /// Units whose rendering may differ after an edit.
    pub fn affected_units(&self, units: &[Unit], outcome: &EditOutcome) -> Vec<UnitId> {
        let citations_moved = !outcome.changed_citations.is_empty();
        return units
            .iter()
            .filter(|unit| {
                if unit.id == outcome.edited {
                    return true;
                }
                let Some(meta) = self.metadata.get(&unit.id) else {
                    return false;
                };
                if citations_moved && meta.is_bibliography_unit {
                    return true;
                }
                return meta
                    .labels_defined
                    .iter()
                    .chain(&meta.labels_referenced)
                    .any(|key| return outcome.changed_labels.contains(key))
                    || meta
                        .citations_referenced
                        .iter()
                        .any(|key| return outcome.changed_citations.contains(key));
            })
            .map(|unit| return unit.id.clone())
            .collect();
    }

    /// Incrementally update labels and citations after `edited` changed.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnitNotInDocument` if `edited` is not one of `units`.
    pub fn apply_edit(&mut self, edited: &UnitId, units: &[Unit]) -> Result<EditOutcome, Error> {
        let renumbered = renumber::update_on_edit(edited, units, &mut self.metadata, &mut self.labels)?;
        let changed_citations =
            citations::update_citation_map(edited, units, &mut self.metadata, &mut self.citations)?;

        let mut changed_labels = renumbered.changed.clone();
        if !renumbered.affected.is_empty() {
            let before = self.duplicates.clone();
            self.duplicates.retain(|key| return !renumbered.touches(key));
            self.duplicates.extend(renumbered.duplicates.iter().cloned());
            changed_labels.extend(before.symmetric_difference(&self.duplicates).cloned());
        }

        return Ok(EditOutcome {
            changed_citations,
            changed_labels,
            duplicate_labels: renumbered.duplicates,
            edited: edited.clone(),
        });
    }

    /// Forget everything (document closed).
    pub fn clear(&mut self) {
        self.bibliography.clear();
        self.citations.clear();
        self.duplicates.clear();
        self.labels.clear();
        self.metadata.clear();
    }

    /// Empty state with the given display options.
    pub fn new(options: RenderOptions) -> Self {
        return Self {
            options,
            ..Self::default()
        };
    }

    /// Re-check the bibliography source named by the first bibliography unit.
    ///
    /// Returns `true` when entries were reloaded. A block without a `src:`
    /// line is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error; the cached entries stay as they were.
    pub fn refresh_bibliography(
        &mut self,
        units: &[Unit],
        fetcher: &dyn SourceFetcher,
        parser: &dyn EntryParser,
    ) -> Result<bool, Error> {
        let Some((unit, meta)) = units
            .iter()
            .filter_map(|u| return self.metadata.get(&u.id).map(|m| return (u, m)))
            .find(|(_, meta)| return meta.is_bibliography_unit)
        else {
            return Ok(false);
        };
        let Some(src) = meta.bibliography_source.clone() else {
            warn!(unit = %unit.id, "bibliography block has no `src:` line, skipping");
            return Ok(false);
        };
        return self.bibliography.refresh(&src, fetcher, parser);
    }

    /// Rewritten text of a Markdown unit; `None` for code and other units.
    pub fn render(&self, unit: &Unit) -> Option<String> {
        let text = unit.markdown_text()?;
        let labelled = rewrite::rewrite_labels(text, &self.labels, &self.duplicates, &self.options);
        let cited = rewrite::rewrite_citations(&labelled, &self.citations, &self.options);
        let is_bibliography_unit = self.metadata.get(&unit.id).is_some_and(|m| return m.is_bibliography_unit);
        if !is_bibliography_unit {
            return Some(cited);
        }
        return Some(rewrite::render_bibliography(
            &cited,
            &self.citations,
            &self.bibliography.entries,
            &self.options,
        ));
    }

    /// Full label and citation scan, replacing all per-unit metadata.
    pub fn scan(&mut self, units: &[Unit]) {
        self.metadata.clear();
        let (labels, duplicates) = registry::scan_all(units, &mut self.metadata);
        self.labels = labels;
        self.duplicates = duplicates;
        self.citations = citations::scan_citations(units, &mut self.metadata);
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;
    use crate::bibtex::BibtexParser;
    use crate::freshness::tests::{SAMPLE_A, SAMPLE_B, ScriptedFetcher};

    fn units(texts: &[&str]) -> Vec<Unit> {
        return texts
            .iter()
            .enumerate()
            .map(|(i, t)| return Unit::markdown(&format!("u{i}"), t))
            .collect();
    }

    fn key(s: &str) -> LabelKey {
        return match s.split_once(':') {
            None => LabelKey::new(None, s),
            Some((name, id)) => LabelKey::new(Some(name), id),
        };
    }

    fn edit(state: &mut DocumentState, units: &mut [Unit], idx: usize, text: &str) -> EditOutcome {
        let unit = units.get_mut(idx).unwrap();
        unit.content = UnitContent::Markdown(text.to_string());
        let id = unit.id.clone();
        return state.apply_edit(&id, units).unwrap();
    }

    fn assert_matches_full_scan(state: &DocumentState, units: &[Unit]) {
        let mut fresh = DocumentState::default();
        fresh.scan(units);
        assert_eq!(state.labels, fresh.labels, "labels diverged from full rescan");
        assert_eq!(state.duplicates, fresh.duplicates, "duplicates diverged from full rescan");
        assert_eq!(state.citations, fresh.citations, "citations diverged from full rescan");
    }

    #[test]
    fn renders_labels_citations_and_bibliography() {
        let units = units(&[
            "# @intro. Intro\nSee #fig:plot and ^smith2020.",
            "![plot](p.png) Figure @fig:plot. Also ^jones2021.",
            "::: bibliography\nsrc: refs.bib\n:::",
        ]);
        let mut state = DocumentState::default();
        state.scan(&units);

        let fetcher = ScriptedFetcher::default();
        fetcher.load(&format!("{SAMPLE_A}\n{SAMPLE_B}"), None, Some("1"));
        assert!(state.refresh_bibliography(&units, &fetcher, &BibtexParser).unwrap());
        assert_eq!(fetcher.fetches.borrow().as_slice(), ["refs.bib"]);

        assert_eq!(
            state.render(&units[0]).unwrap(),
            "# 1. Intro\nSee 1 and [1]."
        );
        assert_eq!(
            state.render(&units[1]).unwrap(),
            "![plot](p.png) Figure 1. Also [2]."
        );
        let list = state.render(&units[2]).unwrap();
        assert!(list.starts_with("1. Jane Smith. 2020. A."), "got {list}");
        assert!(list.contains("\n\n2. Ann Jones. 2021. B."), "got {list}");
    }

    #[test]
    fn code_units_are_not_rendered() {
        let unit = Unit {
            content: UnitContent::Code("x = 1 # @a".to_string()),
            id: UnitId("c".to_string()),
        };
        let mut state = DocumentState::default();
        state.scan(std::slice::from_ref(&unit));
        assert_eq!(state.render(&unit), None);
        assert_eq!(state.labels.len(), 0);
    }

    #[test]
    fn edit_reports_renumbered_labels_and_affected_units() {
        let mut units = units(&["@a", "see #b", "@b", "unrelated"]);
        let mut state = DocumentState::default();
        state.scan(&units);

        let outcome = edit(&mut state, &mut units, 0, "@a @new");
        assert!(outcome.changed_labels.contains(&key("new")));
        assert!(outcome.changed_labels.contains(&key("b")));
        let affected = state.affected_units(&units, &outcome);
        let ids: Vec<&str> = affected.iter().map(|id| return id.0.as_str()).collect();
        assert_eq!(ids, ["u0", "u1", "u2"]);
        assert_matches_full_scan(&state, &units);
    }

    #[test]
    fn duplicate_status_flip_counts_as_change() {
        let mut units = units(&["@a", "#a", "text"]);
        let mut state = DocumentState::default();
        state.scan(&units);

        let outcome = edit(&mut state, &mut units, 2, "@a again");
        assert!(state.duplicates.contains(&key("a")));
        assert!(outcome.changed_labels.contains(&key("a")));
        assert!(outcome.duplicate_labels.contains(&key("a")));
        let affected = state.affected_units(&units, &outcome);
        assert_eq!(affected.len(), 3);
        assert_matches_full_scan(&state, &units);

        let outcome = edit(&mut state, &mut units, 2, "text");
        assert!(!state.duplicates.contains(&key("a")));
        assert!(outcome.changed_labels.contains(&key("a")));
        assert_matches_full_scan(&state, &units);
    }

    #[test]
    fn duplicates_in_untouched_enumerations_survive_an_edit() {
        let mut units = units(&["@fig:x @fig:x", "@eq:a"]);
        let mut state = DocumentState::default();
        state.scan(&units);

        edit(&mut state, &mut units, 1, "@eq:a @eq:b");
        assert!(state.duplicates.contains(&key("fig:x")));
        assert_matches_full_scan(&state, &units);
    }

    #[test]
    fn citation_edit_marks_bibliography_unit() {
        let mut units = units(&["^x", "^y", "::: bibliography\nsrc: r.bib\n:::"]);
        let mut state = DocumentState::default();
        state.scan(&units);

        let outcome = edit(&mut state, &mut units, 0, "^y ^x");
        assert!(outcome.changed_citations.contains("y"));
        assert!(outcome.changed_citations.contains("x"));
        let affected = state.affected_units(&units, &outcome);
        assert_eq!(affected.len(), 3);
        assert_eq!(state.citations.number("y"), Some(1));
        assert_matches_full_scan(&state, &units);
    }

    #[test]
    fn edit_of_unknown_unit_is_an_error() {
        let units = units(&["@a"]);
        let mut state = DocumentState::default();
        state.scan(&units);
        let err = state.apply_edit(&UnitId("ghost".to_string()), &units).unwrap_err();
        assert!(matches!(err, Error::UnitNotInDocument { .. }));
    }

    #[test]
    fn bibliography_block_without_source_is_skipped() {
        let units = units(&["^x", "::: bibliography\n:::"]);
        let mut state = DocumentState::default();
        state.scan(&units);
        let fetcher = ScriptedFetcher::default();
        assert!(!state.refresh_bibliography(&units, &fetcher, &BibtexParser).unwrap());
        assert!(fetcher.fetches.borrow().is_empty());
    }

    #[test]
    fn failed_refresh_keeps_numbering_and_entries() {
        let units = units(&["^smith2020", "::: bibliography\nsrc: refs.bib\n:::"]);
        let mut state = DocumentState::default();
        state.scan(&units);
        let fetcher = ScriptedFetcher::default();
        fetcher.load(SAMPLE_A, None, Some("1"));
        state.refresh_bibliography(&units, &fetcher, &BibtexParser).unwrap();

        fetcher.probe_answer(Err(Error::BibliographyNotFound { path: PathBuf::from("refs.bib") }));
        assert!(state.refresh_bibliography(&units, &fetcher, &BibtexParser).is_err());
        assert!(state.bibliography.entries.contains_key("smith2020"));
        assert_eq!(state.citations.number("smith2020"), Some(1));
    }

    #[test]
    fn clear_empties_every_table() {
        let units = units(&["@a ^x", "#a"]);
        let mut state = DocumentState::default();
        state.scan(&units);
        state.clear();
        assert_eq!(state.labels, LabelRegistry::default());
        assert_eq!(state.citations, CitationMap::default());
        assert!(state.metadata.is_empty());
    }

    #[test]
    fn notebook_cells_become_units() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.ipynb");
        std::fs::write(
            &path,
            r##"{
  "cells": [
    {"cell_type": "markdown", "id": "intro", "metadata": {}, "source": ["# @sec:intro. Intro\n", "see #sec:intro"]},
    {"cell_type": "code", "metadata": {}, "outputs": [], "source": "print(1)"},
    {"cell_type": "raw", "metadata": {}, "source": []}
  ],
  "metadata": {},
  "nbformat": 4,
  "nbformat_minor": 5
}"##,
        )
        .unwrap();

        let doc = Document::load(&path, &Config::default()).unwrap();
        assert_eq!(doc.kind(), DocumentKind::Notebook);
        assert_eq!(doc.base_dir(), dir.path());
        let ids: Vec<&str> = doc.units().iter().map(|u| return u.id.0.as_str()).collect();
        assert_eq!(ids, ["intro", "cell-1", "cell-2"]);
        assert_eq!(doc.units()[0].markdown_text(), Some("# @sec:intro. Intro\nsee #sec:intro"));
        assert_eq!(doc.units()[1].content, UnitContent::Code("print(1)".to_string()));
        assert_eq!(doc.units()[2].content, UnitContent::Other(String::new()));
    }

    #[test]
    fn notebook_without_cells_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ipynb");
        std::fs::write(&path, r#"{"nbformat": 4}"#).unwrap();
        let err = Document::load(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::NotebookMalformed { .. }), "got {err:?}");

        std::fs::write(&path, "not json").unwrap();
        let err = Document::load(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Json(_)), "got {err:?}");
    }

    #[test]
    fn chapter_directory_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("part2")).unwrap();
        std::fs::create_dir_all(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("b.md"), "@b").unwrap();
        std::fs::write(dir.path().join("a.md"), "@a").unwrap();
        std::fs::write(dir.path().join("part2/c.md"), "@c").unwrap();
        std::fs::write(dir.path().join("drafts/x.md"), "@x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "@n").unwrap();
        std::fs::write(dir.path().join(".mdxref.toml"), "exclude = [\"drafts/\"]\n").unwrap();

        let config = Config::load(dir.path()).unwrap();
        let doc = Document::load(dir.path(), &config).unwrap();
        let ids: Vec<&str> = doc.units().iter().map(|u| return u.id.0.as_str()).collect();
        assert_eq!(ids, ["a.md", "b.md", "part2/c.md"]);
        assert_eq!(doc.kind(), DocumentKind::Chapters);
    }

    #[test]
    fn missing_and_unsupported_paths() {
        let dir = tempfile::tempdir().unwrap();
        let err = Document::load(&dir.path().join("nope.md"), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound { .. }));

        let path = dir.path().join("paper.docx");
        std::fs::write(&path, "x").unwrap();
        let err = Document::load(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDocument { .. }));
    }

    #[test]
    fn set_source_and_structure_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.md");
        std::fs::write(&path, "@a").unwrap();
        let original = Document::load(&path, &Config::default()).unwrap();

        let mut edited = original.clone();
        let id = edited.units()[0].id.clone();
        edited.set_source(&id, "@b").unwrap();
        assert!(original.same_structure(&edited));
        assert_eq!(original.edited_units(&edited), vec![id]);
        assert_eq!(edited.units()[0].markdown_text(), Some("@b"));

        let err = edited.set_source(&UnitId("ghost".to_string()), "x").unwrap_err();
        assert!(matches!(err, Error::UnitNotInDocument { .. }));
    }

    #[test]
    fn cell_type_change_is_a_structure_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.ipynb");
        std::fs::write(&path, r#"{"cells": [{"cell_type": "markdown", "id": "a", "source": "@x"}]}"#).unwrap();
        let before = Document::load(&path, &Config::default()).unwrap();
        std::fs::write(&path, r#"{"cells": [{"cell_type": "code", "id": "a", "source": "@x"}]}"#).unwrap();
        let after = Document::load(&path, &Config::default()).unwrap();
        assert!(!before.same_structure(&after));
    }

    #[test]
    fn duplicate_cell_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.ipynb");
        std::fs::write(
            &path,
            r#"{"cells": [
                {"cell_type": "markdown", "id": "a", "source": "@x"},
                {"cell_type": "markdown", "id": "a", "source": "@y"}
            ]}"#,
        )
        .unwrap();
        let err = Document::load(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::NotebookMalformed { ref reason, .. } if reason.contains("`a`")), "got {err:?}");

        // A real id can collide with the positional fallback of a later cell.
        std::fs::write(
            &path,
            r#"{"cells": [
                {"cell_type": "markdown", "id": "cell-1", "source": "@x"},
                {"cell_type": "markdown", "source": "@y"}
            ]}"#,
        )
        .unwrap();
        let err = Document::load(&path, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::NotebookMalformed { .. }), "got {err:?}");
    }
}

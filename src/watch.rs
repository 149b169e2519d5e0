//! File watcher: renders on startup, then updates incrementally on document changes.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};
use tracing::{debug, info};

use crate::cache::CACHE_FILE_NAME;
use crate::commands;
use crate::config::Config;
use crate::diagnostics;
use crate::document::{self, Document, DocumentState};
use crate::error;
use crate::freshness::SourceRouter;
use crate::types::UnitId;

/// Debounce delay between filesystem events and re-render.
const DEBOUNCE_MS: u64 = 100;

/// What one update round did to the state.
#[derive(Debug, PartialEq, Eq)]
enum Round {
    /// These units were edited in place and renumbered incrementally.
    Incremental(Vec<UnitId>),
    /// Units were added, removed, reordered, or changed kind; everything was rescanned.
    Rescan,
}

/// Paths whose changes should trigger an update.
struct Relevance {
    /// File name of a single-file document; `None` for chapter directories.
    document_file: Option<PathBuf>,
    /// Files the watcher itself writes.
    ignored: Vec<PathBuf>,
}

impl Relevance {
    /// Whether any of the changed paths belongs to the document.
    fn any(&self, paths: &[PathBuf]) -> bool {
        return paths.iter().any(|path| {
            let canonical = path.canonicalize().unwrap_or_else(|_| return path.clone());
            if self.ignored.iter().any(|ignored| return ignored == &canonical) {
                return false;
            }
            // A local bibliography next to the document.
            if path.extension().is_some_and(|ext| return ext == "bib") {
                return true;
            }
            return match &self.document_file {
                Some(name) => path.file_name() == Some(name.as_os_str()),
                None => path.extension().is_some_and(|ext| return ext == "md"),
            };
        });
    }

    /// Watch for the document's own files, ignoring the output and cache.
    fn new(path: &Path, output: Option<&Path>) -> Self {
        let dir = document::document_dir(path);
        let mut ignored = vec![dir.join(CACHE_FILE_NAME)];
        ignored.extend(output.map(Path::to_path_buf));
        let ignored = ignored
            .into_iter()
            .map(|p| return p.canonicalize().unwrap_or(p))
            .collect();
        let document_file = if path.is_dir() {
            None
        } else {
            path.file_name().map(PathBuf::from)
        };
        return Self { document_file, ignored };
    }
}

/// Create a filesystem watcher that forwards changed paths on the given channel.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(
    tx: crossbeam_channel::Sender<Vec<PathBuf>>,
) -> Result<notify::RecommendedWatcher, error::Error> {
    let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_)
                    | notify::EventKind::Modify(_)
                    | notify::EventKind::Remove(_)
            )
        {
            let _ = tx.send(event.paths);
        }
    })?;
    return Ok(watcher);
}

/// Write the rendered document. Returns the exit code of this round.
fn emit(doc: &Document, state: &DocumentState, output: Option<&Path>) -> ExitCode {
    let rendered = commands::render_document(doc, state);
    return match commands::write_output(&rendered, output) {
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3_u8)
        },
        Ok(()) => ExitCode::SUCCESS,
    };
}

/// Entry point for the watch command.
///
/// Renders once, then watches the document and re-renders on changes,
/// renumbering only what each edit affects.
///
/// # Errors
///
/// Returns errors from the initial load or watcher setup.
pub fn run(path: &Path, output: Option<&Path>) -> Result<ExitCode, error::Error> {
    let (config, mut doc, mut state) = commands::open(path)?;
    let router = SourceRouter::new(doc.base_dir());
    commands::refresh_bibliography(&config, &doc, &mut state, &router);
    let mut last_code = emit(&doc, &state, output);

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;
    let dir = document::document_dir(path);
    let mode = if path.is_dir() {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher.watch(&dir, mode)?;
    let relevance = Relevance::new(path, output);

    info!(path = %path.display(), "watching for changes, press Ctrl+C to stop");

    while let Ok(first) = rx.recv() {
        let mut changed = first;
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while let Ok(more) = rx.recv_timeout(debounce) {
            changed.extend(more);
        }
        if !relevance.any(&changed) {
            continue;
        }
        last_code = match update(path, &config, &mut doc, &mut state) {
            Err(e) => {
                diagnostics::print_error(&e);
                ExitCode::from(3_u8)
            },
            Ok(round) => {
                if let Round::Incremental(edited) = &round
                    && edited.is_empty()
                {
                    debug!("change event without edited units");
                }
                commands::refresh_bibliography(&config, &doc, &mut state, &router);
                emit(&doc, &state, output)
            },
        };
    }

    state.clear();
    return Ok(last_code);
}

/// Reload the document from disk and bring `doc` and `state` up to date with it.
///
/// Edited units are written into `doc` one at a time and each edit is applied
/// incrementally; any structural change replaces `doc` and rescans from scratch.
///
/// # Errors
///
/// Returns errors from loading or from the incremental engine.
fn update(path: &Path, config: &Config, doc: &mut Document, state: &mut DocumentState) -> Result<Round, error::Error> {
    let newer = Document::load(path, config)?;

    if !doc.same_structure(&newer) {
        info!(units = newer.units().len(), "document structure changed, full rescan");
        *doc = newer;
        state.clear();
        state.scan(doc.units());
        return Ok(Round::Rescan);
    }

    let edited = doc.edited_units(&newer);
    for (id, unit) in edited.iter().filter_map(|id| {
        return newer.units().iter().find(|u| return &u.id == id).map(|u| return (id, u));
    }) {
        doc.set_source(id, unit.text())?;
        let outcome = state.apply_edit(id, doc.units())?;
        let affected = state.affected_units(doc.units(), &outcome);
        let names: Vec<&str> = affected.iter().map(|u| return u.0.as_str()).collect();
        info!(
            unit = %id,
            labels = outcome.changed_labels.len(),
            citations = outcome.changed_citations.len(),
            affected = ?names,
            "incremental update"
        );
    }
    return Ok(Round::Incremental(edited));
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    fn chapters(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            std::fs::write(dir.path().join(name), text).unwrap();
        }
        return dir;
    }

    /// State and rendering after `update` must equal a fresh open of the same files.
    fn assert_matches_fresh_open(dir: &Path, doc: &Document, state: &DocumentState) {
        let (_, fresh_doc, fresh) = commands::open(dir).unwrap();
        assert_eq!(state.labels, fresh.labels);
        assert_eq!(state.duplicates, fresh.duplicates);
        assert_eq!(state.citations, fresh.citations);
        assert_eq!(
            commands::render_document(doc, state),
            commands::render_document(&fresh_doc, &fresh)
        );
    }

    #[test]
    fn single_edit_is_applied_incrementally() {
        let dir = chapters(&[
            ("01.md", "# @intro. Intro\n\nSee #fig:b and ^knuth."),
            ("02.md", "@fig:a A.\n\n@fig:b B."),
            ("03.md", "Back to #intro, cite ^lamport."),
        ]);
        let (config, mut doc, mut state) = commands::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("02.md"), "@fig:b B first.\n\n@fig:a A.").unwrap();
        let round = update(dir.path(), &config, &mut doc, &mut state).unwrap();

        assert_eq!(round, Round::Incremental(vec![UnitId("02.md".to_string())]));
        assert_eq!(state.labels.get(&crate::types::LabelKey::new(Some("fig"), "b")), Some(1));
        assert_eq!(doc.units()[1].text(), "@fig:b B first.\n\n@fig:a A.");
        assert_matches_fresh_open(dir.path(), &doc, &state);
    }

    #[test]
    fn added_chapter_triggers_rescan() {
        let dir = chapters(&[("01.md", "@a and #b"), ("03.md", "@b")]);
        let (config, mut doc, mut state) = commands::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("02.md"), "@c ^x").unwrap();
        let round = update(dir.path(), &config, &mut doc, &mut state).unwrap();

        assert_eq!(round, Round::Rescan);
        assert_eq!(doc.units().len(), 3);
        assert_eq!(state.labels.get(&crate::types::LabelKey::new(None, "b")), Some(3));
        assert_matches_fresh_open(dir.path(), &doc, &state);
    }

    #[test]
    fn two_edits_in_one_round_match_full_scan() {
        let dir = chapters(&[
            ("01.md", "@a ^one"),
            ("02.md", "@b #d ^two"),
            ("03.md", "@c"),
            ("04.md", "@d #a ^one"),
        ]);
        let (config, mut doc, mut state) = commands::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("01.md"), "@x @a ^two").unwrap();
        std::fs::write(dir.path().join("03.md"), "@c @b ^three").unwrap();
        let round = update(dir.path(), &config, &mut doc, &mut state).unwrap();

        assert_eq!(
            round,
            Round::Incremental(vec![UnitId("01.md".to_string()), UnitId("03.md".to_string())])
        );
        assert!(state.duplicates.contains(&crate::types::LabelKey::new(None, "b")));
        assert_matches_fresh_open(dir.path(), &doc, &state);
    }

    #[test]
    fn unchanged_files_are_a_no_op_round() {
        let dir = chapters(&[("01.md", "@a")]);
        let (config, mut doc, mut state) = commands::open(dir.path()).unwrap();
        let round = update(dir.path(), &config, &mut doc, &mut state).unwrap();
        assert_eq!(round, Round::Incremental(Vec::new()));
        assert_matches_fresh_open(dir.path(), &doc, &state);
    }

    #[test]
    fn relevance_skips_own_writes_in_a_chapter_directory() {
        let dir = chapters(&[("01.md", "@a"), ("out.md", ""), (CACHE_FILE_NAME, ""), ("refs.bib", "")]);
        let output = dir.path().join("out.md");
        let relevance = Relevance::new(dir.path(), Some(&output));

        assert!(!relevance.any(&[output]));
        assert!(!relevance.any(&[dir.path().join(CACHE_FILE_NAME)]));
        assert!(relevance.any(&[dir.path().join("refs.bib")]));
        assert!(relevance.any(&[dir.path().join("01.md")]));
        assert!(relevance.any(&[dir.path().join("new-chapter.md")]));
        assert!(!relevance.any(&[dir.path().join("notes.txt")]));
    }

    #[test]
    fn relevance_for_a_single_file_tracks_only_that_file() {
        let dir = chapters(&[("paper.ipynb", "{}"), ("other.md", "")]);
        let relevance = Relevance::new(&dir.path().join("paper.ipynb"), None);

        assert!(relevance.any(&[dir.path().join("paper.ipynb")]));
        assert!(relevance.any(&[dir.path().join("refs.bib")]));
        assert!(!relevance.any(&[dir.path().join("other.md")]));
        assert!(!relevance.any(&[dir.path().join(CACHE_FILE_NAME)]));
    }
}

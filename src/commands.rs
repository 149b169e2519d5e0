//! Core CLI commands for mdxref: scan, check, render.

use std::path::Path;
use std::process::ExitCode;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bibtex::BibtexParser;
use crate::cache::{CACHE_FILE_NAME, CacheFile};
use crate::config::Config;
use crate::diagnostics;
use crate::document::{self, Document, DocumentState};
use crate::error;
use crate::freshness::SourceRouter;
use crate::types::{LabelKey, UnitContent};

/// One cited key in scan output.
#[derive(Serialize)]
struct CitationReport {
    /// Citation key.
    key: String,
    /// First-use position.
    number: usize,
}

/// One numbered label in scan output.
#[derive(Serialize)]
struct LabelReport {
    /// Canonical key.
    key: LabelKey,
    /// Assigned number.
    number: u32,
    /// Unit holding the numbered definition.
    unit: String,
}

/// Machine-readable result of `scan --json`.
#[derive(Serialize)]
struct ScanReport {
    /// Cited keys in first-use order.
    citations: Vec<CitationReport>,
    /// Labels defined more than once, sorted.
    duplicates: Vec<LabelKey>,
    /// Labels grouped by enumeration (`""` is the global one), groups in
    /// order of first appearance.
    labels: IndexMap<String, Vec<LabelReport>>,
}

/// Report undefined references and duplicate labels.
///
/// # Errors
///
/// Returns errors from config or document loading.
pub fn check(path: &Path) -> Result<ExitCode, error::Error> {
    let (_, doc, state) = open(path)?;

    let mut duplicates: Vec<&LabelKey> = state.duplicates.iter().collect();
    duplicates.sort();
    for key in &duplicates {
        println!("DUPLICATE  {key}");
    }

    let mut undefined_count = 0_u32;
    for unit in doc.units() {
        let Some(meta) = state.metadata.get(&unit.id) else {
            continue;
        };
        for key in &meta.labels_referenced {
            if !state.labels.contains(key) && !state.duplicates.contains(key) {
                undefined_count = undefined_count.saturating_add(1);
                println!("UNDEFINED  {key} ({})", unit.id);
            }
        }
    }

    let duplicate_count = duplicates.len();
    if duplicate_count > 0 || undefined_count > 0 {
        println!();
        println!("{duplicate_count} duplicate, {undefined_count} undefined");
        return Ok(ExitCode::from(1));
    }
    let total = state.labels.len();
    println!("All {total} labels defined once");
    return Ok(ExitCode::SUCCESS);
}

/// Load config, document, and a fully scanned state.
///
/// # Errors
///
/// Returns errors from config or document loading.
pub fn open(path: &Path) -> Result<(Config, Document, DocumentState), error::Error> {
    let config = Config::load(&document::document_dir(path))?;
    let doc = Document::load(path, &config)?;
    let mut state = DocumentState::new(config.render_options());
    state.scan(doc.units());
    debug!(kind = ?doc.kind(), labels = state.labels.len(), citations = state.citations.len(), "document scanned");
    return Ok((config, doc, state));
}

/// Bring the bibliography up to date, seeding from and updating the cache file.
///
/// Failures are reported as diagnostics; rendering continues with whatever
/// entries are cached.
pub fn refresh_bibliography(config: &Config, doc: &Document, state: &mut DocumentState, router: &SourceRouter) {
    let cache_path = document::document_dir(doc.path()).join(CACHE_FILE_NAME);
    if config.cache && state.bibliography.src.is_empty() {
        match CacheFile::read(&cache_path) {
            Err(e) => {
                warn!(path = %cache_path.display(), "ignoring unreadable bibliography cache");
                diagnostics::print_error(&e);
            },
            Ok(None) => {},
            Ok(Some(cached)) => state.bibliography = cached.into_info(),
        }
    }

    match state.refresh_bibliography(doc.units(), router, &BibtexParser) {
        Err(e) => diagnostics::print_error(&e),
        Ok(false) => {},
        Ok(true) => {
            if !config.cache {
                return;
            }
            if let Err(e) = CacheFile::from_info(&state.bibliography).write(&cache_path) {
                diagnostics::print_error(&e);
            } else {
                debug!(path = %cache_path.display(), "bibliography cache written");
            }
        },
    }
    return;
}

/// Scan, refresh the bibliography, and write the rendered document.
///
/// # Errors
///
/// Returns errors from loading or from writing the output file.
pub fn render(path: &Path, output: Option<&Path>) -> Result<(), error::Error> {
    let (config, doc, mut state) = open(path)?;
    let router = SourceRouter::new(doc.base_dir());
    refresh_bibliography(&config, &doc, &mut state, &router);
    let rendered = render_document(&doc, &state);
    return write_output(&rendered, output);
}

/// Render every unit: Markdown rewritten, code fenced, other units verbatim,
/// joined by blank lines.
pub fn render_document(doc: &Document, state: &DocumentState) -> String {
    let blocks: Vec<String> = doc
        .units()
        .iter()
        .map(|unit| {
            let block = match (state.render(unit), &unit.content) {
                (Some(text), _) => text,
                (None, UnitContent::Code(code)) => format!("```\n{}\n```", code.trim_end_matches('\n')),
                (None, _) => unit.text().to_string(),
            };
            return block.trim_end_matches('\n').to_string();
        })
        .collect();
    let mut out = blocks.join("\n\n");
    if !out.ends_with('\n') {
        out.push('\n');
    }
    return out;
}

/// Print numbered labels, citation order, and duplicates.
///
/// # Errors
///
/// Returns errors from loading, or `Error::Json` if JSON output fails.
pub fn scan(path: &Path, json: bool) -> Result<(), error::Error> {
    let (_, doc, state) = open(path)?;
    let report = scan_report(&doc, &state);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (name, labels) in &report.labels {
        let heading = if name.is_empty() { "(global)" } else { name.as_str() };
        println!("## {heading}");
        for label in labels {
            println!("{:>4}  {}  ({})", label.number, label.key, label.unit);
        }
        println!();
    }
    if !report.citations.is_empty() {
        println!("## citations");
        for cite in &report.citations {
            println!("{:>4}  {}", cite.number, cite.key);
        }
        println!();
    }
    for key in &report.duplicates {
        println!("DUPLICATE  {key}");
    }
    return Ok(());
}

/// Collect the scan results in document order.
fn scan_report(doc: &Document, state: &DocumentState) -> ScanReport {
    let mut labels: IndexMap<String, Vec<LabelReport>> = IndexMap::new();
    for unit in doc.units() {
        let Some(meta) = state.metadata.get(&unit.id) else {
            continue;
        };
        for key in &meta.labels_defined {
            let Some(number) = state.labels.get(key) else {
                continue;
            };
            let group = labels.entry(key.name().unwrap_or_default().to_string()).or_default();
            // Later definitions of a duplicate reuse the first one's number.
            if group.iter().any(|l| return &l.key == key) {
                continue;
            }
            group.push(LabelReport {
                key: key.clone(),
                number,
                unit: unit.id.0.clone(),
            });
        }
    }

    let citations = state
        .citations
        .iter()
        .enumerate()
        .map(|(idx, key)| {
            return CitationReport {
                key: key.clone(),
                number: idx.saturating_add(1),
            };
        })
        .collect();

    let mut duplicates: Vec<LabelKey> = state.duplicates.iter().cloned().collect();
    duplicates.sort();

    return ScanReport {
        citations,
        duplicates,
        labels,
    };
}

/// Write to `output`, or stdout when absent.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be written.
pub fn write_output(rendered: &str, output: Option<&Path>) -> Result<(), error::Error> {
    match output {
        None => print!("{rendered}"),
        Some(file) => {
            std::fs::write(file, rendered)?;
            eprintln!("Wrote {}", file.display());
        },
    }
    return Ok(());
}

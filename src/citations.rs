//! First-use ordering of citation keys across the document.

use std::collections::HashSet;

use indexmap::IndexSet;
use tracing::debug;

use crate::error::Error;
use crate::extract;
use crate::types::{CitationKey, MetadataTable, Unit, UnitId};

/// Citation keys in first-use order; a key's number is its position plus one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationMap {
    order: IndexSet<CitationKey>,
}

impl CitationMap {
    /// Forget every citation.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Keys in first-use order.
    pub fn iter(&self) -> impl Iterator<Item = &CitationKey> {
        return self.order.iter();
    }

    /// Number of distinct cited keys.
    pub fn len(&self) -> usize {
        return self.order.len();
    }

    /// The 1-based citation number of `key`.
    pub fn number(&self, key: &str) -> Option<usize> {
        return self.order.get_index_of(key).map(|idx| return idx.saturating_add(1));
    }

    /// Rebuild the order from stored per-unit metadata, in unit order.
    fn rebuild(units: &[Unit], table: &MetadataTable) -> Self {
        let order = units
            .iter()
            .filter(|unit| return unit.markdown_text().is_some())
            .filter_map(|unit| return table.get(&unit.id))
            .flat_map(|meta| return meta.citations_referenced.iter().cloned())
            .collect();
        return Self { order };
    }
}

/// Scan every Markdown unit for citations, storing per-unit citation and
/// bibliography metadata in `table`.
pub fn scan_citations(units: &[Unit], table: &mut MetadataTable) -> CitationMap {
    for unit in units {
        let Some(text) = unit.markdown_text() else {
            continue;
        };
        store_citation_metadata(text, table.entry(unit.id.clone()).or_default());
    }
    let map = CitationMap::rebuild(units, table);
    debug!(citations = map.len(), "full citation scan");
    return map;
}

/// Re-extract the edited unit's citations and rebuild the order if they changed.
///
/// Returns the keys whose number changed, including keys the edited unit no
/// longer cites and keys cited for the first time.
///
/// # Errors
///
/// Returns `Error::UnitNotInDocument` if `edited` is not one of `units`.
pub fn update_citation_map(
    edited: &UnitId,
    units: &[Unit],
    table: &mut MetadataTable,
    map: &mut CitationMap,
) -> Result<HashSet<CitationKey>, Error> {
    let Some(unit) = units.iter().find(|u| return &u.id == edited) else {
        return Err(Error::UnitNotInDocument { id: edited.0.clone() });
    };
    let text = unit.markdown_text().unwrap_or("");

    let meta = table.entry(edited.clone()).or_default();
    let old_cites = std::mem::take(&mut meta.citations_referenced);
    store_citation_metadata(text, meta);
    if old_cites.iter().eq(meta.citations_referenced.iter()) {
        return Ok(HashSet::new());
    }

    let mut changed: HashSet<CitationKey> = old_cites
        .iter()
        .filter(|key| return !meta.citations_referenced.contains(*key))
        .cloned()
        .collect();

    let rebuilt = CitationMap::rebuild(units, table);
    for (idx, key) in rebuilt.order.iter().enumerate() {
        if map.order.get_index(idx) != Some(key) {
            changed.insert(key.clone());
        }
    }
    *map = rebuilt;

    debug!(unit = %edited, changed = changed.len(), "citation order update");
    return Ok(changed);
}

/// Replace the citation and bibliography fields of one unit's metadata.
fn store_citation_metadata(text: &str, meta: &mut crate::types::UnitMetadata) {
    meta.citations_referenced = extract::analyze_citations(text);
    meta.is_bibliography_unit = extract::has_bibliography_opener(text);
    meta.bibliography_source = extract::find_bibliography_block(text).and_then(|b| return b.source);
}

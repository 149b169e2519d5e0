//! Incremental renumbering after a single unit edit.
//!
//! Work is bounded to the enumerations the edited unit defines (before or
//! after the edit) and to units from the edited one onward; upstream units
//! are only walked to prime the counters. The result always matches what a
//! full rescan of the edited document would produce.

use std::collections::HashSet;

use indexmap::IndexSet;
use tracing::debug;

use crate::error::Error;
use crate::extract;
use crate::registry::{DuplicateSet, EnumerationCounters, LabelRegistry};
use crate::types::{LabelKey, MetadataTable, Unit, UnitId, UnitMetadata};

/// What an edit did to the label numbering.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Renumbered {
    /// Enumeration names the edit could affect (`None` is the global one).
    pub affected: HashSet<Option<String>>,
    /// Labels whose number changed, appeared, or disappeared.
    pub changed: HashSet<LabelKey>,
    /// Labels found defined more than once within the affected enumerations.
    pub duplicates: DuplicateSet,
}

impl Renumbered {
    /// Whether the label counts in an enumeration this edit touched.
    pub fn touches(&self, key: &LabelKey) -> bool {
        return self.affected.contains(&key.enumeration().to_owned_name());
    }
}

/// Re-extract `edited`, then renumber the enumerations its edit touched.
///
/// `registry` must reflect the document before the edit and is updated in
/// place. The edited unit's stored metadata is replaced.
///
/// # Errors
///
/// Returns `Error::UnitNotInDocument` if `edited` is not one of `units`.
pub fn update_on_edit(
    edited: &UnitId,
    units: &[Unit],
    table: &mut MetadataTable,
    registry: &mut LabelRegistry,
) -> Result<Renumbered, Error> {
    let Some(start) = units.iter().position(|u| return &u.id == edited) else {
        return Err(Error::UnitNotInDocument { id: edited.0.clone() });
    };
    let text = units.get(start).and_then(Unit::markdown_text).unwrap_or("");
    let fresh = extract::analyze_labels(text);

    let meta = table.entry(edited.clone()).or_default();
    let old_defined = std::mem::take(&mut meta.labels_defined);
    let old_duplicates = std::mem::take(&mut meta.duplicate_labels);
    let unchanged = old_defined.iter().eq(fresh.defined.iter())
        && old_duplicates.iter().eq(fresh.duplicates.iter());
    meta.replace_labels(fresh);

    // References alone never move a number or change duplicate status.
    if unchanged {
        return Ok(Renumbered::default());
    }

    let new_defined = meta.labels_defined.clone();
    let removed: Vec<LabelKey> = old_defined
        .iter()
        .filter(|key| return !new_defined.contains(*key))
        .cloned()
        .collect();
    for key in &removed {
        registry.remove(key);
    }

    let affected: HashSet<Option<String>> = old_defined
        .iter()
        .chain(new_defined.iter())
        .map(|key| return key.enumeration().to_owned_name())
        .collect();

    let mut outcome = renumber_downstream(registry, start, units, table, affected);
    outcome.changed.extend(removed);

    debug!(
        unit = %edited,
        changed = outcome.changed.len(),
        duplicates = outcome.duplicates.len(),
        "incremental renumber"
    );
    return Ok(outcome);
}

/// Two-pass walk: prime counters upstream of `start`, renumber from `start` on.
fn renumber_downstream(
    registry: &mut LabelRegistry,
    start: usize,
    units: &[Unit],
    table: &MetadataTable,
    affected: HashSet<Option<String>>,
) -> Renumbered {
    let mut counters = EnumerationCounters::default();
    let mut outcome = Renumbered {
        affected,
        ..Renumbered::default()
    };
    let mut seen: HashSet<LabelKey> = HashSet::new();

    for (idx, unit) in units.iter().enumerate() {
        let Some(meta) = table.get(&unit.id) else {
            continue;
        };
        if unit.markdown_text().is_none() {
            continue;
        }
        let upstream = idx < start;
        number_unit_labels(meta, upstream, registry, &mut counters, &mut seen, &mut outcome);
    }

    return outcome;
}

/// Count one unit's definitions inside the affected enumerations.
///
/// Upstream units keep their numbers; their entries are only re-asserted,
/// which restores a surviving duplicate whose twin was just removed.
fn number_unit_labels(
    meta: &UnitMetadata,
    upstream: bool,
    registry: &mut LabelRegistry,
    counters: &mut EnumerationCounters,
    seen: &mut HashSet<LabelKey>,
    outcome: &mut Renumbered,
) {
    let in_scope = |key: &&LabelKey| return outcome.touches(key);
    let intra: IndexSet<LabelKey> = meta.duplicate_labels.iter().filter(in_scope).cloned().collect();
    let defined: Vec<LabelKey> = meta.labels_defined.iter().filter(in_scope).cloned().collect();
    outcome.duplicates.extend(intra);

    for key in defined {
        if seen.contains(&key) {
            outcome.duplicates.insert(key);
            continue;
        }
        let n = counters.advance(key.enumeration());
        seen.insert(key.clone());
        if registry.get(&key) == Some(n) {
            continue;
        }
        if !upstream || !registry.contains(&key) {
            registry.insert(key.clone(), n);
            outcome.changed.insert(key);
        }
    }
}

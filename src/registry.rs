//! Authoritative label numbering for one document.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::extract;
use crate::types::{Enumeration, LabelKey, MetadataTable, Unit};

/// Labels known to have two or more defining occurrences.
pub type DuplicateSet = HashSet<LabelKey>;

/// Label key to 1-based number, counted independently per enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRegistry {
    numbers: HashMap<LabelKey, u32>,
}

impl LabelRegistry {
    /// Forget every label.
    pub fn clear(&mut self) {
        self.numbers.clear();
    }

    /// Whether the label currently has a number.
    pub fn contains(&self, key: &LabelKey) -> bool {
        return self.numbers.contains_key(key);
    }

    /// The label's number, if it has one.
    pub fn get(&self, key: &LabelKey) -> Option<u32> {
        return self.numbers.get(key).copied();
    }

    /// Store a number, returning the previous one.
    pub fn insert(&mut self, key: LabelKey, number: u32) -> Option<u32> {
        return self.numbers.insert(key, number);
    }

    /// Number of labels with a number.
    pub fn len(&self) -> usize {
        return self.numbers.len();
    }

    /// Drop a label's number, returning it.
    pub fn remove(&mut self, key: &LabelKey) -> Option<u32> {
        return self.numbers.remove(key);
    }
}

/// Running counters, one per enumeration, starting at 0.
#[derive(Debug, Default)]
pub struct EnumerationCounters {
    counts: HashMap<Option<String>, u32>,
}

impl EnumerationCounters {
    /// Advance the enumeration's counter and return the new value.
    pub fn advance(&mut self, enumeration: Enumeration<'_>) -> u32 {
        let count = self.counts.entry(enumeration.to_owned_name()).or_insert(0);
        *count = count.saturating_add(1);
        return *count;
    }
}

/// Scan every Markdown unit in order, storing its metadata in `table` and
/// numbering each label at its first definition.
///
/// Later definitions of an already-numbered key, and keys repeated within
/// one unit, land in the duplicate set instead of consuming a number.
pub fn scan_all(units: &[Unit], table: &mut MetadataTable) -> (LabelRegistry, DuplicateSet) {
    let mut counters = EnumerationCounters::default();
    let mut registry = LabelRegistry::default();
    let mut duplicates = DuplicateSet::new();

    for unit in units {
        let Some(text) = unit.markdown_text() else {
            continue;
        };
        let fragment = extract::analyze_labels(text);
        duplicates.extend(fragment.duplicates.iter().cloned());

        for key in &fragment.defined {
            if registry.contains(key) {
                duplicates.insert(key.clone());
            } else {
                let n = counters.advance(key.enumeration());
                registry.insert(key.clone(), n);
            }
        }

        table.entry(unit.id.clone()).or_default().replace_labels(fragment);
    }

    debug!(labels = registry.len(), duplicates = duplicates.len(), "full label scan");
    return (registry, duplicates);
}

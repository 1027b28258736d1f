//! Filter name to filter wheel slot mapping

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};

/// Standard eight-position wheel: canonical name and slot
const STANDARD_LAYOUT: [(&str, u32); 8] = [
    ("LP", 0),
    ("L", 1),
    ("R", 2),
    ("G", 3),
    ("B", 4),
    ("Ha", 5),
    ("SII", 6),
    ("OIII", 7),
];

/// Alternative spellings of the standard filters
const ALIASES: [(&str, &str); 14] = [
    ("lum", "L"),
    ("luminance", "L"),
    ("red", "R"),
    ("green", "G"),
    ("blue", "B"),
    ("h", "Ha"),
    ("halpha", "Ha"),
    ("h-alpha", "Ha"),
    ("s", "SII"),
    ("s2", "SII"),
    ("o", "OIII"),
    ("o3", "OIII"),
    ("lightpollution", "LP"),
    ("clear", "LP"),
];

/// Mapping from filter names to hardware slots.
///
/// Lookups are case-insensitive and understand the usual aliases
/// (`H`/`Ha`, `S`/`SII`, `O`/`OIII`, `Lum`/`L`...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSlots {
    slots: BTreeMap<String, u32>,
}

impl Default for FilterSlots {
    fn default() -> Self {
        Self::standard()
    }
}

impl FilterSlots {
    pub fn standard() -> Self {
        Self {
            slots: STANDARD_LAYOUT
                .iter()
                .map(|(name, slot)| (name.to_string(), *slot))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self { slots: BTreeMap::new() }
    }

    /// Add or replace a mapping
    pub fn insert(&mut self, name: impl Into<String>, slot: u32) {
        self.slots.insert(name.into(), slot);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reject spellings of one filter that point at different slots,
    /// e.g. `"H": 2` next to `"Ha": 5`
    pub fn validate(&self) -> PlannerResult<()> {
        let mut seen: BTreeMap<String, (&str, u32)> = BTreeMap::new();
        for (name, slot) in &self.slots {
            let key = canonical_name(name).to_ascii_lowercase();
            match seen.get(&key) {
                Some((other, other_slot)) if *other_slot != *slot => {
                    return Err(PlannerError::Settings(format!(
                        "filter '{}' maps to slot {} but '{}' maps to slot {}",
                        other, other_slot, name, slot
                    )));
                }
                Some(_) => {}
                None => {
                    seen.insert(key, (name.as_str(), *slot));
                }
            }
        }
        Ok(())
    }

    /// Slot for a filter name, if the mapping knows it
    pub fn resolve(&self, name: &str) -> Option<u32> {
        let wanted = canonical_name(name);
        self.slots
            .iter()
            .find(|(key, _)| canonical_name(key).eq_ignore_ascii_case(&wanted))
            .map(|(_, slot)| *slot)
    }
}

/// True for the eight standard filters and their aliases
pub fn is_standard(name: &str) -> bool {
    let wanted = canonical_name(name);
    STANDARD_LAYOUT
        .iter()
        .any(|(standard, _)| standard.eq_ignore_ascii_case(&wanted))
}

/// Map an alias to its standard name; other names come back trimmed
pub fn canonical_name(name: &str) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, standard)| standard.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

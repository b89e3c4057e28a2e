//! Code tables for the registry's free-text classifications
//!
//! Lookups are case-insensitive; anything not in a table maps to no code.

pub(crate) type CodeTable = &'static [(&'static str, i64)];

pub(crate) const WELL_TYPES: CodeTable = &[("surveillance", 1), ("trend", 2), ("special", 3)];

pub(crate) const WELL_PURPOSES: CodeTable = &[("dedicated monitoring/observation", 1), ("other", 2)];

pub(crate) const QW_WELL_CHARS: CodeTable = &[
    ("background", 1),
    ("suspected/anticipated changes", 2),
    ("known changes", 3),
];

pub(crate) const WL_WELL_CHARS: CodeTable = &[
    ("background", 1),
    ("suspected/anticipated changes", 2),
    ("known changes", 3),
    ("unknown", 999),
];

/// Looks `label` up in `table`, ignoring case and surrounding whitespace
pub(crate) fn lookup_code(table: CodeTable, label: &str) -> Option<i64> {
    let label = label.trim().to_lowercase();
    table
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, code)| *code)
}

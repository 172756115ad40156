// src/matcher.rs
//! Resolve a user-supplied table label to one catalog entry.

use tracing::debug;

use crate::catalog::TableEntry;
use crate::error::ExtractError;

/// Find the entry a label refers to.
///
/// Order of precedence: exact (case-insensitive) match on display name or
/// key, then a unique substring match on display names, then a unique
/// substring match on keys. Several substring hits are ambiguous.
pub fn resolve_table<'a>(
    label: &str,
    entries: &'a [TableEntry],
) -> Result<&'a TableEntry, ExtractError> {
    let needle = label.trim().to_lowercase();

    // 1) exact
    if let Some(hit) = entries
        .iter()
        .find(|e| e.name.to_lowercase() == needle || e.key.to_lowercase() == needle)
    {
        debug!(label, key = %hit.key, "exact table match");
        return Ok(hit);
    }

    // 2) substring on names, then on keys
    let by_name: Vec<&TableEntry> = entries
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&needle))
        .collect();
    if let [only] = by_name.as_slice() {
        debug!(label, key = %only.key, "unique name match");
        return Ok(*only);
    }

    let by_key: Vec<&TableEntry> = entries
        .iter()
        .filter(|e| e.key.to_lowercase().contains(&needle))
        .collect();
    if let [only] = by_key.as_slice() {
        debug!(label, key = %only.key, names = by_name.len(), "unique key match");
        return Ok(*only);
    }

    // 3) ambiguous or missing
    let mut candidates: Vec<String> = by_name
        .iter()
        .chain(by_key.iter())
        .map(|e| e.name.clone())
        .collect();
    candidates.sort();
    candidates.dedup();

    if candidates.is_empty() {
        Err(ExtractError::NotFound {
            label: label.to_string(),
        })
    } else {
        Err(ExtractError::Ambiguous {
            label: label.to_string(),
            candidates,
        })
    }
}

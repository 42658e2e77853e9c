//! Collision-free names for tasks, inputs and outputs.

use std::collections::HashSet;

/// Picks a name for a duplicated entity: `base_copy`, then `base_copy2`,
/// `base_copy3`, ... until one is free.
///
/// Terminates for any finite `existing` set: at most `existing.len() + 1`
/// candidates are tried.
pub fn generate_unique_duplicate_id<S>(base: &str, existing: &HashSet<S>) -> String
where
    S: std::borrow::Borrow<str> + std::hash::Hash + Eq,
{
    let first = format!("{base}_copy");
    if !existing.contains(first.as_str()) {
        return first;
    }
    (2..)
        .map(|n| format!("{base}_copy{n}"))
        .find(|candidate| !existing.contains(candidate.as_str()))
        .unwrap_or(first)
}

/// Picks a name for a new entity: `base` itself when free, else `base 2`,
/// `base 3`, ...
pub fn generate_unique_name<S>(base: &str, existing: &HashSet<S>) -> String
where
    S: std::borrow::Borrow<str> + std::hash::Hash + Eq,
{
    if !existing.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base} {n}"))
        .find(|candidate| !existing.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

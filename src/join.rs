use crate::errors::SourceError;
use crate::models::{AreaBoundary, JoinedArea};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Merges per-area records onto boundaries by exact (trimmed) name. Areas
/// found on only one side are left out, never filled with defaults.
pub fn inner_join<T: Clone>(
    boundaries: &[AreaBoundary],
    stats: &BTreeMap<String, T>,
    right: &str,
) -> Result<Vec<JoinedArea<T>>, SourceError> {
    let joined: Vec<JoinedArea<T>> = boundaries
        .iter()
        .filter_map(|boundary| {
            stats.get(&boundary.name).map(|attrs| JoinedArea {
                name: boundary.name.clone(),
                geometry: boundary.geometry.clone(),
                attrs: attrs.clone(),
            })
        })
        .collect();

    let matched: BTreeSet<&str> = joined.iter().map(|a| a.name.as_str()).collect();
    let unmatched_boundaries: Vec<&str> = boundaries
        .iter()
        .map(|b| b.name.as_str())
        .filter(|name| !matched.contains(name))
        .collect();
    let unmatched_rows: Vec<&str> = stats
        .keys()
        .map(String::as_str)
        .filter(|name| !matched.contains(name))
        .collect();
    if !unmatched_boundaries.is_empty() || !unmatched_rows.is_empty() {
        debug!(
            "{right}: boundaries without data {unmatched_boundaries:?}, data without boundary {unmatched_rows:?}"
        );
    }

    if joined.is_empty() {
        return Err(SourceError::EmptyJoin {
            left: "boundaries".to_string(),
            right: right.to_string(),
        });
    }
    Ok(joined)
}

pub fn inner_join_maps<A: Clone, B: Clone>(
    left: &BTreeMap<String, A>,
    right: &BTreeMap<String, B>,
) -> BTreeMap<String, (A, B)> {
    left.iter()
        .filter_map(|(key, a)| right.get(key).map(|b| (key.clone(), (a.clone(), b.clone()))))
        .collect()
}

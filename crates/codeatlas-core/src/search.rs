//! Key search over an atlas: prefix and fuzzy (case-insensitive substring).

use serde::{Deserialize, Serialize};

use crate::key::last_segment;
use crate::model::Atlas;

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    /// `module`, `class` or `method`.
    pub kind: String,
}

fn hits_for<'a>(atlas: &'a Atlas, keep: impl Fn(&str) -> bool) -> Vec<(&'a str, &'static str)> {
    let mut hits: Vec<(&str, &'static str)> = Vec::new();
    hits.extend(
        atlas
            .modules
            .keys()
            .filter(|k| keep(k))
            .map(|k| (k.as_str(), "module")),
    );
    hits.extend(
        atlas
            .classes
            .keys()
            .filter(|k| keep(k))
            .map(|k| (k.as_str(), "class")),
    );
    hits.extend(
        atlas
            .methods
            .keys()
            .filter(|k| keep(k))
            .map(|k| (k.as_str(), "method")),
    );
    hits
}

fn into_hits(pairs: Vec<(&str, &'static str)>, limit: Option<usize>) -> Vec<SearchHit> {
    pairs
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(key, kind)| SearchHit {
            key: key.to_string(),
            kind: kind.to_string(),
        })
        .collect()
}

/// All keys starting with `prefix`, sorted by key.
pub fn prefix_search(atlas: &Atlas, prefix: &str, limit: Option<usize>) -> Vec<SearchHit> {
    let mut hits = hits_for(atlas, |key| key.starts_with(prefix));
    hits.sort();
    into_hits(hits, limit)
}

/// Keys containing `query`, ignoring case.
///
/// Ordering: keys whose last segment equals the query first, then keys whose
/// last segment contains it, then the rest; ties broken by key.
pub fn fuzzy_search(atlas: &Atlas, query: &str, limit: Option<usize>) -> Vec<SearchHit> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let hits = hits_for(atlas, |key| key.to_lowercase().contains(&needle));
    let mut ranked: Vec<(u8, &str, &'static str)> = hits
        .into_iter()
        .map(|(key, kind)| {
            let last = last_segment(key).to_lowercase();
            let rank = if last == needle {
                0
            } else if last.contains(&needle) {
                1
            } else {
                2
            };
            (rank, key, kind)
        })
        .collect();
    ranked.sort();
    into_hits(
        ranked.into_iter().map(|(_, key, kind)| (key, kind)).collect(),
        limit,
    )
}

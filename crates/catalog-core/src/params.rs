//! Bidirectional mapping between [`FilterState`] and the flat key/value set
//! used for bookmarking and sharing a search.
//!
//! Encoding leaves out every key whose value equals its default; decoding
//! applies the same defaults to absent keys, so `decode(encode(s)) == s`.
//! Decoding never fails: unparseable values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use crate::filter::{FilterState, YearRange};
use crate::types::{Dimension, Scope, SortKey, WorkStatus};

pub const KEY_QUERY: &str = "q";
pub const KEY_YEAR_START: &str = "ys";
pub const KEY_YEAR_END: &str = "ye";
pub const KEY_SORT: &str = "sort";
pub const KEY_SCOPE: &str = "scope";
pub const KEY_GENRE: &str = "genre";
pub const KEY_TYPE: &str = "type";
pub const KEY_TAGS: &str = "teoseTags";
pub const KEY_AUTHOR: &str = "author";
pub const KEY_WORK: &str = "work";
pub const KEY_STATUS: &str = "status";
pub const KEY_COLLECTION: &str = "collection";
pub const KEY_PAGE: &str = "page";

/// Shareable key carrying the selection of a dimension.
pub fn key_for(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Genre => KEY_GENRE,
        Dimension::Type => KEY_TYPE,
        Dimension::Tags => KEY_TAGS,
        Dimension::Author => KEY_AUTHOR,
    }
}

/// The shareable representation. Keys are kept sorted so equal states always
/// produce equal parameter sets and query strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareableParams(BTreeMap<String, String>);

impl ShareableParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `application/x-www-form-urlencoded` form, without a leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.0 {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }

    /// Parses a query string (an optional leading `?` is ignored). For repeated
    /// keys the last occurrence wins.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self(pairs)
    }

    /// Stable 64-bit fingerprint, used to tag requests in logs.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}

impl FromIterator<(String, String)> for ShareableParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn encode_year(out: &mut ShareableParams, key: &str, value: Option<i32>, default: Option<i32>) {
    if value == default {
        return;
    }
    // A cleared bound is kept as an empty value so it survives the round trip.
    out.insert(key, value.map(|v| v.to_string()).unwrap_or_default());
}

fn decode_year(params: &ShareableParams, key: &str, default: Option<i32>) -> Option<i32> {
    match params.get(key) {
        None => default,
        Some(raw) if raw.trim().is_empty() => None,
        Some(raw) => raw.trim().parse().ok().or(default),
    }
}

fn encode_set(out: &mut ShareableParams, key: &str, set: &BTreeSet<String>) {
    if !set.is_empty() {
        out.insert(key, set.iter().map(String::as_str).collect::<Vec<_>>().join(","));
    }
}

fn decode_set(params: &ShareableParams, key: &str) -> BTreeSet<String> {
    params
        .get(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn encode_scalar(out: &mut ShareableParams, key: &str, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        out.insert(key, v);
    }
}

fn decode_scalar(params: &ShareableParams, key: &str) -> Option<String> {
    params.get(key).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn encode(state: &FilterState, span: YearRange) -> ShareableParams {
    let mut out = ShareableParams::new();
    if !state.query.is_empty() {
        out.insert(KEY_QUERY, state.query.clone());
    }
    encode_year(&mut out, KEY_YEAR_START, state.year_range.start, span.start);
    encode_year(&mut out, KEY_YEAR_END, state.year_range.end, span.end);
    if state.sort != SortKey::default_for(&state.query) {
        out.insert(KEY_SORT, state.sort.as_str());
    }
    if state.scope != Scope::All {
        out.insert(KEY_SCOPE, state.scope.as_str());
    }
    encode_set(&mut out, KEY_GENRE, &state.selected_genres);
    encode_set(&mut out, KEY_TYPE, &state.selected_types);
    encode_set(&mut out, KEY_TAGS, &state.selected_tags);
    encode_scalar(&mut out, KEY_AUTHOR, state.selected_author.as_deref());
    encode_scalar(&mut out, KEY_WORK, state.selected_work_id.as_deref());
    encode_scalar(&mut out, KEY_STATUS, state.selected_status.map(WorkStatus::as_str));
    encode_scalar(&mut out, KEY_COLLECTION, state.selected_collection_id.as_deref());
    if state.page > 1 {
        out.insert(KEY_PAGE, state.page.to_string());
    }
    out
}

pub fn decode(params: &ShareableParams, span: YearRange) -> FilterState {
    let query = params.get(KEY_QUERY).unwrap_or_default().to_string();
    let sort = params
        .get(KEY_SORT)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SortKey::default_for(&query));
    FilterState {
        year_range: YearRange {
            start: decode_year(params, KEY_YEAR_START, span.start),
            end: decode_year(params, KEY_YEAR_END, span.end),
        },
        scope: params.get(KEY_SCOPE).and_then(|s| s.parse().ok()).unwrap_or_default(),
        sort,
        selected_genres: decode_set(params, KEY_GENRE),
        selected_types: decode_set(params, KEY_TYPE),
        selected_tags: decode_set(params, KEY_TAGS),
        selected_author: decode_scalar(params, KEY_AUTHOR),
        selected_work_id: decode_scalar(params, KEY_WORK),
        selected_status: params.get(KEY_STATUS).and_then(|s| s.parse().ok()),
        selected_collection_id: decode_scalar(params, KEY_COLLECTION),
        page: params
            .get(KEY_PAGE)
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1),
        query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_bound_garbage_falls_back_to_default() {
        let mut p = ShareableParams::new();
        p.insert(KEY_YEAR_START, "16x0");
        assert_eq!(decode_year(&p, KEY_YEAR_START, Some(1600)), Some(1600));
        p.insert(KEY_YEAR_START, "");
        assert_eq!(decode_year(&p, KEY_YEAR_START, Some(1600)), None);
    }

    #[test]
    fn set_decoding_drops_empty_members() {
        let mut p = ShareableParams::new();
        p.insert(KEY_GENRE, ",oratio,, disputatio ,");
        let set = decode_set(&p, KEY_GENRE);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["disputatio", "oratio"]);
    }
}

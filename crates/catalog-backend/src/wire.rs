//! Payload shapes of the hosted index and the preload API.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use catalog_core::types::{
    Collection, Dimension, EntityRef, Hit, Language, LocalizedLabel, RawFacet, SearchResponse, Vocabulary,
};

/// Facet field carrying the parent work of each page.
pub const WORK_FIELD: &str = "work_id";

/// One `filter` entry: a single expression, or an OR group.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilterClause {
    All(String),
    Any(Vec<String>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub q: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FilterClause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_search_on: Option<Vec<String>>,
    pub attributes_to_crop: Vec<String>,
    pub crop_length: u32,
    pub highlight_pre_tag: String,
    pub highlight_post_tag: String,
}

/// Ids arrive as strings or integers depending on the index.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(i64),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireId::Text(s) => f.write_str(s),
            WireId::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireEntity {
    pub id: WireId,
    #[serde(flatten)]
    pub labels: LocalizedLabel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireFormatted {
    #[serde(default)]
    pub page_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireHit {
    pub id: WireId,
    pub work_id: WireId,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub work_hit_count: Option<u64>,
    #[serde(default)]
    pub genre_object: Vec<WireEntity>,
    #[serde(default)]
    pub type_object: Vec<WireEntity>,
    #[serde(default)]
    pub tags_object: Vec<WireEntity>,
    #[serde(default)]
    pub page_text: Option<String>,
    #[serde(default, rename = "_formatted")]
    pub formatted: Option<WireFormatted>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReply {
    #[serde(default)]
    pub hits: Vec<WireHit>,
    #[serde(default)]
    pub facet_distribution: IndexMap<String, IndexMap<String, u64>>,
    #[serde(default)]
    pub total_hits: Option<u64>,
    #[serde(default)]
    pub estimated_total_hits: Option<u64>,
    #[serde(default)]
    pub total_works: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

fn entities(list: Vec<WireEntity>) -> Vec<EntityRef> {
    list.into_iter().map(|e| EntityRef { code: e.id.to_string(), labels: e.labels }).collect()
}

impl WireHit {
    /// `work_counts` is the `work_id` facet distribution, used when the hit
    /// carries no count of its own.
    pub fn into_hit(self, rank: usize, work_counts: Option<&IndexMap<String, u64>>) -> Hit {
        let work_id = self.work_id.to_string();
        let hit_count_for_work = self
            .work_hit_count
            .or_else(|| work_counts.and_then(|m| m.get(&work_id)).copied())
            .unwrap_or(1);
        let snippet = self
            .formatted
            .and_then(|f| f.page_text)
            .or(self.page_text)
            .unwrap_or_default();
        Hit {
            id: self.id.to_string(),
            work_id,
            page_number: self.page_number.unwrap_or_default(),
            rank,
            title: self.title.unwrap_or_default(),
            author: self.author.filter(|a| !a.trim().is_empty()),
            year: self.year,
            snippet,
            hit_count_for_work,
            genres: entities(self.genre_object),
            types: entities(self.type_object),
            tags: entities(self.tags_object),
        }
    }
}

impl SearchReply {
    /// Picks `<dimension>_<lang>` when the distribution has it, else the plain
    /// field flagged as not localized.
    pub fn raw_facets(&self, language: Language) -> IndexMap<Dimension, RawFacet> {
        let mut out = IndexMap::new();
        for dimension in Dimension::ALL {
            let localized = dimension
                .is_localized()
                .then(|| self.facet_distribution.get(&dimension.localized_field(language)))
                .flatten();
            let facet = match localized {
                Some(values) => RawFacet { values: values.clone(), localized: true },
                None => match self.facet_distribution.get(dimension.field()) {
                    Some(values) => RawFacet { values: values.clone(), localized: false },
                    None => continue,
                },
            };
            out.insert(dimension, facet);
        }
        out
    }

    pub fn into_response(self, language: Language, requested_page: u32, hits_per_page: u32) -> SearchResponse {
        let raw_facets = self.raw_facets(language);
        let work_counts = self.facet_distribution.get(WORK_FIELD);
        let page = self.page.unwrap_or(requested_page).max(1);
        let offset = (page as usize - 1) * hits_per_page as usize;

        let hits: Vec<Hit> = self
            .hits
            .into_iter()
            .enumerate()
            .map(|(i, h)| h.into_hit(offset + i, work_counts))
            .collect();

        let total_hits = self.total_hits.or(self.estimated_total_hits).unwrap_or(hits.len() as u64);
        let total_works = self
            .total_works
            .or_else(|| work_counts.map(|m| m.len() as u64))
            .unwrap_or_else(|| hits.iter().map(|h| h.work_id.as_str()).collect::<HashSet<_>>().len() as u64);
        let total_pages = self
            .total_pages
            .unwrap_or_else(|| total_hits.div_ceil(u64::from(hits_per_page.max(1))) as u32);

        SearchResponse { hits, raw_facets, total_hits, total_works, page, total_pages }
    }
}

/// Vocabulary as served: dimensions the client does not know are skipped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct VocabularyReply(pub IndexMap<String, IndexMap<String, LocalizedLabel>>);

impl VocabularyReply {
    pub fn into_vocabulary(self) -> Vocabulary {
        let mut entries = IndexMap::new();
        for (key, codes) in self.0 {
            if let Some(dimension) = Dimension::ALL.into_iter().find(|d| d.field() == key) {
                entries.insert(dimension, codes);
            }
        }
        Vocabulary { entries }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCollection {
    pub id: WireId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<WireId>,
}

impl From<WireCollection> for Collection {
    fn from(c: WireCollection) -> Self {
        Collection { id: c.id.to_string(), name: c.name, parent_id: c.parent_id.map(|p| p.to_string()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localized_field_falls_back_to_plain_field() {
        let reply: SearchReply = serde_json::from_str(
            r#"{"hits":[],"facetDistribution":{"genre_en":{"Speech":2},"type":{"print":4},"author":{"A":1}}}"#,
        )
        .unwrap();
        let facets = reply.raw_facets(Language::En);
        assert!(facets[&Dimension::Genre].localized);
        assert!(!facets[&Dimension::Type].localized);
        assert!(!facets[&Dimension::Author].localized);
        assert!(!facets.contains_key(&Dimension::Tags));
    }

    #[test]
    fn numeric_ids_become_strings() {
        let hit: WireHit = serde_json::from_str(r#"{"id":12,"work_id":"w","genre_object":[{"id":7,"et":"Kõne"}]}"#).unwrap();
        let hit = hit.into_hit(0, None);
        assert_eq!(hit.id, "12");
        assert_eq!(hit.genres[0].code, "7");
        assert_eq!(hit.hit_count_for_work, 1);
    }
}

use async_trait::async_trait;

use crate::filter::{FilterState, YearRange};
use crate::types::{Collection, Hit, Language, Scope, SearchResponse, SortKey, Vocabulary};

/// Everything the backend needs for one primary search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub filter: FilterState,
    pub language: Language,
    /// The selected collection and its descendants; empty when no collection is
    /// selected.
    pub collection_ids: Vec<String>,
    pub hits_per_page: u32,
}

/// A secondary fetch of additional hits inside one work, ranked the same way
/// as the primary query.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkHitsRequest {
    pub work_id: String,
    pub query: String,
    pub scope: Scope,
    pub year_range: YearRange,
    pub sort: SortKey,
    pub language: Language,
    pub limit: usize,
}

impl WorkHitsRequest {
    pub fn for_work(filter: &FilterState, language: Language, work_id: &str, limit: usize) -> Self {
        Self {
            work_id: work_id.to_string(),
            query: filter.query.clone(),
            scope: filter.scope,
            year_range: filter.year_range,
            sort: filter.sort,
            language,
            limit,
        }
    }
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> crate::Result<SearchResponse>;
    async fn work_hits(&self, request: &WorkHitsRequest) -> crate::Result<Vec<Hit>>;
    async fn vocabulary(&self) -> crate::Result<Vocabulary>;
    async fn collections(&self) -> crate::Result<Vec<Collection>>;
}

//! Translation of filter intent into search bodies.

use catalog_core::traits::{SearchRequest, WorkHitsRequest};
use catalog_core::types::{Dimension, Language, Scope, SortKey};
use catalog_core::{FilterState, YearRange};

use crate::wire::{FilterClause, SearchBody, WORK_FIELD};

pub const YEAR_FIELD: &str = "year";
pub const STATUS_FIELD: &str = "status";
pub const COLLECTION_FIELD: &str = "collection_id";
pub const TEXT_FIELD: &str = "page_text";
pub const ANNOTATION_FIELD: &str = "annotations";

const CROP_LENGTH: u32 = 30;
const HIGHLIGHT_PRE: &str = "<em>";
const HIGHLIGHT_POST: &str = "</em>";

/// Double-quoted filter literal.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn equals(field: &str, value: &str) -> String {
    format!("{field} = {}", quote(value))
}

pub fn sort_expression(sort: SortKey) -> Vec<String> {
    let expr = match sort {
        SortKey::Relevance => return Vec::new(),
        SortKey::YearAsc => "year:asc",
        SortKey::YearDesc => "year:desc",
        SortKey::Alphabetical => "title:asc",
        SortKey::RecentlyModified => "last_modified:desc",
    };
    vec![expr.to_string()]
}

/// `None` searches the engine's default attributes.
pub fn search_attributes(scope: Scope) -> Option<Vec<String>> {
    match scope {
        Scope::All => None,
        Scope::Original => Some(vec![TEXT_FIELD.to_string()]),
        Scope::Annotation => Some(vec![ANNOTATION_FIELD.to_string()]),
    }
}

/// Localized and plain field of every dimension, plus the work field used for
/// per-work counts.
pub fn facet_fields(language: Language) -> Vec<String> {
    let mut fields = Vec::new();
    for dimension in Dimension::ALL {
        if dimension.is_localized() {
            fields.push(dimension.localized_field(language));
        }
        fields.push(dimension.field().to_string());
    }
    fields.push(WORK_FIELD.to_string());
    fields
}

fn year_clauses(range: YearRange, out: &mut Vec<FilterClause>) {
    if let Some(start) = range.start {
        out.push(FilterClause::All(format!("{YEAR_FIELD} >= {start}")));
    }
    if let Some(end) = range.end {
        out.push(FilterClause::All(format!("{YEAR_FIELD} <= {end}")));
    }
}

/// A selected value matches its code field or a label field in any language,
/// so values that never resolved to a code still filter.
fn selection_group(dimension: Dimension, values: impl IntoIterator<Item = String>) -> Option<FilterClause> {
    let mut group = Vec::new();
    for value in values {
        group.push(equals(dimension.field(), &value));
        if dimension.is_localized() {
            for language in Language::ALL {
                group.push(equals(&dimension.localized_field(language), &value));
            }
        }
    }
    (!group.is_empty()).then_some(FilterClause::Any(group))
}

/// Clauses are ANDed; the values of one dimension form an OR group.
pub fn filter_clauses(filter: &FilterState, collection_ids: &[String]) -> Vec<FilterClause> {
    let mut out = Vec::new();
    year_clauses(filter.year_range, &mut out);
    for dimension in [Dimension::Genre, Dimension::Type, Dimension::Tags] {
        out.extend(selection_group(dimension, filter.selected(dimension)));
    }
    if let Some(author) = &filter.selected_author {
        out.push(FilterClause::All(equals(Dimension::Author.field(), author)));
    }
    if let Some(work) = &filter.selected_work_id {
        out.push(FilterClause::All(equals(WORK_FIELD, work)));
    }
    if let Some(status) = filter.selected_status {
        out.push(FilterClause::All(equals(STATUS_FIELD, status.as_str())));
    }
    if !collection_ids.is_empty() {
        let ids: Vec<String> = collection_ids.iter().map(|id| quote(id)).collect();
        out.push(FilterClause::All(format!("{COLLECTION_FIELD} IN [{}]", ids.join(", "))));
    }
    out
}

fn body(query: &str, scope: Scope, sort: SortKey) -> SearchBody {
    SearchBody {
        q: query.trim().to_string(),
        filter: Vec::new(),
        facets: Vec::new(),
        sort: sort_expression(sort),
        page: None,
        hits_per_page: None,
        limit: None,
        distinct: None,
        attributes_to_search_on: search_attributes(scope),
        attributes_to_crop: vec![format!("{TEXT_FIELD}:{CROP_LENGTH}")],
        crop_length: CROP_LENGTH,
        highlight_pre_tag: HIGHLIGHT_PRE.to_string(),
        highlight_post_tag: HIGHLIGHT_POST.to_string(),
    }
}

/// Primary search: one hit per work on the requested page.
pub fn search_body(request: &SearchRequest) -> SearchBody {
    let filter = &request.filter;
    SearchBody {
        filter: filter_clauses(filter, &request.collection_ids),
        facets: facet_fields(request.language),
        page: Some(filter.page.max(1)),
        hits_per_page: Some(request.hits_per_page),
        distinct: Some(WORK_FIELD.to_string()),
        ..body(&filter.query, filter.scope, filter.sort)
    }
}

/// Hits of one work, ranked like the primary query.
pub fn work_hits_body(request: &WorkHitsRequest) -> SearchBody {
    let mut filter = Vec::new();
    year_clauses(request.year_range, &mut filter);
    filter.push(FilterClause::All(equals(WORK_FIELD, &request.work_id)));
    SearchBody { filter, limit: Some(request.limit), ..body(&request.query, request.scope, request.sort) }
}

//! Domain types shared by the codec, the facet engine, the result views and
//! the backend adapters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display language. Facet fields are requested per language and labels are
/// resolved into it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Et,
    En,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Et, Language::En];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Et => "et",
            Language::En => "en",
        }
    }

    /// The other supported language.
    pub fn other(self) -> Language {
        match self {
            Language::Et => Language::En,
            Language::En => Language::Et,
        }
    }
}

impl FromStr for Language {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "et" => Ok(Language::Et),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language '{other}'")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of a page the free-text query searches.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    All,
    Original,
    Annotation,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::Original => "original",
            Scope::Annotation => "annotation",
        }
    }
}

impl FromStr for Scope {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Scope::All),
            "original" => Ok(Scope::Original),
            "annotation" => Ok(Scope::Annotation),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Relevance,
    YearAsc,
    YearDesc,
    Alphabetical,
    RecentlyModified,
}

impl SortKey {
    /// Relevance ranking only makes sense when there is text to rank by.
    pub fn default_for(query: &str) -> SortKey {
        if query.trim().is_empty() {
            SortKey::YearAsc
        } else {
            SortKey::Relevance
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Relevance => "relevance",
            SortKey::YearAsc => "year_asc",
            SortKey::YearDesc => "year_desc",
            SortKey::Alphabetical => "alphabetical",
            SortKey::RecentlyModified => "recently_modified",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SortKey::Relevance),
            "year_asc" => Ok(SortKey::YearAsc),
            "year_desc" => Ok(SortKey::YearDesc),
            "alphabetical" => Ok(SortKey::Alphabetical),
            "recently_modified" => Ok(SortKey::RecentlyModified),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

/// Transcription workflow status of a work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Raw,
    InProgress,
    Done,
}

impl WorkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkStatus::Raw => "raw",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Done => "done",
        }
    }
}

impl FromStr for WorkStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(WorkStatus::Raw),
            "in_progress" => Ok(WorkStatus::InProgress),
            "done" => Ok(WorkStatus::Done),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// A filterable facet dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Genre,
    Type,
    Tags,
    Author,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [Dimension::Genre, Dimension::Type, Dimension::Tags, Dimension::Author];

    /// Unlocalized backend field name.
    pub fn field(self) -> &'static str {
        match self {
            Dimension::Genre => "genre",
            Dimension::Type => "type",
            Dimension::Tags => "tags",
            Dimension::Author => "author",
        }
    }

    /// Whether the backend carries per-language variants (`genre_et`, ...).
    pub fn is_localized(self) -> bool {
        !matches!(self, Dimension::Author)
    }

    /// `<dimension>_<lang>` for localized dimensions, the plain field otherwise.
    pub fn localized_field(self, language: Language) -> String {
        if self.is_localized() {
            format!("{}_{}", self.field(), language.as_str())
        } else {
            self.field().to_string()
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Labels of one vocabulary entry or entity object, per language.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalizedLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub et: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

impl LocalizedLabel {
    pub fn new(et: impl Into<String>, en: impl Into<String>) -> Self {
        Self { et: Some(et.into()), en: Some(en.into()) }
    }

    pub fn get(&self, language: Language) -> Option<&str> {
        match language {
            Language::Et => self.et.as_deref(),
            Language::En => self.en.as_deref(),
        }
        .filter(|s| !s.is_empty())
    }
}

/// An entity object attached to a hit (e.g. a genre with a knowledge-base
/// identifier and its labels).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub code: String,
    #[serde(default)]
    pub labels: LocalizedLabel,
}

/// One page-level search hit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Hit {
    pub id: String,
    pub work_id: String,
    pub page_number: u32,
    /// Zero-based position in the response that produced the hit.
    pub rank: usize,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<i32>,
    /// Formatted excerpt with highlight markers.
    pub snippet: String,
    /// Total hits for the parent work, independent of how many were delivered.
    pub hit_count_for_work: u64,
    pub genres: Vec<EntityRef>,
    pub types: Vec<EntityRef>,
    pub tags: Vec<EntityRef>,
}

impl Hit {
    pub fn entities(&self, dimension: Dimension) -> &[EntityRef] {
        match dimension {
            Dimension::Genre => &self.genres,
            Dimension::Type => &self.types,
            Dimension::Tags => &self.tags,
            Dimension::Author => &[],
        }
    }
}

/// Raw facet distribution for one dimension, in backend order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawFacet {
    pub values: IndexMap<String, u64>,
    /// True when the values come from the `<dimension>_<lang>` field, i.e. they
    /// already are labels in the requested language.
    pub localized: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
    pub raw_facets: IndexMap<Dimension, RawFacet>,
    pub total_hits: u64,
    pub total_works: u64,
    pub page: u32,
    pub total_pages: u32,
}

/// One option of a facet list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetOption {
    pub code: String,
    pub label: String,
    pub count: u64,
}

impl FacetOption {
    pub fn new(code: impl Into<String>, label: impl Into<String>, count: u64) -> Self {
        Self { code: code.into(), label: label.into(), count }
    }
}

/// A curated collection; collections form a tree via `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Ids of `root` and every collection below it, `root` first. An unknown root
/// still yields itself so the filter stays effective.
pub fn collection_subtree(collections: &[Collection], root: &str) -> Vec<String> {
    let mut out = vec![root.to_string()];
    let mut cursor = 0;
    while cursor < out.len() {
        let parent = out[cursor].clone();
        for c in collections {
            if c.parent_id.as_deref() == Some(parent.as_str()) && !out.contains(&c.id) {
                out.push(c.id.clone());
            }
        }
        cursor += 1;
    }
    out
}

/// Static vocabulary table: dimension -> raw code -> labels. Loaded once per
/// session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Vocabulary {
    pub entries: IndexMap<Dimension, IndexMap<String, LocalizedLabel>>,
}

impl Vocabulary {
    pub fn get(&self, dimension: Dimension, code: &str) -> Option<&LocalizedLabel> {
        self.entries.get(&dimension).and_then(|m| m.get(code))
    }

    pub fn dimension(&self, dimension: Dimension) -> impl Iterator<Item = (&String, &LocalizedLabel)> {
        self.entries.get(&dimension).into_iter().flat_map(|m| m.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(IndexMap::is_empty)
    }
}

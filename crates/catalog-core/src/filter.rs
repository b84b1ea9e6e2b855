//! The filter state model: the single writable record of search intent.
//!
//! Every setter reports whether it changed anything. All setters except
//! [`FilterState::set_page`] and [`FilterState::set_sort`] send the page back
//! to 1 when they change a value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{Dimension, Scope, SortKey, WorkStatus};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct YearRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start: Some(start), end: Some(end) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterState {
    pub query: String,
    pub year_range: YearRange,
    pub scope: Scope,
    pub sort: SortKey,
    pub selected_genres: BTreeSet<String>,
    pub selected_types: BTreeSet<String>,
    pub selected_tags: BTreeSet<String>,
    pub selected_author: Option<String>,
    pub selected_work_id: Option<String>,
    pub selected_status: Option<WorkStatus>,
    pub selected_collection_id: Option<String>,
    pub page: u32,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl FilterState {
    /// The state a fresh visit starts from: empty query over the configured span.
    pub fn new(span: YearRange) -> Self {
        Self {
            query: String::new(),
            year_range: span,
            scope: Scope::All,
            sort: SortKey::default_for(""),
            selected_genres: BTreeSet::new(),
            selected_types: BTreeSet::new(),
            selected_tags: BTreeSet::new(),
            selected_author: None,
            selected_work_id: None,
            selected_status: None,
            selected_collection_id: None,
            page: 1,
        }
    }

    fn changed(&mut self, changed: bool) -> bool {
        if changed {
            self.page = 1;
        }
        changed
    }

    /// Sets the free text. The sort follows the query only while it still sits on
    /// the default for the previous query, so an explicit choice survives typing.
    pub fn set_query(&mut self, query: impl Into<String>) -> bool {
        let query = query.into();
        if self.query == query {
            return false;
        }
        if self.sort == SortKey::default_for(&self.query) {
            self.sort = SortKey::default_for(&query);
        }
        self.query = query;
        self.changed(true)
    }

    pub fn set_year_start(&mut self, start: Option<i32>) -> bool {
        let changed = self.year_range.start != start;
        self.year_range.start = start;
        self.changed(changed)
    }

    pub fn set_year_end(&mut self, end: Option<i32>) -> bool {
        let changed = self.year_range.end != end;
        self.year_range.end = end;
        self.changed(changed)
    }

    pub fn set_scope(&mut self, scope: Scope) -> bool {
        let changed = self.scope != scope;
        self.scope = scope;
        self.changed(changed)
    }

    /// Sorting keeps the current page.
    pub fn set_sort(&mut self, sort: SortKey) -> bool {
        let changed = self.sort != sort;
        self.sort = sort;
        changed
    }

    /// Pages are 1-based; 0 is treated as 1.
    pub fn set_page(&mut self, page: u32) -> bool {
        let page = page.max(1);
        let changed = self.page != page;
        self.page = page;
        changed
    }

    /// Adds `code` to a multi-valued dimension or removes it if present. For
    /// [`Dimension::Author`] this selects or clears the single author.
    pub fn toggle(&mut self, dimension: Dimension, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() {
            return false;
        }
        if dimension == Dimension::Author {
            let next = if self.selected_author.as_deref() == Some(code) { None } else { Some(code.to_string()) };
            return self.set_author(next);
        }
        // Commas separate members in the shareable form.
        if code.contains(',') {
            return false;
        }
        let Some(set) = self.selection_mut(dimension) else {
            return false;
        };
        if !set.remove(code) {
            set.insert(code.to_string());
        }
        self.changed(true)
    }

    pub fn set_author(&mut self, author: Option<String>) -> bool {
        let author = non_empty(author);
        let changed = self.selected_author != author;
        self.selected_author = author;
        self.changed(changed)
    }

    pub fn set_work(&mut self, work_id: Option<String>) -> bool {
        let work_id = non_empty(work_id);
        let changed = self.selected_work_id != work_id;
        self.selected_work_id = work_id;
        self.changed(changed)
    }

    pub fn set_status(&mut self, status: Option<WorkStatus>) -> bool {
        let changed = self.selected_status != status;
        self.selected_status = status;
        self.changed(changed)
    }

    pub fn set_collection(&mut self, collection_id: Option<String>) -> bool {
        let collection_id = non_empty(collection_id);
        let changed = self.selected_collection_id != collection_id;
        self.selected_collection_id = collection_id;
        self.changed(changed)
    }

    /// Swaps a selected value for its canonical code. This re-encodes the same
    /// intent, so the page is left alone.
    pub fn replace_selection(&mut self, dimension: Dimension, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        if dimension == Dimension::Author {
            if self.selected_author.as_deref() == Some(from) {
                self.selected_author = Some(to.to_string());
                return true;
            }
            return false;
        }
        let Some(set) = self.selection_mut(dimension) else {
            return false;
        };
        if !set.remove(from) {
            return false;
        }
        set.insert(to.to_string());
        true
    }

    /// Currently selected codes of a dimension.
    pub fn selected(&self, dimension: Dimension) -> BTreeSet<String> {
        match dimension {
            Dimension::Genre => self.selected_genres.clone(),
            Dimension::Type => self.selected_types.clone(),
            Dimension::Tags => self.selected_tags.clone(),
            Dimension::Author => self.selected_author.iter().cloned().collect(),
        }
    }

    fn selection_mut(&mut self, dimension: Dimension) -> Option<&mut BTreeSet<String>> {
        match dimension {
            Dimension::Genre => Some(&mut self.selected_genres),
            Dimension::Type => Some(&mut self.selected_types),
            Dimension::Tags => Some(&mut self.selected_tags),
            Dimension::Author => None,
        }
    }

    /// True when any filter besides the query text narrows the result set.
    pub fn has_filters(&self, span: YearRange) -> bool {
        self.year_range != span
            || self.scope != Scope::All
            || !self.selected_genres.is_empty()
            || !self.selected_types.is_empty()
            || !self.selected_tags.is_empty()
            || self.selected_author.is_some()
            || self.selected_work_id.is_some()
            || self.selected_status.is_some()
            || self.selected_collection_id.is_some()
    }
}

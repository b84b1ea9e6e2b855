use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use tracing::debug;

use catalog_core::types::{Dimension, FacetOption, Language, SearchResponse, Vocabulary};
use catalog_core::FilterState;

use crate::merge::merge_with_memory;
use crate::resolution::ResolutionEntry;

/// A selected value that must be rewritten to its canonical code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionFix {
    pub dimension: Dimension,
    pub from: String,
    pub to: String,
}

/// The displayed option lists of every dimension, remembered across responses.
#[derive(Debug, Default)]
pub struct FacetPanel {
    lists: IndexMap<Dimension, Vec<FacetOption>>,
    entries: HashMap<Dimension, ResolutionEntry>,
}

impl FacetPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves and merges the facets of a freshly applied response. Returns the
    /// selections that need re-encoding; the lists already reflect the fixed
    /// selection.
    pub fn apply(
        &mut self,
        response: &SearchResponse,
        vocabulary: &Vocabulary,
        language: Language,
        filter: &FilterState,
    ) -> Vec<SelectionFix> {
        let mut fixes = Vec::new();
        for dimension in Dimension::ALL {
            let raw = response.raw_facets.get(&dimension);
            let entry = ResolutionEntry::build(dimension, raw, &response.hits, vocabulary, language);
            let fresh = raw.map(|r| entry.options(r)).unwrap_or_default();

            let mut selected = filter.selected(dimension);
            for (from, to) in entry.canonicalize(&selected, &fresh) {
                debug!(%dimension, %from, %to, "re-encoding selected facet value");
                fixes.push(SelectionFix { dimension, from, to });
            }
            for fix in fixes.iter().filter(|f| f.dimension == dimension) {
                selected.remove(&fix.from);
                selected.insert(fix.to.clone());
            }

            let existing = self.lists.get(&dimension).map(Vec::as_slice).unwrap_or_default();
            let merged = merge_with_memory(existing, &fresh, &selected, |code| entry.resolve(code));
            self.lists.insert(dimension, merged);
            self.entries.insert(dimension, entry);
        }
        fixes
    }

    pub fn options(&self, dimension: Dimension) -> &[FacetOption] {
        self.lists.get(&dimension).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn entry(&self, dimension: Dimension) -> Option<&ResolutionEntry> {
        self.entries.get(&dimension)
    }

    /// Display label for a code, resolved against the latest response.
    pub fn label_for(&self, dimension: Dimension, code: &str) -> String {
        if let Some(option) = self.options(dimension).iter().find(|o| o.code == code) {
            return option.label.clone();
        }
        self.entries
            .get(&dimension)
            .map(|e| e.resolve(code))
            .unwrap_or_else(|| code.to_string())
    }

    /// Selected options of a dimension, in display order.
    pub fn selected_options(&self, dimension: Dimension, selected: &BTreeSet<String>) -> Vec<&FacetOption> {
        self.options(dimension).iter().filter(|o| selected.contains(&o.code)).collect()
    }

    /// Forgets remembered options, e.g. after a full filter reset.
    pub fn clear(&mut self) {
        self.lists.clear();
        self.entries.clear();
    }
}

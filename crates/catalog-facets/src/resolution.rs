//! Facet label resolution.
//!
//! Facet sources label the same logical option differently: an entity code, a
//! same-language string, or the other language's label. A [`ResolutionEntry`]
//! is built fresh from one response and maps any of those forms to the display
//! label in the current language, and display labels back to canonical codes.
//!
//! Resolution order for a raw value `v` in language `L`:
//! 1. `v` is a label of the response's `L` facet list: used as is.
//! 2. `v`, or the code behind `v`, has an `L` label on an entity object of one
//!    of the response's hits.
//! 3. The vocabulary has an `L` label for the code, else its `et` label.
//! 4. `v` verbatim.

use std::collections::{HashMap, HashSet};

use catalog_core::types::{Dimension, FacetOption, Hit, Language, LocalizedLabel, RawFacet, Vocabulary};

use crate::normalize::normalize_label;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub dimension: Dimension,
    pub language: Language,
    /// Raw value or code -> display label.
    pub id_to_label: HashMap<String, String>,
    /// Per alternate language: that language's label -> display label.
    pub alt_label_to_label: HashMap<Language, HashMap<String, String>>,
    /// Display label -> canonical code. Current-language labels win.
    pub label_to_code: HashMap<String, String>,

    preferred: HashSet<String>,
    entity_labels: HashMap<String, String>,
    entity_codes_by_label: HashMap<String, String>,
    vocabulary_labels: HashMap<String, String>,
    vocabulary_codes_by_label: HashMap<String, String>,
    localized: bool,
}

fn label_in(labels: &LocalizedLabel, language: Language) -> Option<String> {
    labels.get(language).map(normalize_label)
}

impl ResolutionEntry {
    /// Builds the maps for one dimension from the current response. Pure: the
    /// inputs are only read.
    pub fn build(
        dimension: Dimension,
        raw: Option<&RawFacet>,
        hits: &[Hit],
        vocabulary: &Vocabulary,
        language: Language,
    ) -> Self {
        let mut entry = Self {
            dimension,
            language,
            id_to_label: HashMap::new(),
            alt_label_to_label: HashMap::new(),
            label_to_code: HashMap::new(),
            preferred: HashSet::new(),
            entity_labels: HashMap::new(),
            entity_codes_by_label: HashMap::new(),
            vocabulary_labels: HashMap::new(),
            vocabulary_codes_by_label: HashMap::new(),
            localized: dimension.is_localized(),
        };
        if !entry.localized {
            if let Some(raw) = raw {
                for value in raw.values.keys() {
                    entry.id_to_label.insert(value.clone(), value.clone());
                    entry.label_to_code.entry(value.clone()).or_insert_with(|| value.clone());
                }
            }
            return entry;
        }

        if let Some(raw) = raw.filter(|r| r.localized) {
            entry.preferred = raw.values.keys().map(|v| normalize_label(v)).collect();
        }

        // Entity objects seen on this response's hits.
        for hit in hits {
            for entity in hit.entities(dimension) {
                let code = entity.code.trim();
                if code.is_empty() {
                    continue;
                }
                if let Some(label) = label_in(&entity.labels, language) {
                    entry.entity_labels.entry(code.to_string()).or_insert(label);
                }
                for lang in Language::ALL {
                    if let Some(label) = label_in(&entity.labels, lang) {
                        entry.entity_codes_by_label.entry(label).or_insert_with(|| code.to_string());
                    }
                }
            }
        }

        for (code, labels) in vocabulary.dimension(dimension) {
            let display = label_in(labels, language).or_else(|| label_in(labels, Language::Et));
            if let Some(display) = display {
                entry.vocabulary_labels.insert(code.clone(), display);
            }
            for lang in Language::ALL {
                if let Some(label) = label_in(labels, lang) {
                    entry.vocabulary_codes_by_label.entry(label).or_insert_with(|| code.clone());
                }
            }
        }

        entry.build_maps(raw, hits, vocabulary);
        entry
    }

    fn build_maps(&mut self, raw: Option<&RawFacet>, hits: &[Hit], vocabulary: &Vocabulary) {
        let dimension = self.dimension;
        let language = self.language;
        let alternate = language.other();

        // Inverse map: current-language labels first so they win ties.
        let mut codes: Vec<String> = self.entity_labels.keys().cloned().collect();
        codes.sort();
        for code in &codes {
            if let Some(label) = self.entity_labels.get(code) {
                self.label_to_code.entry(label.clone()).or_insert_with(|| code.clone());
            }
        }
        for (code, labels) in vocabulary.dimension(dimension) {
            if let Some(label) = label_in(labels, language) {
                self.label_to_code.entry(label).or_insert_with(|| code.clone());
            }
        }
        let mut other_labels: Vec<(&String, &String)> = self.entity_codes_by_label.iter().collect();
        other_labels.sort();
        for (label, code) in other_labels {
            self.label_to_code.entry(label.clone()).or_insert_with(|| code.clone());
        }
        for (code, labels) in vocabulary.dimension(dimension) {
            if let Some(label) = label_in(labels, Language::Et) {
                self.label_to_code.entry(label).or_insert_with(|| code.clone());
            }
        }

        let mut alt = HashMap::new();
        for hit in hits {
            for entity in hit.entities(dimension) {
                if let Some(other) = label_in(&entity.labels, alternate) {
                    let resolved = self.resolve(&entity.code);
                    alt.entry(other).or_insert(resolved);
                }
            }
        }
        for (code, labels) in vocabulary.dimension(dimension) {
            if let Some(other) = label_in(labels, alternate) {
                let resolved = self.resolve(code);
                alt.entry(other).or_insert(resolved);
            }
        }
        self.alt_label_to_label.insert(alternate, alt);

        let mut forward: Vec<String> = Vec::new();
        if let Some(raw) = raw {
            forward.extend(raw.values.keys().cloned());
        }
        forward.extend(codes);
        forward.extend(vocabulary.dimension(dimension).map(|(code, _)| code.clone()));
        for value in forward {
            let label = self.resolve(&value);
            self.id_to_label.entry(value).or_insert(label);
        }
    }

    fn code_behind(&self, normalized: &str, raw: &str) -> Option<String> {
        if self.entity_labels.contains_key(raw) || self.vocabulary_labels.contains_key(raw) {
            return Some(raw.to_string());
        }
        self.entity_codes_by_label
            .get(normalized)
            .or_else(|| self.vocabulary_codes_by_label.get(normalized))
            .cloned()
    }

    /// Display label for a raw facet value, code, or label in either language.
    /// Resolving a label this entry produced returns it unchanged.
    pub fn resolve(&self, value: &str) -> String {
        if !self.localized {
            return value.to_string();
        }
        let normalized = normalize_label(value);
        if self.preferred.contains(&normalized) {
            return normalized;
        }
        if let Some(code) = self.code_behind(&normalized, value) {
            if let Some(label) = self.entity_labels.get(&code) {
                return label.clone();
            }
            if let Some(label) = self.vocabulary_labels.get(&code) {
                return label.clone();
            }
        }
        value.to_string()
    }

    /// Canonical code persisted in the shareable representation.
    pub fn code_for(&self, value: &str) -> String {
        if !self.localized {
            return value.to_string();
        }
        if self.entity_labels.contains_key(value) || self.vocabulary_labels.contains_key(value) {
            return value.to_string();
        }
        let label = self.resolve(value);
        if let Some(code) = self.label_to_code.get(&label) {
            return code.clone();
        }
        let normalized = normalize_label(value);
        self.code_behind(&normalized, value).unwrap_or_else(|| value.to_string())
    }

    /// Resolves a raw distribution into an option list, unique by code. Values
    /// that resolve to the same label or the same code are merged: counts are
    /// summed and the first-seen code and label are kept. Order follows first
    /// appearance.
    pub fn options(&self, raw: &RawFacet) -> Vec<FacetOption> {
        let mut out: Vec<FacetOption> = Vec::with_capacity(raw.values.len());
        let mut by_label: HashMap<String, usize> = HashMap::new();
        let mut by_code: HashMap<String, usize> = HashMap::new();
        for (value, count) in &raw.values {
            let label = self.resolve(value);
            if let Some(&i) = by_label.get(&label) {
                out[i].count += count;
                continue;
            }
            let code = self.code_for(value);
            if let Some(&i) = by_code.get(&code) {
                out[i].count += count;
                by_label.insert(label, i);
                continue;
            }
            by_label.insert(label.clone(), out.len());
            by_code.insert(code.clone(), out.len());
            out.push(FacetOption { code, label, count: *count });
        }
        out
    }

    /// Re-resolves selected values that do not match any option code. Returns
    /// `(from, to)` pairs for values whose canonical code differs; applying the
    /// result and calling again yields nothing.
    pub fn canonicalize<'a, I>(&self, selected: I, options: &[FacetOption]) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut fixes = Vec::new();
        for value in selected {
            if options.iter().any(|o| &o.code == value) {
                continue;
            }
            let label = self.resolve(value);
            let to = options
                .iter()
                .find(|o| o.label == label)
                .map(|o| o.code.clone())
                .unwrap_or_else(|| self.code_for(value));
            if &to != value {
                fixes.push((value.clone(), to));
            }
        }
        fixes
    }
}

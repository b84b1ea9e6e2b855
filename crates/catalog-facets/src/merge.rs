use std::collections::{BTreeSet, HashMap};

use catalog_core::types::FacetOption;

/// Folds a fresh distribution into the previously shown option list so that
/// options never vanish while the user narrows a search.
///
/// 1. Every existing option is kept, with its fresh count or 0.
/// 2. Fresh options not yet listed are appended.
/// 3. Selected codes still missing are appended with count 0.
/// 4. The list is sorted by descending count; ties keep construction order.
///
/// `label_for` supplies labels for existing and selected codes the fresh list
/// does not cover, so a language switch relabels remembered options too.
/// Applying the merge again with the same `fresh` returns the same list.
pub fn merge_with_memory<F>(
    existing: &[FacetOption],
    fresh: &[FacetOption],
    selected: &BTreeSet<String>,
    label_for: F,
) -> Vec<FacetOption>
where
    F: Fn(&str) -> String,
{
    let fresh_by_code: HashMap<&str, &FacetOption> = fresh.iter().map(|o| (o.code.as_str(), o)).collect();
    let mut merged: Vec<FacetOption> = Vec::with_capacity(existing.len() + fresh.len());

    for option in existing {
        if merged.iter().any(|o| o.code == option.code) {
            continue;
        }
        match fresh_by_code.get(option.code.as_str()) {
            Some(f) => merged.push((*f).clone()),
            None => merged.push(FacetOption::new(option.code.clone(), label_for(&option.code), 0)),
        }
    }
    for option in fresh {
        if !merged.iter().any(|o| o.code == option.code) {
            merged.push(option.clone());
        }
    }
    for code in selected {
        if !merged.iter().any(|o| &o.code == code) {
            merged.push(FacetOption::new(code.clone(), label_for(code), 0));
        }
    }

    // Vec::sort_by is stable.
    merged.sort_by(|a, b| b.count.cmp(&a.count));
    merged
}

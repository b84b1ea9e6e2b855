use std::collections::BTreeSet;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use catalog_core::types::{
    Dimension, EntityRef, FacetOption, Hit, Language, LocalizedLabel, RawFacet, SearchResponse, Vocabulary,
};
use catalog_core::{FilterState, YearRange};
use catalog_facets::{merge_with_memory, FacetPanel, ResolutionEntry, SelectionFix};

fn raw(values: &[(&str, u64)], localized: bool) -> RawFacet {
    RawFacet { values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(), localized }
}

fn vocabulary() -> Vocabulary {
    let mut genres = IndexMap::new();
    genres.insert("oratio".to_string(), LocalizedLabel::new("Kõne", "Speech"));
    genres.insert("disputatio".to_string(), LocalizedLabel::new("disputatsioon", "Disputation"));
    genres.insert("carmen".to_string(), LocalizedLabel { et: Some("Luuletus".into()), en: None });
    let mut entries = IndexMap::new();
    entries.insert(Dimension::Genre, genres);
    Vocabulary { entries }
}

fn hit_with_genre(code: &str, et: &str, en: &str) -> Hit {
    Hit {
        id: format!("p-{code}"),
        work_id: "w1".into(),
        genres: vec![EntityRef { code: code.into(), labels: LocalizedLabel::new(et, en) }],
        ..Hit::default()
    }
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn label_as_code(code: &str) -> String {
    code.to_string()
}

#[test]
fn merge_keeps_selected_option_that_dropped_to_zero() {
    let existing = vec![FacetOption::new("X", "X", 12), FacetOption::new("Y", "Y", 5)];
    let fresh = vec![FacetOption::new("Y", "Y", 3), FacetOption::new("Z", "Z", 1)];
    let merged = merge_with_memory(&existing, &fresh, &set(&["X"]), label_as_code);
    assert_eq!(
        merged,
        vec![FacetOption::new("Y", "Y", 3), FacetOption::new("Z", "Z", 1), FacetOption::new("X", "X", 0)]
    );
}

#[test]
fn merge_appends_unknown_selection_with_zero() {
    let merged = merge_with_memory(&[], &[FacetOption::new("a", "A", 2)], &set(&["q42"]), |c| format!("label:{c}"));
    assert_eq!(merged, vec![FacetOption::new("a", "A", 2), FacetOption::new("q42", "label:q42", 0)]);
}

#[test]
fn merge_is_idempotent_and_never_loses_selection() {
    let cases: Vec<(Vec<FacetOption>, Vec<FacetOption>, BTreeSet<String>)> = vec![
        (vec![], vec![], set(&["a"])),
        (
            vec![FacetOption::new("a", "A", 1), FacetOption::new("b", "B", 1)],
            vec![FacetOption::new("b", "B", 7), FacetOption::new("c", "C", 7)],
            set(&["a", "d"]),
        ),
        (
            vec![FacetOption::new("c", "C", 4)],
            vec![FacetOption::new("a", "A", 4), FacetOption::new("b", "B", 4)],
            set(&[]),
        ),
    ];
    for (existing, fresh, selected) in cases {
        let once = merge_with_memory(&existing, &fresh, &selected, label_as_code);
        let twice = merge_with_memory(&once, &fresh, &selected, label_as_code);
        assert_eq!(once, twice);
        for code in &selected {
            assert!(once.iter().any(|o| &o.code == code), "lost selected {code}");
        }
        let counts: Vec<u64> = once.iter().map(|o| o.count).collect();
        let mut sorted = counts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(counts, sorted);
    }
}

#[test]
fn merge_ties_keep_first_seen_order() {
    let existing = vec![FacetOption::new("b", "B", 1)];
    let fresh = vec![FacetOption::new("a", "A", 2), FacetOption::new("b", "B", 2), FacetOption::new("c", "C", 2)];
    let merged = merge_with_memory(&existing, &fresh, &set(&[]), label_as_code);
    let codes: Vec<&str> = merged.iter().map(|o| o.code.as_str()).collect();
    assert_eq!(codes, vec!["b", "a", "c"]);
}

#[test]
fn resolution_uses_preferred_list_first() {
    let facet = raw(&[("kõne", 4)], true);
    let entry = ResolutionEntry::build(Dimension::Genre, Some(&facet), &[], &vocabulary(), Language::Et);
    assert_eq!(entry.resolve("kõne"), "Kõne");
    assert_eq!(entry.code_for("kõne"), "oratio");
}

#[test]
fn resolution_falls_back_through_entities_vocabulary_and_verbatim() {
    let facet = raw(&[("oratio", 3), ("Q99", 2), ("carmen", 1), ("mystery", 1)], false);
    let hits = vec![hit_with_genre("Q99", "Jutlus", "Sermon")];
    let entry = ResolutionEntry::build(Dimension::Genre, Some(&facet), &hits, &vocabulary(), Language::En);

    assert_eq!(entry.resolve("Q99"), "Sermon", "entity object label");
    assert_eq!(entry.resolve("Jutlus"), "Sermon", "other-language entity label");
    assert_eq!(entry.resolve("oratio"), "Speech", "vocabulary label");
    assert_eq!(entry.resolve("carmen"), "Luuletus", "vocabulary falls back to et");
    assert_eq!(entry.resolve("mystery"), "mystery", "verbatim");
    assert_eq!(entry.id_to_label.get("Q99").map(String::as_str), Some("Sermon"));
}

#[test]
fn resolving_a_resolved_label_is_a_no_op() {
    let facet = raw(&[("oratio", 3), ("Q99", 2), ("carmen", 1), ("kõne", 1), ("x", 1)], false);
    let hits = vec![hit_with_genre("Q99", "Jutlus", "Sermon")];
    for language in Language::ALL {
        let entry = ResolutionEntry::build(Dimension::Genre, Some(&facet), &hits, &vocabulary(), language);
        for value in facet.values.keys() {
            let once = entry.resolve(value);
            assert_eq!(entry.resolve(&once), once, "{language}: {value}");
        }
    }
}

#[test]
fn same_label_from_different_codes_sums_counts_and_keeps_first_code() {
    // `oratio` and the Estonian label resolve to the same English label.
    let facet = raw(&[("Kõne", 2), ("oratio", 5), ("disputatio", 1)], false);
    let entry = ResolutionEntry::build(Dimension::Genre, Some(&facet), &[], &vocabulary(), Language::En);
    let options = entry.options(&facet);
    assert_eq!(
        options,
        vec![FacetOption::new("oratio", "Speech", 7), FacetOption::new("disputatio", "Disputation", 1)]
    );
}

#[test]
fn different_labels_for_one_code_collapse_into_one_option() {
    // The vocabulary and the hit entity disagree on the English label.
    let facet = raw(&[("Speech", 7), ("Oration", 3)], true);
    let hits = vec![hit_with_genre("oratio", "Kõne", "Oration")];
    let entry = ResolutionEntry::build(Dimension::Genre, Some(&facet), &hits, &vocabulary(), Language::En);
    let fresh = entry.options(&facet);
    assert_eq!(fresh, vec![FacetOption::new("oratio", "Speech", 10)]);

    let once = merge_with_memory(&[], &fresh, &set(&["oratio"]), label_as_code);
    let twice = merge_with_memory(&once, &fresh, &set(&["oratio"]), label_as_code);
    assert_eq!(once, fresh);
    assert_eq!(twice, once);
}

#[test]
fn authors_pass_through_unchanged() {
    let facet = raw(&[("de la Gardie, Magnus", 2)], false);
    let entry = ResolutionEntry::build(Dimension::Author, Some(&facet), &[], &vocabulary(), Language::En);
    assert_eq!(entry.resolve("de la Gardie, Magnus"), "de la Gardie, Magnus");
    assert_eq!(entry.options(&facet), vec![FacetOption::new("de la Gardie, Magnus", "de la Gardie, Magnus", 2)]);
}

#[test]
fn selected_label_from_a_link_is_canonicalized_once() {
    let facet = raw(&[("Speech", 3)], true);
    let entry = ResolutionEntry::build(Dimension::Genre, Some(&facet), &[], &vocabulary(), Language::En);
    let options = entry.options(&facet);
    assert_eq!(options, vec![FacetOption::new("oratio", "Speech", 3)]);

    let fixes = entry.canonicalize(&set(&["Kõne"]), &options);
    assert_eq!(fixes, vec![("Kõne".to_string(), "oratio".to_string())]);
    assert!(entry.canonicalize(&set(&["oratio"]), &options).is_empty());
}

#[test]
fn panel_keeps_selected_genre_visible_after_narrowing() {
    let span = YearRange::new(1600, 1800);
    let mut filter = FilterState::new(span);
    let mut panel = FacetPanel::new();

    let mut first = SearchResponse::default();
    first.raw_facets.insert(Dimension::Genre, raw(&[("Kõne", 12), ("Disputatsioon", 4)], true));
    assert!(panel.apply(&first, &vocabulary(), Language::Et, &filter).is_empty());
    assert_eq!(panel.options(Dimension::Genre)[0], FacetOption::new("oratio", "Kõne", 12));

    filter.toggle(Dimension::Genre, "oratio");
    filter.set_year_start(Some(1700));

    let mut narrowed = SearchResponse::default();
    narrowed.raw_facets.insert(Dimension::Genre, raw(&[("Disputatsioon", 2)], true));
    panel.apply(&narrowed, &vocabulary(), Language::Et, &filter);
    assert_eq!(
        panel.options(Dimension::Genre),
        &[FacetOption::new("disputatio", "Disputatsioon", 2), FacetOption::new("oratio", "Kõne", 0)]
    );
    let selected = panel.selected_options(Dimension::Genre, &filter.selected_genres);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].count, 0);
}

#[test]
fn panel_relabels_on_language_switch_and_reports_fixes() {
    let span = YearRange::new(1600, 1800);
    let mut filter = FilterState::new(span);
    filter.toggle(Dimension::Genre, "Kõne");
    let mut panel = FacetPanel::new();

    let mut response = SearchResponse::default();
    response.raw_facets.insert(Dimension::Genre, raw(&[("Speech", 3)], true));
    let fixes = panel.apply(&response, &vocabulary(), Language::En, &filter);
    assert_eq!(
        fixes,
        vec![SelectionFix { dimension: Dimension::Genre, from: "Kõne".into(), to: "oratio".into() }]
    );
    assert_eq!(panel.options(Dimension::Genre), &[FacetOption::new("oratio", "Speech", 3)]);
    assert_eq!(panel.label_for(Dimension::Genre, "disputatio"), "Disputation");
}

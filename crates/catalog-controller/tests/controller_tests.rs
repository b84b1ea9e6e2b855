use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use tokio::time::{advance, Instant};

use catalog_controller::{Event, LocalStore, SearchController};
use catalog_core::config::Settings;
use catalog_core::traits::{SearchBackend, SearchRequest, WorkHitsRequest};
use catalog_core::types::{
    Collection, Dimension, FacetOption, Hit, Language, LocalizedLabel, RawFacet, SearchResponse, Vocabulary,
};
use catalog_core::{Error, Result, ShareableParams};
use catalog_results::{ExpansionState, Overflow};

type Responder = Box<dyn Fn(&SearchRequest) -> SearchResponse + Send + Sync>;

struct FakeBackend {
    respond: Responder,
    searches: Mutex<Vec<SearchRequest>>,
    work_requests: Mutex<Vec<WorkHitsRequest>>,
    delays: Mutex<HashMap<String, Duration>>,
    fail_search: AtomicBool,
    fail_vocabulary: AtomicBool,
    collections: Vec<Collection>,
}

impl FakeBackend {
    fn new(respond: Responder) -> Self {
        Self {
            respond,
            searches: Mutex::new(Vec::new()),
            work_requests: Mutex::new(Vec::new()),
            delays: Mutex::new(HashMap::new()),
            fail_search: AtomicBool::new(false),
            fail_vocabulary: AtomicBool::new(false),
            collections: Vec::new(),
        }
    }

    fn searches(&self) -> Vec<SearchRequest> {
        self.searches.lock().unwrap().clone()
    }

    fn work_requests(&self) -> Vec<WorkHitsRequest> {
        self.work_requests.lock().unwrap().clone()
    }

    fn delay(&self, query: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(query.to_string(), delay);
    }
}

#[async_trait]
impl SearchBackend for FakeBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.searches.lock().unwrap().push(request.clone());
        let delay = self.delays.lock().unwrap().get(&request.filter.query).copied();
        tokio::time::sleep(delay.unwrap_or(Duration::from_millis(10))).await;
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection refused".into()));
        }
        Ok((self.respond)(request))
    }

    async fn work_hits(&self, request: &WorkHitsRequest) -> Result<Vec<Hit>> {
        self.work_requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok((1..=25).map(|i| hit(&format!("{}-p{i}", request.work_id), &request.work_id, 25, "")).take(request.limit).collect())
    }

    async fn vocabulary(&self) -> Result<Vocabulary> {
        if self.fail_vocabulary.load(Ordering::SeqCst) {
            return Err(Error::Backend { status: 500, message: "down".into() });
        }
        let mut genres = IndexMap::new();
        genres.insert("oratio".to_string(), LocalizedLabel::new("Kõne", "Speech"));
        genres.insert("disputatio".to_string(), LocalizedLabel::new("Disputatsioon", "Disputation"));
        let mut entries = IndexMap::new();
        entries.insert(Dimension::Genre, genres);
        Ok(Vocabulary { entries })
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        Ok(self.collections.clone())
    }
}

fn hit(id: &str, work_id: &str, count: u64, snippet: &str) -> Hit {
    Hit { id: id.into(), work_id: work_id.into(), hit_count_for_work: count, snippet: snippet.into(), ..Hit::default() }
}

/// Work A has 25 hits, work B one. Genre counts shrink once the year range
/// starts at 1700 or later; labels follow the request language.
fn catalogue(request: &SearchRequest) -> SearchResponse {
    let query = request.filter.query.as_str();
    let late = request.filter.year_range.start.is_some_and(|y| y >= 1700);
    let values: Vec<(&str, u64)> = match (request.language, late) {
        (Language::Et, false) => vec![("Kõne", 12), ("Disputatsioon", 4)],
        (Language::Et, true) => vec![("Disputatsioon", 2)],
        (Language::En, false) => vec![("Speech", 12), ("Disputation", 4)],
        (Language::En, true) => vec![("Disputation", 2)],
    };
    let mut raw_facets = IndexMap::new();
    raw_facets.insert(
        Dimension::Genre,
        RawFacet { values: values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(), localized: true },
    );
    SearchResponse {
        hits: vec![hit("A-p1", "A", 25, query), hit("B-p1", "B", 1, query)],
        raw_facets,
        total_hits: 26,
        total_works: 2,
        page: request.filter.page,
        total_pages: 20,
    }
}

fn controller_with(backend: FakeBackend, store: LocalStore, link: &str) -> (SearchController<FakeBackend>, Arc<FakeBackend>) {
    let backend = Arc::new(backend);
    let params = ShareableParams::from_query_string(link);
    let controller = SearchController::new(Arc::clone(&backend), &Settings::default(), store, &params);
    (controller, backend)
}

fn controller(link: &str) -> (SearchController<FakeBackend>, Arc<FakeBackend>) {
    controller_with(FakeBackend::new(Box::new(catalogue)), LocalStore::in_memory(), link)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn first_load_applies_results_and_facets() {
    let (mut c, backend) = controller("");
    let events = c.settle().await;
    assert!(events.iter().any(|e| matches!(e, Event::ResultsApplied(_))));
    assert_eq!(backend.searches().len(), 1);
    assert_eq!(c.groups().len(), 2);
    assert_eq!(c.facets(Dimension::Genre)[0], FacetOption::new("oratio", "Kõne", 12));
    assert!(c.error().is_none());
    assert!(!c.is_busy());
}

#[tokio::test(start_paused = true)]
async fn rapid_year_edits_issue_exactly_one_request() {
    let (mut c, backend) = controller("q=disputatio&ys=1650&ye=1680&genre=oratio");
    c.settle().await;
    assert_eq!(backend.searches().len(), 1);

    c.edit_year_start(Some(1), Instant::now());
    advance(ms(100)).await;
    c.edit_year_start(Some(16), Instant::now());
    advance(ms(100)).await;
    c.edit_year_start(Some(1660), Instant::now());
    assert_eq!(c.draft().year_start, Some(1660));
    assert_eq!(c.filter().year_range.start, Some(1650), "not committed before the input window");

    c.settle().await;
    let searches = backend.searches();
    assert_eq!(searches.len(), 2);
    let last = &searches[1].filter;
    assert_eq!(last.query, "disputatio");
    assert_eq!(last.year_range.start, Some(1660));
    assert_eq!(last.year_range.end, Some(1680));
    assert!(last.selected_genres.contains("oratio"));
    assert_eq!(c.params().get("ys"), Some("1660"));
}

#[tokio::test(start_paused = true)]
async fn query_waits_for_both_debounce_windows() {
    let (mut c, backend) = controller("");
    c.settle().await;

    let typed = Instant::now();
    c.edit_query("rahu", typed);
    loop {
        if let Event::RequestIssued(_) = c.next_event().await {
            break;
        }
    }
    assert!(Instant::now() - typed >= ms(800));
    c.settle().await;
    assert_eq!(backend.searches().len(), 2);
    assert_eq!(c.params().get("q"), Some("rahu"));
}

#[tokio::test(start_paused = true)]
async fn late_response_for_old_parameters_is_dropped() {
    let backend = FakeBackend::new(Box::new(catalogue));
    backend.delay("slow", Duration::from_secs(5));
    let (mut c, backend) = controller_with(backend, LocalStore::in_memory(), "");
    c.settle().await;

    c.edit_query("slow", Instant::now());
    let first = loop {
        if let Event::RequestIssued(id) = c.next_event().await {
            break id;
        }
    };
    c.edit_query("fast", Instant::now());
    let events = c.settle().await;

    let applied: Vec<_> = events.iter().filter_map(|e| if let Event::ResultsApplied(id) = e { Some(*id) } else { None }).collect();
    assert_eq!(applied.len(), 1);
    assert!(applied[0] > first);
    assert!(events.contains(&Event::StaleDropped(first)));
    assert_eq!(c.groups()[0].first_hit.snippet, "fast");
    assert_eq!(backend.searches().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn failure_on_first_load_has_nothing_to_keep() {
    let backend = FakeBackend::new(Box::new(catalogue));
    backend.fail_search.store(true, Ordering::SeqCst);
    let (mut c, _backend) = controller_with(backend, LocalStore::in_memory(), "");
    c.settle().await;
    let failure = c.error().cloned().unwrap();
    assert!(!failure.results_kept);
    assert!(c.results().is_none());
}

#[tokio::test(start_paused = true)]
async fn later_failure_keeps_results_and_retry_recovers() {
    let (mut c, backend) = controller("");
    c.settle().await;

    backend.fail_search.store(true, Ordering::SeqCst);
    c.set_page(2, Instant::now());
    c.settle().await;
    let failure = c.error().cloned().unwrap();
    assert!(failure.results_kept);
    assert_eq!(c.groups().len(), 2, "previous results stay visible");

    backend.fail_search.store(false, Ordering::SeqCst);
    assert!(c.retry().is_some());
    assert!(c.error().is_none());
    c.settle().await;
    assert!(c.error().is_none());
    assert_eq!(c.results().map(|r| r.response().page), Some(2));
}

#[tokio::test(start_paused = true)]
async fn dismissed_error_stays_dismissed() {
    let (mut c, backend) = controller("");
    backend.fail_search.store(true, Ordering::SeqCst);
    c.settle().await;
    assert!(c.error().is_some());
    c.dismiss_error();
    assert!(c.error().is_none());
}

#[tokio::test(start_paused = true)]
async fn expanding_a_large_work_shows_cap_and_true_total() {
    let (mut c, backend) = controller("q=rahu");
    c.settle().await;

    assert!(c.expand("A"));
    assert!(c.groups()[0].is_loading_additional());
    let events = c.settle().await;
    assert!(events.contains(&Event::GroupUpdated { work_id: "A".into() }));

    let group = &c.groups()[0];
    assert_eq!(group.state, ExpansionState::Expanded);
    assert_eq!(group.visible_hits().len(), 10);
    assert_eq!(group.overflow(c.expansion_cap()), Some(Overflow { shown: 10, total: 25 }));

    let requests = backend.work_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].limit, 10);
    assert_eq!(requests[0].query, "rahu");

    assert!(!c.expand("B"), "single-hit works do not expand");
}

#[tokio::test(start_paused = true)]
async fn collapse_restores_scroll_and_reexpand_uses_cache() {
    let (mut c, backend) = controller("");
    c.settle().await;
    c.expand("A");
    c.settle().await;

    assert!(c.collapse("A", 420));
    assert_eq!(c.take_scroll(), Some(420));
    assert_eq!(c.take_scroll(), None);

    assert!(c.expand("A"));
    assert!(c.groups()[0].is_expanded());
    assert_eq!(backend.work_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn expansion_survives_a_filter_toggle_but_not_a_new_query() {
    let (mut c, backend) = controller("q=rahu");
    c.settle().await;
    c.expand("A");
    c.settle().await;

    c.set_status(Some(catalog_core::types::WorkStatus::Done), Instant::now());
    c.settle().await;
    assert!(c.groups()[0].is_expanded(), "expanded again after refetch");
    assert_eq!(backend.work_requests().len(), 2, "cache is not carried");

    c.edit_query("muu", Instant::now());
    c.settle().await;
    assert_eq!(c.groups()[0].state, ExpansionState::Collapsed);
    assert_eq!(backend.work_requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn selected_genre_stays_visible_after_narrowing() {
    let (mut c, _backend) = controller("");
    c.settle().await;
    assert_eq!(c.facets(Dimension::Genre)[0], FacetOption::new("oratio", "Kõne", 12));

    c.toggle_genre("oratio", Instant::now());
    c.edit_year_start(Some(1750), Instant::now());
    c.settle().await;

    let options = c.facets(Dimension::Genre);
    assert!(options.contains(&FacetOption::new("oratio", "Kõne", 0)), "{options:?}");
    assert!(c.filter().selected_genres.contains("oratio"));
}

#[tokio::test(start_paused = true)]
async fn label_from_a_link_is_canonicalized_without_requery() {
    let (mut c, backend) = controller("genre=K%C3%B5ne&page=2");
    let events = c.settle().await;

    assert!(events.contains(&Event::SelectionCanonicalized));
    assert_eq!(c.params().get("genre"), Some("oratio"));
    assert_eq!(c.filter().page, 2);
    assert_eq!(backend.searches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn language_switch_relabels_facets_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let backend = FakeBackend::new(Box::new(catalogue));
    let (mut c, backend) = controller_with(backend, LocalStore::open(&path), "");
    c.settle().await;

    assert!(c.set_language(Language::En, Instant::now()));
    c.settle().await;
    assert_eq!(backend.searches().last().map(|r| r.language), Some(Language::En));
    assert_eq!(c.facets(Dimension::Genre)[0], FacetOption::new("oratio", "Speech", 12));
    assert!(c.share_query().is_empty(), "language is not part of the link");

    assert_eq!(LocalStore::open(&path).state().language, Some(Language::En));
}

#[tokio::test(start_paused = true)]
async fn collection_filter_covers_descendants_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mut backend = FakeBackend::new(Box::new(catalogue));
    backend.collections = vec![
        Collection { id: "root".into(), name: "Root".into(), parent_id: None },
        Collection { id: "child".into(), name: "Child".into(), parent_id: Some("root".into()) },
    ];
    let (mut c, backend) = controller_with(backend, LocalStore::open(&path), "");
    c.settle().await;

    c.set_collection(Some("root".into()), Instant::now());
    c.settle().await;
    let last = backend.searches().last().cloned().unwrap();
    assert_eq!(last.collection_ids, vec!["root".to_string(), "child".to_string()]);
    assert_eq!(LocalStore::open(&path).state().collection_id.as_deref(), Some("root"));
}

#[tokio::test(start_paused = true)]
async fn page_change_scrolls_to_top_and_updates_link() {
    let (mut c, _backend) = controller("");
    c.settle().await;
    assert!(c.set_page(3, Instant::now()));
    assert_eq!(c.take_scroll(), Some(0));
    assert_eq!(c.params().get("page"), Some("3"));
    c.settle().await;
    assert_eq!(c.page_window().iter().map(ToString::to_string).collect::<Vec<_>>().join(" "), "1 2 3 4 ... 20");

    c.set_page(1, Instant::now());
    assert_eq!(c.params().get("page"), None);
}

#[tokio::test(start_paused = true)]
async fn reset_keeps_query_and_clears_filters() {
    let (mut c, _backend) = controller("q=rahu&genre=oratio&ys=1700&status=done&page=4");
    c.settle().await;
    assert!(c.reset_filters(Instant::now()));
    assert_eq!(c.share_query(), "q=rahu");
    c.settle().await;
    assert!(c.facets(Dimension::Genre).iter().all(|o| o.count > 0));
}

#[tokio::test(start_paused = true)]
async fn vocabulary_failure_degrades_to_raw_labels() {
    let backend = FakeBackend::new(Box::new(catalogue));
    backend.fail_vocabulary.store(true, Ordering::SeqCst);
    let (mut c, _backend) = controller_with(backend, LocalStore::in_memory(), "");
    let events = c.settle().await;
    assert!(events.contains(&Event::PreloadFailed { what: "vocabulary" }));
    assert!(c.error().is_none());
    assert_eq!(c.facets(Dimension::Genre)[0], FacetOption::new("Kõne", "Kõne", 12));
}

#[tokio::test(start_paused = true)]
async fn detached_controller_applies_nothing() {
    let (mut c, backend) = controller("");
    c.edit_query("rahu", Instant::now());
    c.detach();
    assert_eq!(c.next_event().await, Event::Detached);
    assert!(c.results().is_none());
    assert!(!c.toggle_genre("oratio", Instant::now()));
    advance(Duration::from_secs(2)).await;
    assert_eq!(backend.searches().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn shared_link_replaces_intent() {
    let (mut c, backend) = controller("");
    c.settle().await;
    let link = ShareableParams::from_query_string("?q=rahu&scope=original&sort=year_desc");
    assert!(c.load_params(&link, Instant::now()));
    assert_eq!(c.draft().query, "rahu");
    c.settle().await;
    let last = backend.searches().last().cloned().unwrap();
    assert_eq!(last.filter.query, "rahu");
    assert_eq!(c.share_query(), link.to_query_string());
}

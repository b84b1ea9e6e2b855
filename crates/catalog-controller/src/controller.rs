//! The faceted search controller: owns the filter state and drives every
//! derived view from it.
//!
//! All work happens on the caller's task. Mutations take the current instant
//! and only record intent; [`SearchController::next_event`] waits for the next
//! debounce deadline or network completion and applies it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use catalog_core::config::Settings;
use catalog_core::params::{decode, encode};
use catalog_core::traits::{SearchBackend, SearchRequest, WorkHitsRequest};
use catalog_core::types::{
    collection_subtree, Collection, Dimension, FacetOption, Hit, Language, Scope, SearchResponse, SortKey,
    Vocabulary, WorkStatus,
};
use catalog_core::{FilterState, ShareableParams, YearRange};
use catalog_facets::FacetPanel;
use catalog_results::{page_window, ExpandAction, PageItem, ResultsView, WorkGroup};

use crate::dispatcher::{Debounce, Dispatch, QueryDispatcher, RequestId, Snapshot, Verdict};
use crate::session::LocalStore;

/// Text and range inputs as typed, ahead of the input debounce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub query: String,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
}

impl Draft {
    fn from_filter(filter: &FilterState) -> Self {
        Self { query: filter.query.clone(), year_start: filter.year_range.start, year_end: filter.year_range.end }
    }
}

/// A failed primary search for the current parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFailure {
    pub request_id: RequestId,
    pub message: String,
    /// False on a first load: there is nothing to keep showing.
    pub results_kept: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DraftCommitted,
    RequestIssued(RequestId),
    ResultsApplied(RequestId),
    StaleDropped(RequestId),
    SearchFailed(SearchFailure),
    SelectionCanonicalized,
    GroupUpdated { work_id: String },
    VocabularyLoaded,
    CollectionsLoaded,
    PreloadFailed { what: &'static str },
    /// Nothing scheduled and nothing in flight.
    Idle,
    Detached,
}

enum Completion {
    Search { id: RequestId, result: catalog_core::Result<SearchResponse> },
    WorkHits { generation: u64, work_id: String, result: catalog_core::Result<Vec<Hit>> },
    Vocabulary(catalog_core::Result<Vocabulary>),
    Collections(catalog_core::Result<Vec<Collection>>),
}

enum Wake {
    Completion(Completion),
    Timer,
    Idle,
}

pub struct SearchController<B> {
    backend: Arc<B>,
    span: YearRange,
    hits_per_page: u32,
    expansion_cap: usize,

    filter: FilterState,
    params: ShareableParams,
    language: Language,
    draft: Draft,
    query_input: Debounce<String>,
    year_start_input: Debounce<Option<i32>>,
    year_end_input: Debounce<Option<i32>>,
    dispatcher: QueryDispatcher,

    panel: FacetPanel,
    forget_facets: bool,
    vocabulary: Vocabulary,
    collections: Vec<Collection>,
    results: Option<ResultsView>,
    applied: Option<FilterState>,
    error: Option<SearchFailure>,

    store: LocalStore,
    scroll: Option<u64>,
    pending: FuturesUnordered<BoxFuture<'static, Completion>>,
    events: VecDeque<Event>,
    detached: bool,
}

impl<B: SearchBackend + 'static> SearchController<B> {
    /// Builds the controller from an initial parameter set (e.g. an opened
    /// link) and starts the preloads and the first search right away.
    pub fn new(backend: Arc<B>, settings: &Settings, store: LocalStore, initial: &ShareableParams) -> Self {
        let search = &settings.search;
        let span = search.year_span();
        let mut filter = decode(initial, span);
        if filter.selected_collection_id.is_none() {
            filter.selected_collection_id = store.state().collection_id.clone();
        }
        let language = store.state().language.unwrap_or(search.default_language);
        let input_window = Duration::from_millis(search.input_debounce_ms);

        let mut controller = Self {
            backend,
            span,
            hits_per_page: settings.backend.hits_per_page.max(1),
            expansion_cap: search.expansion_cap.max(1),
            params: encode(&filter, span),
            draft: Draft::from_filter(&filter),
            filter,
            language,
            query_input: Debounce::new(input_window),
            year_start_input: Debounce::new(input_window),
            year_end_input: Debounce::new(input_window),
            dispatcher: QueryDispatcher::new(Duration::from_millis(search.query_debounce_ms)),
            panel: FacetPanel::new(),
            forget_facets: false,
            vocabulary: Vocabulary::default(),
            collections: Vec::new(),
            results: None,
            applied: None,
            error: None,
            scroll: Some(store.state().scroll_offset).filter(|o| *o > 0),
            store,
            pending: FuturesUnordered::new(),
            events: VecDeque::new(),
            detached: false,
        };
        controller.start();
        controller
    }

    fn start(&mut self) {
        let backend = Arc::clone(&self.backend);
        self.pending.push(async move { Completion::Vocabulary(backend.vocabulary().await) }.boxed());
        let backend = Arc::clone(&self.backend);
        self.pending.push(async move { Completion::Collections(backend.collections().await) }.boxed());
        let first = self.dispatcher.force(self.snapshot());
        self.issue(first);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.params.clone(), self.language)
    }

    fn sync(&mut self, now: Instant) {
        self.params = encode(&self.filter, self.span);
        let snapshot = self.snapshot();
        self.dispatcher.observe(snapshot, now);
    }

    fn mutate(&mut self, now: Instant, f: impl FnOnce(&mut FilterState) -> bool) -> bool {
        if self.detached || !f(&mut self.filter) {
            return false;
        }
        self.sync(now);
        true
    }

    fn cancel_inputs(&mut self) {
        self.query_input.cancel();
        self.year_start_input.cancel();
        self.year_end_input.cancel();
    }

    // ---- draft inputs ----

    pub fn edit_query(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        self.draft.query = text.clone();
        self.query_input.push(text, now);
    }

    pub fn edit_year_start(&mut self, year: Option<i32>, now: Instant) {
        self.draft.year_start = year;
        self.year_start_input.push(year, now);
    }

    pub fn edit_year_end(&mut self, year: Option<i32>, now: Instant) {
        self.draft.year_end = year;
        self.year_end_input.push(year, now);
    }

    // ---- discrete filter changes ----

    pub fn toggle_facet(&mut self, dimension: Dimension, code: &str, now: Instant) -> bool {
        self.mutate(now, |f| f.toggle(dimension, code))
    }

    pub fn toggle_genre(&mut self, code: &str, now: Instant) -> bool {
        self.toggle_facet(Dimension::Genre, code, now)
    }

    pub fn toggle_type(&mut self, code: &str, now: Instant) -> bool {
        self.toggle_facet(Dimension::Type, code, now)
    }

    pub fn toggle_tag(&mut self, code: &str, now: Instant) -> bool {
        self.toggle_facet(Dimension::Tags, code, now)
    }

    pub fn set_author(&mut self, author: Option<String>, now: Instant) -> bool {
        self.mutate(now, |f| f.set_author(author))
    }

    pub fn set_work(&mut self, work_id: Option<String>, now: Instant) -> bool {
        self.mutate(now, |f| f.set_work(work_id))
    }

    pub fn set_status(&mut self, status: Option<WorkStatus>, now: Instant) -> bool {
        self.mutate(now, |f| f.set_status(status))
    }

    /// Also remembered across runs.
    pub fn set_collection(&mut self, collection_id: Option<String>, now: Instant) -> bool {
        if !self.mutate(now, |f| f.set_collection(collection_id)) {
            return false;
        }
        self.persist_collection();
        true
    }

    pub fn set_scope(&mut self, scope: Scope, now: Instant) -> bool {
        self.mutate(now, |f| f.set_scope(scope))
    }

    pub fn set_sort(&mut self, sort: SortKey, now: Instant) -> bool {
        self.mutate(now, |f| f.set_sort(sort))
    }

    /// Moving to another page also scrolls the result list back to the top.
    pub fn set_page(&mut self, page: u32, now: Instant) -> bool {
        if !self.mutate(now, |f| f.set_page(page)) {
            return false;
        }
        self.scroll = Some(0);
        self.record_scroll(0);
        true
    }

    /// Switches the display language. Facet labels follow with the next
    /// response, which is requested like any other change.
    pub fn set_language(&mut self, language: Language, now: Instant) -> bool {
        if self.detached || self.language == language {
            return false;
        }
        self.language = language;
        if let Err(e) = self.store.set_language(language) {
            warn!(error = %e, "failed to persist language");
        }
        let snapshot = self.snapshot();
        self.dispatcher.observe(snapshot, now);
        true
    }

    /// Clears every filter but keeps the query text and the selected collection.
    pub fn reset_filters(&mut self, now: Instant) -> bool {
        if self.detached {
            return false;
        }
        let mut next = FilterState::new(self.span);
        next.set_query(self.filter.query.clone());
        next.selected_collection_id = self.filter.selected_collection_id.clone();
        self.year_start_input.cancel();
        self.year_end_input.cancel();
        self.draft.year_start = next.year_range.start;
        self.draft.year_end = next.year_range.end;
        if next == self.filter {
            return false;
        }
        self.filter = next;
        self.forget_facets = true;
        self.sync(now);
        true
    }

    /// Replaces the whole intent with a shared parameter set.
    pub fn load_params(&mut self, params: &ShareableParams, now: Instant) -> bool {
        if self.detached {
            return false;
        }
        let next = decode(params, self.span);
        self.cancel_inputs();
        self.draft = Draft::from_filter(&next);
        if next == self.filter {
            return false;
        }
        let collection_changed = next.selected_collection_id != self.filter.selected_collection_id;
        self.filter = next;
        if collection_changed {
            self.persist_collection();
        }
        self.sync(now);
        true
    }

    fn persist_collection(&mut self) {
        if let Err(e) = self.store.set_collection(self.filter.selected_collection_id.clone()) {
            warn!(error = %e, "failed to persist selected collection");
        }
    }

    // ---- errors ----

    /// Issues the current parameters again immediately.
    pub fn retry(&mut self) -> Option<RequestId> {
        if self.detached {
            return None;
        }
        self.error = None;
        let dispatch = self.dispatcher.force(self.snapshot());
        Some(self.issue(dispatch))
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    // ---- result groups and viewport ----

    pub fn expand(&mut self, work_id: &str) -> bool {
        if self.detached {
            return false;
        }
        let Some(view) = self.results.as_mut() else {
            return false;
        };
        match view.expand(work_id) {
            ExpandAction::Fetch { generation, work_id, limit } => {
                self.fetch_work(generation, work_id, limit);
                true
            }
            ExpandAction::ShowCached => true,
            ExpandAction::Ignored => false,
        }
    }

    /// Collapses a group; `scroll_offset` is the list offset read before the
    /// change and is handed back through [`Self::take_scroll`].
    pub fn collapse(&mut self, work_id: &str, scroll_offset: u64) -> bool {
        let collapsed = self.results.as_mut().is_some_and(|v| v.collapse(work_id));
        if collapsed {
            self.scroll = Some(scroll_offset);
        }
        collapsed
    }

    pub fn record_scroll(&mut self, offset: u64) {
        if let Err(e) = self.store.set_scroll(offset) {
            warn!(error = %e, "failed to persist scroll offset");
        }
    }

    /// Scroll offset the view should restore on its next paint, once.
    pub fn take_scroll(&mut self) -> Option<u64> {
        self.scroll.take()
    }

    /// Stops applying async results; in-flight work is dropped.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        info!(in_flight = self.pending.len(), "controller detached");
        self.detached = true;
        self.cancel_inputs();
        self.dispatcher.reset();
        self.pending = FuturesUnordered::new();
        self.events.clear();
    }

    // ---- driving ----

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.query_input.deadline(),
            self.year_start_input.deadline(),
            self.year_end_input.deadline(),
            self.dispatcher.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Fires every debounce whose deadline has passed. Returns whether anything
    /// happened.
    pub fn on_timer(&mut self, now: Instant) -> bool {
        if self.detached {
            return false;
        }
        let mut committed = false;
        if let Some(query) = self.query_input.poll(now) {
            committed |= self.filter.set_query(query.trim());
        }
        if let Some(year) = self.year_start_input.poll(now) {
            committed |= self.filter.set_year_start(year);
        }
        if let Some(year) = self.year_end_input.poll(now) {
            committed |= self.filter.set_year_end(year);
        }
        if committed {
            self.events.push_back(Event::DraftCommitted);
            self.sync(now);
        }
        let dispatched = match self.dispatcher.poll(now) {
            Some(dispatch) => {
                self.issue(dispatch);
                true
            }
            None => false,
        };
        committed || dispatched
    }

    /// Waits for the next timer or completion and applies it.
    pub async fn next_event(&mut self) -> Event {
        loop {
            if let Some(event) = self.events.pop_front() {
                return event;
            }
            if self.detached {
                return Event::Detached;
            }
            let deadline = self.next_deadline();
            let has_pending = !self.pending.is_empty();
            let wake = tokio::select! {
                Some(completion) = self.pending.next(), if has_pending => Wake::Completion(completion),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Wake::Timer,
                else => Wake::Idle,
            };
            match wake {
                Wake::Completion(completion) => self.complete(completion),
                Wake::Timer => {
                    self.on_timer(Instant::now());
                }
                Wake::Idle => return Event::Idle,
            }
        }
    }

    /// Runs until nothing is scheduled or in flight; returns what happened.
    pub async fn settle(&mut self) -> Vec<Event> {
        let mut seen = Vec::new();
        loop {
            match self.next_event().await {
                Event::Idle | Event::Detached => return seen,
                event => seen.push(event),
            }
        }
    }

    fn issue(&mut self, dispatch: Dispatch) -> RequestId {
        let Dispatch { id, snapshot } = dispatch;
        let filter = decode(&snapshot.params, self.span);
        let collection_ids = filter
            .selected_collection_id
            .as_deref()
            .map(|root| collection_subtree(&self.collections, root))
            .unwrap_or_default();
        let request = SearchRequest {
            filter,
            language: snapshot.language,
            collection_ids,
            hits_per_page: self.hits_per_page,
        };
        debug!(
            request_id = %id,
            fingerprint = snapshot.fingerprint(),
            query = %request.filter.query,
            page = request.filter.page,
            "dispatching search"
        );
        let backend = Arc::clone(&self.backend);
        self.pending.push(
            async move {
                let result = backend.search(&request).await;
                Completion::Search { id, result }
            }
            .boxed(),
        );
        self.events.push_back(Event::RequestIssued(id));
        id
    }

    fn fetch_work(&mut self, generation: u64, work_id: String, limit: usize) {
        let Some(filter) = &self.applied else {
            return;
        };
        let request = WorkHitsRequest::for_work(filter, self.language, &work_id, limit);
        debug!(work_id = %work_id, generation, limit, "fetching work hits");
        let backend = Arc::clone(&self.backend);
        self.pending.push(
            async move {
                let result = backend.work_hits(&request).await;
                Completion::WorkHits { generation, work_id, result }
            }
            .boxed(),
        );
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Search { id, result } => self.complete_search(id, result),
            Completion::WorkHits { generation, work_id, result } => {
                let Some(view) = self.results.as_mut() else {
                    return;
                };
                if view.complete_expand(generation, &work_id, result.map_err(|e| e.to_string())) {
                    self.events.push_back(Event::GroupUpdated { work_id });
                }
            }
            Completion::Vocabulary(Ok(vocabulary)) => {
                info!(dimensions = vocabulary.entries.len(), "vocabulary loaded");
                self.vocabulary = vocabulary;
                // Remembered options may be keyed by labels that now resolve to codes.
                self.panel.clear();
                self.refresh_facets();
                self.events.push_back(Event::VocabularyLoaded);
            }
            Completion::Vocabulary(Err(e)) => {
                warn!(error = %e, "vocabulary preload failed; raw facet values are shown");
                self.events.push_back(Event::PreloadFailed { what: "vocabulary" });
            }
            Completion::Collections(Ok(collections)) => {
                info!(collections = collections.len(), "collections loaded");
                self.collections = collections;
                self.events.push_back(Event::CollectionsLoaded);
                if self.filter.selected_collection_id.is_some() {
                    // The filter now covers the whole subtree.
                    let dispatch = self.dispatcher.force(self.snapshot());
                    self.issue(dispatch);
                }
            }
            Completion::Collections(Err(e)) => {
                warn!(error = %e, "collections preload failed; only the selected collection is filtered");
                self.events.push_back(Event::PreloadFailed { what: "collections" });
            }
        }
    }

    fn complete_search(&mut self, id: RequestId, result: catalog_core::Result<SearchResponse>) {
        let current = self.snapshot();
        match self.dispatcher.complete(id, &current, result.is_ok()) {
            Verdict::Stale => self.events.push_back(Event::StaleDropped(id)),
            Verdict::Apply => match result {
                Ok(response) => self.apply(id, response),
                Err(e) => {
                    let failure =
                        SearchFailure { request_id: id, message: e.to_string(), results_kept: self.results.is_some() };
                    warn!(request_id = %id, error = %e, results_kept = failure.results_kept, "search failed");
                    self.error = Some(failure.clone());
                    self.events.push_back(Event::SearchFailed(failure));
                }
            },
        }
    }

    fn apply(&mut self, id: RequestId, response: SearchResponse) {
        let carry = self.applied.as_ref().is_some_and(|prev| {
            prev.query == self.filter.query && prev.scope == self.filter.scope && prev.page == self.filter.page
        });
        let (view, refetch) = ResultsView::rebuild(id.0, response, self.expansion_cap, self.results.as_ref(), carry);
        info!(
            request_id = %id,
            hits = view.response().hits.len(),
            total_hits = view.response().total_hits,
            total_works = view.response().total_works,
            page = view.response().page,
            "results applied"
        );
        if std::mem::take(&mut self.forget_facets) {
            self.panel.clear();
        }
        self.results = Some(view);
        self.error = None;
        self.refresh_facets();
        self.applied = Some(self.filter.clone());
        for work_id in refetch {
            self.fetch_work(id.0, work_id, self.expansion_cap);
        }
        self.events.push_back(Event::ResultsApplied(id));
    }

    /// Re-resolves the facet lists of the shown response and rewrites selected
    /// values to their canonical codes. Neither the page nor the dispatch
    /// schedule changes.
    fn refresh_facets(&mut self) {
        let Some(view) = &self.results else {
            return;
        };
        let fixes = self.panel.apply(view.response(), &self.vocabulary, self.language, &self.filter);
        if fixes.is_empty() {
            return;
        }
        let before = self.snapshot();
        for fix in &fixes {
            self.filter.replace_selection(fix.dimension, &fix.from, &fix.to);
        }
        self.params = encode(&self.filter, self.span);
        let after = self.snapshot();
        self.dispatcher.rebase(&before, &after);
        self.events.push_back(Event::SelectionCanonicalized);
    }

    // ---- outputs ----

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn params(&self) -> &ShareableParams {
        &self.params
    }

    pub fn share_query(&self) -> String {
        self.params.to_query_string()
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn span(&self) -> YearRange {
        self.span
    }

    pub fn facets(&self, dimension: Dimension) -> &[FacetOption] {
        self.panel.options(dimension)
    }

    pub fn facet_label(&self, dimension: Dimension, code: &str) -> String {
        self.panel.label_for(dimension, code)
    }

    pub fn results(&self) -> Option<&ResultsView> {
        self.results.as_ref()
    }

    pub fn groups(&self) -> &[WorkGroup] {
        self.results.as_ref().map(ResultsView::groups).unwrap_or_default()
    }

    pub fn page_window(&self) -> Vec<PageItem> {
        self.results
            .as_ref()
            .map(|v| page_window(v.response().total_pages, self.filter.page))
            .unwrap_or_default()
    }

    pub fn error(&self) -> Option<&SearchFailure> {
        self.error.as_ref()
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn expansion_cap(&self) -> usize {
        self.expansion_cap
    }

    /// True while a debounce is armed or a request is outstanding.
    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty() || self.next_deadline().is_some()
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

//! Grouping of page hits by parent work, with bounded lazy expansion.
//!
//! A group shows its first hit eagerly. Expanding fetches up to `cap` hits of
//! that one work (the first hit included) and caches them for the lifetime of
//! the response that produced the group.
//!
//! ```text
//! collapsed --expand--> loading --ok--> expanded --collapse--> collapsed
//!     ^                    |                                      |
//!     +-------error--------+          (cached: expand shows again)+
//! ```

use std::collections::HashMap;

use tracing::{debug, warn};

use catalog_core::types::{Hit, SearchResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionState {
    Collapsed,
    Loading,
    Expanded,
}

/// Shown when a work has more hits than an expanded group displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow {
    pub shown: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkGroup {
    pub work_id: String,
    pub first_hit: Hit,
    pub hit_count_for_work: u64,
    /// Hits after the first one, once fetched.
    pub loaded_additional_hits: Option<Vec<Hit>>,
    pub state: ExpansionState,
}

impl WorkGroup {
    pub fn is_expanded(&self) -> bool {
        self.state == ExpansionState::Expanded
    }

    pub fn is_loading_additional(&self) -> bool {
        self.state == ExpansionState::Loading
    }

    pub fn can_expand(&self) -> bool {
        self.hit_count_for_work > 1
    }

    /// The first hit, followed by the additional ones while expanded.
    pub fn visible_hits(&self) -> Vec<&Hit> {
        let mut out = vec![&self.first_hit];
        if self.is_expanded() {
            if let Some(more) = &self.loaded_additional_hits {
                out.extend(more.iter());
            }
        }
        out
    }

    /// `Some` when the work has more hits than `cap`.
    pub fn overflow(&self, cap: usize) -> Option<Overflow> {
        let cap = cap as u64;
        (self.hit_count_for_work > cap).then_some(Overflow { shown: cap, total: self.hit_count_for_work })
    }
}

/// Groups hits by `work_id` in order of first appearance.
pub fn group_hits(hits: &[Hit]) -> Vec<WorkGroup> {
    let mut groups: Vec<WorkGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut delivered: Vec<u64> = Vec::new();
    for hit in hits {
        match index.get(hit.work_id.as_str()) {
            Some(&i) => delivered[i] += 1,
            None => {
                index.insert(hit.work_id.as_str(), groups.len());
                delivered.push(1);
                groups.push(WorkGroup {
                    work_id: hit.work_id.clone(),
                    first_hit: hit.clone(),
                    hit_count_for_work: hit.hit_count_for_work,
                    loaded_additional_hits: None,
                    state: ExpansionState::Collapsed,
                });
            }
        }
    }
    for (group, seen) in groups.iter_mut().zip(delivered) {
        group.hit_count_for_work = group.hit_count_for_work.max(seen).max(1);
    }
    groups
}

/// What the caller must do after an expand request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandAction {
    /// Fetch up to `limit` hits of the work; report back with `generation`.
    Fetch { generation: u64, work_id: String, limit: usize },
    /// Cached hits are shown again; nothing to fetch.
    ShowCached,
    /// Unknown work, single-hit work, or a fetch already in flight.
    Ignored,
}

/// Results of one applied response: grouped hits plus the per-work cache.
#[derive(Debug, Clone)]
pub struct ResultsView {
    generation: u64,
    response: SearchResponse,
    groups: Vec<WorkGroup>,
    cache: HashMap<String, Vec<Hit>>,
    cap: usize,
}

impl ResultsView {
    pub fn new(generation: u64, response: SearchResponse, cap: usize) -> Self {
        let groups = group_hits(&response.hits);
        Self { generation, response, groups, cache: HashMap::new(), cap: cap.max(1) }
    }

    /// Builds the view for a new response. When `carry_expansion` is set,
    /// groups that were expanded (or loading) in `previous` and still exist
    /// re-enter `loading`; the cache is never carried. Returns the work ids that
    /// need fetching again.
    pub fn rebuild(
        generation: u64,
        response: SearchResponse,
        cap: usize,
        previous: Option<&ResultsView>,
        carry_expansion: bool,
    ) -> (Self, Vec<String>) {
        let mut view = Self::new(generation, response, cap);
        let mut refetch = Vec::new();
        if let (Some(previous), true) = (previous, carry_expansion) {
            for group in view.groups.iter_mut() {
                let was_open = previous
                    .group(&group.work_id)
                    .is_some_and(|g| g.state != ExpansionState::Collapsed);
                if was_open && group.can_expand() {
                    group.state = ExpansionState::Loading;
                    refetch.push(group.work_id.clone());
                }
            }
        }
        (view, refetch)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn response(&self) -> &SearchResponse {
        &self.response
    }

    pub fn groups(&self) -> &[WorkGroup] {
        &self.groups
    }

    pub fn group(&self, work_id: &str) -> Option<&WorkGroup> {
        self.groups.iter().find(|g| g.work_id == work_id)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn group_mut(&mut self, work_id: &str) -> Option<&mut WorkGroup> {
        self.groups.iter_mut().find(|g| g.work_id == work_id)
    }

    pub fn expand(&mut self, work_id: &str) -> ExpandAction {
        let generation = self.generation;
        let limit = self.cap;
        let cached = self.cache.get(work_id).cloned();
        let Some(group) = self.group_mut(work_id) else {
            return ExpandAction::Ignored;
        };
        if !group.can_expand() {
            return ExpandAction::Ignored;
        }
        match group.state {
            ExpansionState::Loading => ExpandAction::Ignored,
            ExpansionState::Expanded => ExpandAction::ShowCached,
            ExpansionState::Collapsed => match cached {
                Some(hits) => {
                    group.loaded_additional_hits = Some(hits);
                    group.state = ExpansionState::Expanded;
                    ExpandAction::ShowCached
                }
                None => {
                    group.state = ExpansionState::Loading;
                    ExpandAction::Fetch { generation, work_id: work_id.to_string(), limit }
                }
            },
        }
    }

    /// Applies the outcome of a per-work fetch. Results for another generation
    /// or for a group no longer loading are dropped. Returns whether the view
    /// changed.
    pub fn complete_expand(&mut self, generation: u64, work_id: &str, result: Result<Vec<Hit>, String>) -> bool {
        if generation != self.generation {
            debug!(work_id, generation, current = self.generation, "dropping per-work hits for an old response");
            return false;
        }
        let cap = self.cap;
        let Some(group) = self.group_mut(work_id) else {
            return false;
        };
        if group.state != ExpansionState::Loading {
            return false;
        }
        match result {
            Ok(hits) => {
                let first_id = group.first_hit.id.clone();
                let additional: Vec<Hit> = hits
                    .into_iter()
                    .filter(|h| h.id != first_id)
                    .take(cap.saturating_sub(1))
                    .collect();
                group.loaded_additional_hits = Some(additional.clone());
                group.state = ExpansionState::Expanded;
                self.cache.insert(work_id.to_string(), additional);
            }
            Err(message) => {
                warn!(work_id, %message, "per-work fetch failed; group stays collapsed");
                group.loaded_additional_hits = None;
                group.state = ExpansionState::Collapsed;
            }
        }
        true
    }

    /// Collapses a group; its cached hits stay for a later expand.
    pub fn collapse(&mut self, work_id: &str) -> bool {
        match self.group_mut(work_id) {
            Some(group) if group.state == ExpansionState::Expanded => {
                group.state = ExpansionState::Collapsed;
                true
            }
            _ => false,
        }
    }
}

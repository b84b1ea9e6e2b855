//! Debounced query dispatch.
//!
//! Two debounce points: draft inputs wait for a quiet window before they are
//! committed to the filter, and every change of the shareable parameters waits
//! again before a request goes out. Requests are never aborted; each one is
//! tagged with the snapshot that produced it and its response is applied only
//! while that snapshot is still current.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use twox_hash::XxHash64;

use catalog_core::types::Language;
use catalog_core::ShareableParams;

/// Trailing-edge debounce: the latest value is released once `window` has
/// passed since it was pushed.
#[derive(Debug, Clone)]
pub struct Debounce<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debounce<T> {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: None }
    }

    /// Replaces any pending value and restarts the window.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.window));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref().map(|(v, _)| v)
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.deadline().is_some_and(|at| at <= now) {
            self.pending.take().map(|(v, _)| v)
        } else {
            None
        }
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Everything a primary search depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snapshot {
    pub params: ShareableParams,
    pub language: Language,
}

impl Snapshot {
    pub fn new(params: ShareableParams, language: Language) -> Self {
        Self { params, language }
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub id: RequestId,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Apply,
    Stale,
}

#[derive(Debug)]
pub struct QueryDispatcher {
    debounce: Debounce<Snapshot>,
    next_id: u64,
    last_issued: Option<Snapshot>,
    in_flight: BTreeMap<RequestId, Snapshot>,
    last_applied: Option<RequestId>,
}

impl QueryDispatcher {
    pub fn new(window: Duration) -> Self {
        Self {
            debounce: Debounce::new(window),
            next_id: 1,
            last_issued: None,
            in_flight: BTreeMap::new(),
            last_applied: None,
        }
    }

    /// Schedules `snapshot`, coalescing with anything already pending. Returns
    /// false when it matches the last issued request and nothing is pending.
    pub fn observe(&mut self, snapshot: Snapshot, now: Instant) -> bool {
        if self.last_issued.as_ref() == Some(&snapshot) {
            if self.debounce.cancel().is_some() {
                debug!(fingerprint = snapshot.fingerprint(), "change reverted before dispatch");
            }
            return false;
        }
        debug!(fingerprint = snapshot.fingerprint(), "query scheduled");
        self.debounce.push(snapshot, now);
        true
    }

    pub fn poll(&mut self, now: Instant) -> Option<Dispatch> {
        let snapshot = self.debounce.poll(now)?;
        Some(self.issue(snapshot))
    }

    /// Issues immediately, bypassing the window (first load, retry).
    pub fn force(&mut self, snapshot: Snapshot) -> Dispatch {
        self.debounce.cancel();
        self.issue(snapshot)
    }

    fn issue(&mut self, snapshot: Snapshot) -> Dispatch {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.last_issued = Some(snapshot.clone());
        self.in_flight.insert(id, snapshot.clone());
        Dispatch { id, snapshot }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_scheduled(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Settles request `id` against the current snapshot. A response is applied
    /// only if its snapshot is still current and no newer response has been
    /// applied; `record` marks an applied success so older ones become stale.
    pub fn complete(&mut self, id: RequestId, current: &Snapshot, record: bool) -> Verdict {
        let Some(snapshot) = self.in_flight.remove(&id) else {
            return Verdict::Stale;
        };
        let superseded = self.last_applied.is_some_and(|applied| id < applied);
        if &snapshot != current || superseded {
            debug!(request_id = %id, fingerprint = snapshot.fingerprint(), superseded, "dropping stale response");
            return Verdict::Stale;
        }
        if record {
            self.last_applied = Some(id);
        }
        Verdict::Apply
    }

    /// Rewrites `from` to `to` wherever it is tracked. Used when a selection is
    /// re-encoded to its canonical form without a change of intent.
    pub fn rebase(&mut self, from: &Snapshot, to: &Snapshot) {
        for snapshot in self.in_flight.values_mut() {
            if snapshot == from {
                *snapshot = to.clone();
            }
        }
        if self.last_issued.as_ref() == Some(from) {
            self.last_issued = Some(to.clone());
        }
        if let Some(at) = self.debounce.deadline() {
            if self.debounce.peek() == Some(from) {
                self.debounce.pending = Some((to.clone(), at));
            }
        }
    }

    /// Forgets everything in flight or scheduled.
    pub fn reset(&mut self) {
        self.debounce.cancel();
        self.in_flight.clear();
    }
}

//! The crawl frontier
//!
//! Every URI the crawler has ever accepted lives in exactly one of three
//! sets: pending (queued or in flight), discovered, or failed. URIs only move
//! out of pending, except when a suspend hands in-flight URIs back to the
//! queue.

use crate::state::PageState;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// The three-set partition of all accepted URIs
#[derive(Debug, Default, Clone)]
pub struct Frontier {
    /// Submission order of pending URIs that are not in flight
    queue: VecDeque<Url>,

    /// Queued and in-flight URIs
    pending: HashSet<Url>,

    /// Subset of `pending` currently submitted to the fetch pool
    in_flight: HashSet<Url>,

    discovered: HashSet<Url>,

    failed: HashSet<Url>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a frontier from previously persisted sets
    ///
    /// A URI that appears in `pending` but already has an outcome is not
    /// queued again.
    pub fn with_state(
        discovered: impl IntoIterator<Item = Url>,
        failed: impl IntoIterator<Item = Url>,
        pending: impl IntoIterator<Item = Url>,
    ) -> Self {
        let mut frontier = Self::new();
        frontier.discovered.extend(discovered);
        for uri in failed {
            if !frontier.discovered.contains(&uri) {
                frontier.failed.insert(uri);
            }
        }
        for uri in pending {
            frontier.add(uri);
        }
        frontier
    }

    /// Queues a URI unless it is already known
    ///
    /// Returns true if the URI was newly queued.
    pub fn add(&mut self, uri: Url) -> bool {
        if self.state_of(&uri).is_some() {
            return false;
        }
        self.pending.insert(uri.clone());
        self.queue.push_back(uri);
        true
    }

    /// Pops the next queued URI and marks it in flight
    pub fn next(&mut self) -> Option<Url> {
        let uri = self.queue.pop_front()?;
        self.in_flight.insert(uri.clone());
        Some(uri)
    }

    /// Moves an in-flight URI to the discovered set
    ///
    /// Returns false if the URI was not in flight, in which case nothing
    /// changes.
    pub fn mark_discovered(&mut self, uri: &Url) -> bool {
        if !self.leave_pending(uri) {
            return false;
        }
        self.discovered.insert(uri.clone());
        true
    }

    /// Moves an in-flight URI to the failed set
    ///
    /// Returns false if the URI was not in flight, in which case nothing
    /// changes.
    pub fn mark_failed(&mut self, uri: &Url) -> bool {
        if !self.leave_pending(uri) {
            return false;
        }
        self.failed.insert(uri.clone());
        true
    }

    fn leave_pending(&mut self, uri: &Url) -> bool {
        if !self.in_flight.remove(uri) {
            return false;
        }
        self.pending.remove(uri);
        true
    }

    /// Returns every in-flight URI to the back of the queue
    ///
    /// Returns the number of URIs requeued.
    pub fn requeue_in_flight(&mut self) -> usize {
        let mut drained: Vec<Url> = self.in_flight.drain().collect();
        drained.sort();
        let count = drained.len();
        self.queue.extend(drained);
        count
    }

    /// Reports where a URI sits, or None if it was never accepted
    pub fn state_of(&self, uri: &Url) -> Option<PageState> {
        if self.in_flight.contains(uri) {
            Some(PageState::InFlight)
        } else if self.pending.contains(uri) {
            Some(PageState::Pending)
        } else if self.discovered.contains(uri) {
            Some(PageState::Discovered)
        } else if self.failed.contains(uri) {
            Some(PageState::Failed)
        } else {
            None
        }
    }

    #[cfg(test)]
    fn has_queued(&self) -> bool {
        !self.queue.is_empty()
    }

    #[cfg(test)]
    fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Queued and in-flight URIs
    pub fn pending(&self) -> &HashSet<Url> {
        &self.pending
    }

    /// Successfully fetched URIs
    pub fn discovered(&self) -> &HashSet<Url> {
        &self.discovered
    }

    /// URIs whose fetch failed
    pub fn failed(&self) -> &HashSet<Url> {
        &self.failed
    }

    /// Total number of URIs ever accepted
    pub fn len(&self) -> usize {
        self.pending.len() + self.discovered.len() + self.failed.len()
    }

    /// Returns true if no URI was ever accepted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Propagation Pass
//!
//! Bookkeeping for one write's propagation. The store drives it in two
//! phases:
//!
//! 1. Mark: starting from the changed publisher, every live listener is
//!    marked through each edge it is reached by, recursively through derived
//!    listeners, before anything recomputes. The first mark stamps the
//!    listener's version.
//! 2. Run: each publisher that settles (changed or not) settles the edges
//!    it marked. A listener becomes ready once all of its marked edges have
//!    settled; it is dirty if any of them changed.
//!
//! A listener therefore runs at most once per pass, and only after every
//! upstream dependency reached by the same write has its final value. A
//! listener whose inputs all settled unchanged is skipped, and settles its
//! own dependents as unchanged.
//!
//! A derived value read while its listener is still marked is recomputed on
//! the spot (pulled). The pass remembers whether the pull changed it, and
//! when the listener's edges settle later it forwards that result instead of
//! running again.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use smallvec::SmallVec;

use super::listener::ListenerId;
use super::publisher::PublisherId;

pub type Edges = SmallVec<[ListenerId; 4]>;

#[derive(Debug, Clone, Copy)]
struct Mark {
    /// Marked edges not yet settled.
    pending: usize,
    dirty: bool,
    /// Listener version when first marked.
    version: u64,
}

/// A listener whose marked edges have all settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    pub dirty: bool,
    pub version: u64,
}

#[derive(Debug)]
pub struct Pass {
    id: u64,
    marks: HashMap<ListenerId, Mark>,
    edges: HashMap<PublisherId, Edges>,
    /// Marked listeners recomputed ahead of their turn, and whether that
    /// changed their value.
    pulled: HashMap<ListenerId, bool>,
}

impl Pass {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            marks: HashMap::new(),
            edges: HashMap::new(),
            pulled: HashMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark the edge `from -> to`. Returns true if this is the first time
    /// `to` is marked in this pass.
    pub fn mark(&mut self, from: PublisherId, to: ListenerId, version: u64) -> bool {
        self.edges.entry(from).or_default().push(to);
        match self.marks.entry(to) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().pending += 1;
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Mark {
                    pending: 1,
                    dirty: false,
                    version,
                });
                true
            }
        }
    }

    /// Take the listeners marked from `from`. Each publisher settles once.
    pub fn take_edges(&mut self, from: PublisherId) -> Edges {
        self.edges.remove(&from).unwrap_or_default()
    }

    /// Settle one marked edge into `to`. Returns the listener's readiness
    /// once its last pending edge settles.
    pub fn settle(&mut self, to: ListenerId, changed: bool) -> Option<Ready> {
        let mark = self.marks.get_mut(&to)?;
        debug_assert!(mark.pending > 0, "settled a listener with no pending edge");
        mark.pending -= 1;
        mark.dirty |= changed;
        if mark.pending > 0 {
            return None;
        }
        self.marks
            .remove(&to)
            .map(|mark| Ready {
                dirty: mark.dirty,
                version: mark.version,
            })
    }

    /// Claim `listener` for a pull. Returns true if it is marked and has not
    /// been pulled in this pass yet.
    pub fn pull(&mut self, listener: ListenerId) -> bool {
        if !self.marks.contains_key(&listener) || self.pulled.contains_key(&listener) {
            return false;
        }
        self.pulled.insert(listener, false);
        true
    }

    /// Record the outcome of a pull started with [`Pass::pull`].
    pub fn record_pull(&mut self, listener: ListenerId, changed: bool) {
        if let Some(pulled) = self.pulled.get_mut(&listener) {
            *pulled |= changed;
        }
    }

    pub fn take_pulled(&mut self, listener: ListenerId) -> Option<bool> {
        self.pulled.remove(&listener)
    }

    /// Listeners still waiting on an edge. Non-zero after the run phase
    /// only when the marked cone contains a cycle.
    pub fn unsettled(&self) -> usize {
        self.marks.len()
    }
}

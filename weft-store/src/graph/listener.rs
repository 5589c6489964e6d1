//! Listener types for the store.
//!
//! A listener is any computation that re-runs when the state it read
//! changes: a derived token's recompute body or a registered effect.

use std::sync::Arc;

use indexmap::IndexSet;

use super::publisher::PublisherId;
use super::Id;
use crate::store::{Effect, Get};
use crate::value::{AnyValue, BoxedValue};

pub type ListenerId = Id<Listener>;

/// Erased derivation: tracked reads plus the previous value, if any.
pub type DeriveFn =
    Arc<dyn Fn(&Get<'_>, Option<&dyn AnyValue>) -> BoxedValue + Send + Sync>;

#[derive(Clone)]
pub enum ListenerBody {
    Derive {
        publisher: PublisherId,
        derive: DeriveFn,
    },
    Effect(Arc<dyn Effect>),
}

/// A subscriber in the dependency graph.
///
/// The version is bumped every time the listener runs. Publishers remember
/// the version they were subscribed at, so every subscription taken before a
/// run goes stale at once; the run re-subscribes to whatever it reads.
///
/// The listener also remembers every publisher it ever subscribed to, so
/// removing it can clear its entries without waiting for those publishers
/// to change.
pub struct Listener {
    version: u64,
    body: ListenerBody,
    sources: IndexSet<PublisherId>,
}

impl Listener {
    pub fn derive(publisher: PublisherId, derive: DeriveFn) -> Self {
        Self {
            version: 0,
            body: ListenerBody::Derive { publisher, derive },
            sources: IndexSet::new(),
        }
    }

    pub fn effect(effect: Arc<dyn Effect>) -> Self {
        Self {
            version: 0,
            body: ListenerBody::Effect(effect),
            sources: IndexSet::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Invalidate every subscription taken at the current version.
    pub fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub fn add_source(&mut self, publisher: PublisherId) {
        self.sources.insert(publisher);
    }

    /// Publishers this listener has been subscribed to, stale entries
    /// included.
    pub fn sources(&self) -> impl Iterator<Item = PublisherId> + '_ {
        self.sources.iter().copied()
    }

    pub fn body(&self) -> &ListenerBody {
        &self.body
    }

    /// The publisher this listener recomputes, for derived listeners.
    pub fn derived_publisher(&self) -> Option<PublisherId> {
        match &self.body {
            ListenerBody::Derive { publisher, .. } => Some(*publisher),
            ListenerBody::Effect(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Arena;

    #[test]
    fn bump_advances_version() {
        let mut listener = Listener::effect(Arc::new(|_: &Get<'_>| {}));
        assert_eq!(listener.version(), 0);
        assert_eq!(listener.bump(), 1);
        assert_eq!(listener.bump(), 2);
        assert_eq!(listener.version(), 2);
    }

    #[test]
    fn sources_are_recorded_once() {
        let mut publishers: Arena<crate::graph::Publisher> = Arena::new();
        let (a, b) = (publishers.reserve(), publishers.reserve());
        let mut listener = Listener::effect(Arc::new(|_: &Get<'_>| {}));

        listener.add_source(a);
        listener.add_source(b);
        listener.add_source(a);
        listener.bump();

        assert_eq!(listener.sources().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn only_derived_listeners_have_a_publisher() {
        let mut publishers: Arena<crate::graph::Publisher> = Arena::new();
        let publisher = publishers.reserve();
        let derive: DeriveFn =
            Arc::new(|_: &Get<'_>, _: Option<&dyn AnyValue>| -> BoxedValue { Box::new(0_i32) });

        let derived = Listener::derive(publisher, derive);
        assert_eq!(derived.derived_publisher(), Some(publisher));

        let effect = Listener::effect(Arc::new(|_: &Get<'_>| {}));
        assert!(effect.derived_publisher().is_none());
    }
}

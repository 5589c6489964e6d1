//! Read context.

use tracing::trace;

use crate::error::StoreResult;
use crate::graph::ListenerId;
use crate::token::State;
use crate::Store;

/// Read access handed to derivations, effects, rules and triggers.
///
/// A tracking `Get` belongs to one run of one listener: every token read
/// through it subscribes that listener, so the listener re-runs when any of
/// them changes. An untracked `Get` reads without subscribing.
pub struct Get<'a> {
    store: &'a Store,
    listener: Option<ListenerId>,
}

impl<'a> Get<'a> {
    pub(crate) fn tracked(store: &'a Store, listener: ListenerId) -> Self {
        Self {
            store,
            listener: Some(listener),
        }
    }

    pub(crate) fn untracked(store: &'a Store) -> Self {
        Self {
            store,
            listener: None,
        }
    }

    /// Read `token`, subscribing the running listener to it.
    ///
    /// # Panics
    ///
    /// Panics if the read fails: a derivation that reads its own token while
    /// it is being created, or two tokens of different types sharing an id.
    /// Use [`Get::try_get`] to handle those cases.
    pub fn get<S: State>(&self, token: &S) -> S::Value {
        match self.try_get(token) {
            Ok(value) => value,
            Err(err) => panic!("failed to read `{}`: {err}", token.label()),
        }
    }

    /// Read `token`, returning read failures instead of panicking.
    ///
    /// A derived token whose inputs changed in a pass still in progress is
    /// recomputed first, so the value read is never older than the write
    /// being propagated.
    pub fn try_get<S: State>(&self, token: &S) -> StoreResult<S::Value> {
        let publisher = self.store.resolve(token)?;
        self.store.refresh(publisher);
        self.store.registry(|r| {
            if let Some(listener) = self.listener {
                trace!(token = %token.label(), listener = %listener, "tracking read");
                r.subscribe(publisher, listener);
            }
            r.value_of::<S::Value>(publisher)
        })
    }

    /// Whether reads through this context subscribe a listener.
    pub fn is_tracking(&self) -> bool {
        self.listener.is_some()
    }

    /// The store being read.
    pub fn store(&self) -> &'a Store {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Constant, Derived};

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let store = Store::new();
        let value = Constant::new(3);

        let get = Get::untracked(&store);
        assert!(!get.is_tracking());
        assert_eq!(get.get(&value), 3);
        assert_eq!(store.subscriber_count(&value).unwrap(), 0);
    }

    #[test]
    fn derived_reads_subscribe() {
        let store = Store::new();
        let value = Constant::new(3);
        let tripled = {
            let value = value.clone();
            Derived::new(move |get| {
                assert!(get.is_tracking());
                get.get(&value) * 3
            })
        };

        assert_eq!(store.read(&tripled).unwrap(), 9);
        assert_eq!(store.subscriber_count(&value).unwrap(), 1);
    }
}

//! Effects
//!
//! Effects are eager listeners: they run once when registered and again
//! whenever something they read changes. Unlike derivations they produce no
//! value, so they are the leaves of the graph where state leaves the store:
//! rendering, logging, kicking off commands.

use std::sync::{Arc, Weak};

use tracing::debug;

use super::StoreInner;
use crate::graph::{Listener, ListenerId};
use crate::{Get, Store};

/// A side effect that re-runs when the state it reads changes.
pub trait Effect: Send + Sync + 'static {
    /// First run, at registration. Defaults to [`Effect::run`].
    fn init(&self, get: &Get<'_>) {
        self.run(get)
    }

    fn run(&self, get: &Get<'_>);
}

impl<F> Effect for F
where
    F: Fn(&Get<'_>) + Send + Sync + 'static,
{
    fn run(&self, get: &Get<'_>) {
        self(get)
    }
}

/// Handle to a registered effect.
///
/// Dropping the handle keeps the effect alive; call
/// [`Subscription::unsubscribe`] to stop it. The handle holds the store
/// weakly and does nothing once the store is gone.
#[derive(Debug, Clone)]
pub struct Subscription {
    store: Weak<StoreInner>,
    listener: ListenerId,
}

impl Subscription {
    /// Stop the effect. Takes effect immediately, including for a pass
    /// currently in progress: the effect is not run again, and every
    /// publisher it read forgets it.
    pub fn unsubscribe(&self) {
        if let Some(store) = self.store.upgrade().map(Store::from_inner) {
            if store.registry(|r| r.remove_listener(self.listener)) {
                debug!(store = store.id(), listener = %self.listener, "effect unsubscribed");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .map(Store::from_inner)
            .is_some_and(|store| store.registry(|r| r.has_listener(self.listener)))
    }

    pub(crate) fn listener(&self) -> ListenerId {
        self.listener
    }
}

impl Store {
    /// Register an effect and run its first pass.
    pub fn subscribe<E: Effect>(&self, effect: E) -> Subscription {
        self.transaction(|| {
            let effect: Arc<dyn Effect> = Arc::new(effect);
            let listener = self.registry(|r| r.insert_listener(Listener::effect(Arc::clone(&effect))));
            debug!(store = self.id(), listener = %listener, "effect registered");
            effect.init(&Get::tracked(self, listener));
            Subscription {
                store: Arc::downgrade(self.inner()),
                listener,
            }
        })
    }

    /// Register a closure as an effect.
    pub fn effect<F>(&self, effect: F) -> Subscription
    where
        F: Fn(&Get<'_>) + Send + Sync + 'static,
    {
        self.subscribe(effect)
    }
}

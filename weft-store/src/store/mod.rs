//! Store
//!
//! The store is the runtime that owns every publisher and listener. Tokens
//! are only descriptions; the first time one is read or written in a store,
//! the store creates the matching publisher and keeps it for its lifetime.
//!
//! # How It Works
//!
//! 1. Reads resolve a token to its publisher, instantiating it on demand.
//!    Reads made through a tracking [`Get`] subscribe the running listener.
//!
//! 2. Writes go through the container's accept chain: hooks first, then the
//!    reducer. A changed value starts a propagation pass.
//!
//! 3. A pass marks every affected listener before anything runs, then runs
//!    each listener once, after all of its marked inputs have settled.
//!
//! # Thread Safety
//!
//! A store is `Send + Sync` and cheap to clone. Every public entry point
//! takes the store's reentrant lock for its whole run, so a dispatch and
//! everything it triggers happen as one transaction, and nested calls made
//! from reducers, hooks, effects and managers on the same thread re-enter
//! freely. Async work that reports back from another thread waits for the
//! current transaction to finish.

mod accept;
mod command;
mod effect;
mod get;
mod hooks;
mod propagate;
mod registry;
mod resolve;

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::debug;

use crate::config::{Snapshot, StoreConfig};
use crate::dispatch::dispatch_message;
use crate::error::StoreResult;
use crate::graph::PublisherId;
use crate::message::StoreMessage;
use crate::token::{Container, HasMeta, MetaState, State, Supplied};
use crate::value::StateValue;

pub(crate) use accept::Reduce;
pub use command::{CommandActions, CommandManager};
pub use effect::{Effect, Subscription};
pub use get::Get;
pub use hooks::{ContainerHooks, WriteActions};
pub(crate) use registry::Registry;

/// A reactive state store.
///
/// Clones share the same state. Independent stores never share publishers,
/// even for the same tokens.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    config: StoreConfig,
    state: ReentrantMutex<RefCell<Registry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store, seeding id-bearing tokens from the config's snapshot.
    pub fn with_config(config: StoreConfig) -> Self {
        let registry = Registry::new(&config.snapshot);
        debug!(store = %config.id, seeds = config.snapshot.len(), "store created");
        Self {
            inner: Arc::new(StoreInner {
                config,
                state: ReentrantMutex::new(RefCell::new(registry)),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<StoreInner> {
        &self.inner
    }

    /// Run `f` with the registry borrowed. `f` must not call back into the
    /// store.
    pub(crate) fn registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let guard = self.inner.state.lock();
        let mut registry = guard.borrow_mut();
        f(&mut registry)
    }

    /// Run `f` holding the store lock, so nothing from another thread
    /// interleaves with it.
    pub(crate) fn transaction<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.state.lock();
        f()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read the current value of any token without subscribing.
    pub fn read<S: State>(&self, token: &S) -> StoreResult<S::Value> {
        self.transaction(|| Get::untracked(self).try_get(token))
    }

    /// Number of live subscriptions on a token's publisher.
    pub fn subscriber_count<S: State>(&self, token: &S) -> StoreResult<usize> {
        self.transaction(|| {
            let publisher = self.resolve(token)?;
            Ok(self.registry(|r| r.live_subscribers(publisher)))
        })
    }

    /// Serialize every id-bearing container and supplied token that has a
    /// publisher in this store.
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        self.registry(|r| r.snapshot())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Interpret a message. Returns once every write it made has
    /// propagated.
    pub fn dispatch(&self, message: StoreMessage) -> StoreResult<()> {
        self.transaction(|| dispatch_message(self, message))
    }

    /// Send `message` to a container through its hooks and reducer.
    pub fn write<T, M, E>(&self, container: &Container<T, M, E>, message: M) -> StoreResult<()>
    where
        T: StateValue,
        M: Send + 'static,
        E: Send + Sync + 'static,
    {
        self.transaction(|| {
            let target = self.resolve(container)?;
            let accept = self.registry(|r| r.accept_of(target))?;
            accept.accept(self, target, Box::new(message))
        })
    }

    /// Write the message `generate` builds from the container's current
    /// value.
    pub fn update<T, M, E, F>(&self, container: &Container<T, M, E>, generate: F) -> StoreResult<()>
    where
        T: StateValue,
        M: Send + 'static,
        E: Send + Sync + 'static,
        F: FnOnce(&T) -> M,
    {
        self.transaction(|| {
            let current = self.read(container)?;
            self.write(container, generate(&current))
        })
    }

    /// Put a container back to its initial value without running its
    /// reducer or hooks.
    pub fn reset<T, M, E>(&self, container: &Container<T, M, E>) -> StoreResult<()>
    where
        T: StateValue,
        M: Send + 'static,
        E: Send + Sync + 'static,
    {
        self.transaction(|| {
            let target = self.resolve(container)?;
            let initial = self.registry(|r| r.initial_of(target))?;
            self.publish(target, initial)?;
            self.settle_meta(target)
        })
    }

    /// Publish a value for a supplied token and mark its meta channel ok.
    pub fn supply<T, M, E>(&self, token: &Supplied<T, M, E>, value: T) -> StoreResult<()>
    where
        T: StateValue,
        M: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.transaction(|| {
            let target = self.resolve(token)?;
            self.publish(target, Box::new(value))?;
            self.settle_meta(target)
        })
    }

    /// Mark a token's work as in flight for `message`.
    pub fn pending<S: HasMeta>(&self, token: &S, message: S::Message) -> StoreResult<()> {
        self.set_meta(token, MetaState::Pending { message })
    }

    /// Mark a token's work for `message` as failed with `reason`.
    pub fn error<S: HasMeta>(
        &self,
        token: &S,
        message: S::Message,
        reason: S::Error,
    ) -> StoreResult<()> {
        self.set_meta(token, MetaState::Error { message, reason })
    }

    fn set_meta<S: HasMeta>(
        &self,
        token: &S,
        state: MetaState<S::Message, S::Error>,
    ) -> StoreResult<()> {
        self.transaction(|| {
            let target = self.resolve(&token.meta())?;
            self.publish(target, Box::new(state)).map(|_| ())
        })
    }

    /// Return the meta channel of `parent` to ok, if it has one.
    pub(crate) fn settle_meta(&self, parent: PublisherId) -> StoreResult<()> {
        if let Some((meta, ok)) = self.registry(|r| r.meta_of(parent)) {
            self.publish(meta, ok)?;
        }
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Store");
        debug.field("id", &self.id());
        // Formatting must not deadlock when another thread holds the store.
        let counts = self.inner.state.try_lock().and_then(|guard| {
            let registry = guard.try_borrow().ok()?;
            Some((registry.publisher_count(), registry.listener_count()))
        });
        match counts {
            Some((publishers, listeners)) => debug
                .field("publishers", &publishers)
                .field("listeners", &listeners),
            None => debug.field("state", &"<busy>"),
        };
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::write;
    use crate::token::Derived;

    #[test]
    fn store_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Store>();
    }

    #[test]
    fn clones_share_state() {
        let store = Store::new();
        let count = Container::new(0);
        let other = store.clone();

        other.write(&count, 3).unwrap();
        assert_eq!(store.read(&count).unwrap(), 3);
    }

    #[test]
    fn reset_skips_reducer() {
        let store = Store::new();
        let count = Container::<i32, i32>::with_reducer(1, |delta, current| {
            crate::Reduction::new(current + delta)
        });

        store.dispatch(write(&count, 4)).unwrap();
        assert_eq!(store.read(&count).unwrap(), 5);

        store.reset(&count).unwrap();
        assert_eq!(store.read(&count).unwrap(), 1);
    }

    #[test]
    fn update_reads_current_value() {
        let store = Store::new();
        let count = Container::new(2);

        store.update(&count, |current| current * 10).unwrap();
        assert_eq!(store.read(&count).unwrap(), 20);
    }

    #[test]
    fn pending_and_error_set_meta() {
        let store = Store::new();
        let user = Supplied::new(String::new()).with_meta::<u32, String>();

        store.pending(&user, 7).unwrap();
        assert_eq!(
            store.read(&user.meta()).unwrap(),
            MetaState::Pending { message: 7 }
        );

        store.error(&user, 7, "offline".to_string()).unwrap();
        assert!(store.read(&user.meta()).unwrap().is_error());

        store.supply(&user, "ada".to_string()).unwrap();
        assert!(store.read(&user.meta()).unwrap().is_ok());
        assert_eq!(store.read(&user).unwrap(), "ada");
    }

    #[test]
    fn debug_reports_counts() {
        let store = Store::new();
        let count = Container::new(1);
        let doubled = {
            let count = count.clone();
            Derived::new(move |get| get.get(&count) * 2)
        };
        store.read(&doubled).unwrap();

        let debug = format!("{store:?}");
        assert!(debug.contains("publishers: 2"), "{debug}");
        assert!(debug.contains("listeners: 1"), "{debug}");
    }
}

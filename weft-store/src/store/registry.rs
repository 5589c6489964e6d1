//! Registry
//!
//! The registry is the store's only mutable structure: the publisher and
//! listener arenas, the identity map from tokens to publishers, the id alias
//! table, hydration seeds, command managers and the passes in progress. It never calls user code, so
//! the store can borrow it for short bookkeeping sections between user
//! callbacks.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use crate::config::Snapshot;
use crate::error::{StoreError, StoreResult};
use crate::graph::{
    Accept, Arena, Edges, Listener, ListenerBody, ListenerId, Pass, Publisher, PublisherId, Ready,
    Role,
};
use crate::token::{Facet, TokenInfo, TokenKey};
use crate::value::{BoxedValue, StateValue};
use crate::Store;

/// Installs hooks on a container's publisher once it exists.
pub(crate) type Install = Box<dyn FnOnce(&Store, PublisherId) -> StoreResult<()> + Send>;

/// Outcome of looking a token up.
pub(crate) enum Lookup {
    Ready(PublisherId),
    /// The publisher is reserved: its value is still being computed.
    Instantiating,
    /// Not created yet; carries the canonical key to register it under.
    Missing(TokenKey),
}

/// What the run phase should do with a listener that became ready.
pub(crate) enum Step {
    Skip,
    /// Settle the listener's derived publisher without running it; the flag
    /// says whether it changed.
    Forward(PublisherId, bool),
    Run(ListenerBody),
}

pub(crate) struct Registry {
    publishers: Arena<Publisher>,
    listeners: Arena<Listener>,
    tokens: HashMap<(TokenKey, Facet), PublisherId>,
    aliases: HashMap<Arc<str>, TokenKey>,
    seeds: HashMap<String, serde_json::Value>,
    managers: HashMap<TokenKey, Box<dyn Any + Send + Sync>>,
    triggers: HashMap<TokenKey, ListenerId>,
    /// Hooks attached before their container's publisher was created.
    deferred: HashMap<TokenKey, Vec<Install>>,
    pass_count: u64,
    /// Passes still propagating, innermost last.
    active: Vec<Pass>,
}

impl Registry {
    pub fn new(snapshot: &Snapshot) -> Self {
        Self {
            publishers: Arena::new(),
            listeners: Arena::new(),
            tokens: HashMap::new(),
            aliases: HashMap::new(),
            seeds: snapshot
                .iter()
                .map(|(id, value)| (id.to_string(), value.clone()))
                .collect(),
            managers: HashMap::new(),
            triggers: HashMap::new(),
            deferred: HashMap::new(),
            pass_count: 0,
            active: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// The key a token is registered under. Tokens with an id resolve to the
    /// key of the first token seen with that id.
    pub fn canonical(&mut self, info: &TokenInfo) -> TokenKey {
        match &info.id {
            Some(id) => *self.aliases.entry(Arc::clone(id)).or_insert(info.key),
            None => info.key,
        }
    }

    pub fn lookup(&mut self, info: &TokenInfo, facet: Facet) -> Lookup {
        let key = self.canonical(info);
        match self.tokens.get(&(key, facet)) {
            Some(&id) if self.publishers.is_reserved(id) => Lookup::Instantiating,
            Some(&id) => Lookup::Ready(id),
            None => Lookup::Missing(key),
        }
    }

    pub fn reserve(&mut self, key: TokenKey, facet: Facet) -> PublisherId {
        let id = self.publishers.reserve();
        self.tokens.insert((key, facet), id);
        id
    }

    pub fn fill(&mut self, id: PublisherId, publisher: Publisher) {
        self.publishers.fill(id, publisher);
    }

    /// Take the snapshot value for an id-bearing token, if there is one. A
    /// seed that fails to decode stays in place, so every read reports it.
    pub fn take_seed(&mut self, info: &TokenInfo) -> StoreResult<Option<BoxedValue>> {
        let (Some(id), Some(codec)) = (&info.id, &info.codec) else {
            return Ok(None);
        };
        let Some(json) = self.seeds.get(id.as_ref()) else {
            return Ok(None);
        };
        let value = codec
            .decode(json.clone())
            .map_err(|source| StoreError::Hydration {
                id: id.to_string(),
                source,
            })?;
        self.seeds.remove(id.as_ref());
        Ok(Some(value))
    }

    /// Undo a reservation whose publisher was never filled, along with the
    /// listener created for it.
    pub fn release(
        &mut self,
        key: TokenKey,
        facet: Facet,
        id: PublisherId,
        listener: Option<ListenerId>,
    ) {
        if self.tokens.get(&(key, facet)) == Some(&id) {
            self.tokens.remove(&(key, facet));
        }
        self.publishers.release(id);
        if let Some(listener) = listener {
            self.remove_listener(listener);
        }
    }

    // ------------------------------------------------------------------
    // Publishers
    // ------------------------------------------------------------------

    fn publisher(&self, id: PublisherId) -> StoreResult<&Publisher> {
        self.publishers
            .get(id)
            .ok_or_else(|| StoreError::UnknownPublisher {
                publisher: id.to_string(),
            })
    }

    fn publisher_mut(&mut self, id: PublisherId) -> StoreResult<&mut Publisher> {
        self.publishers
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownPublisher {
                publisher: id.to_string(),
            })
    }

    pub fn value_of<T: StateValue>(&self, id: PublisherId) -> StoreResult<T> {
        let publisher = self.publisher(id)?;
        publisher
            .value()
            .as_any()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| StoreError::TypeMismatch {
                token: publisher.label().clone(),
                expected: type_name::<T>(),
            })
    }

    /// Clone of the current value, for handing to a derivation.
    pub fn current(&self, id: PublisherId) -> Option<BoxedValue> {
        self.publishers
            .get(id)
            .map(|publisher| publisher.value().clone_boxed())
    }

    /// Replace a publisher's value; false when it was equal.
    pub fn replace_value(&mut self, id: PublisherId, value: BoxedValue) -> StoreResult<bool> {
        let publisher = self.publisher_mut(id)?;
        let changed = publisher.replace(value);
        trace!(token = %publisher.label(), changed, "publish");
        Ok(changed)
    }

    pub fn accept_of(&self, id: PublisherId) -> StoreResult<Arc<dyn Accept>> {
        let publisher = self.publisher(id)?;
        match publisher.role() {
            Role::Container { accept, .. } => Ok(Arc::clone(accept)),
            _ => Err(StoreError::RoleMismatch {
                token: publisher.label().clone(),
                expected: "container",
            }),
        }
    }

    /// Swap the outermost accept of a container.
    pub fn set_accept(&mut self, id: PublisherId, next: Arc<dyn Accept>) -> StoreResult<()> {
        let publisher = self.publisher_mut(id)?;
        let label = publisher.label().clone();
        match publisher.role_mut() {
            Role::Container { accept, .. } => {
                *accept = next;
                Ok(())
            }
            _ => Err(StoreError::RoleMismatch {
                token: label,
                expected: "container",
            }),
        }
    }

    pub fn initial_of(&self, id: PublisherId) -> StoreResult<BoxedValue> {
        let publisher = self.publisher(id)?;
        match publisher.role() {
            Role::Container { initial, .. } => Ok(initial.clone_boxed()),
            _ => Err(StoreError::RoleMismatch {
                token: publisher.label().clone(),
                expected: "container",
            }),
        }
    }

    /// The meta publisher of `parent`, if it was ever created, with the
    /// value that marks it ok.
    pub fn meta_of(&self, parent: PublisherId) -> Option<(PublisherId, BoxedValue)> {
        let key = self.publishers.get(parent)?.key();
        let id = *self.tokens.get(&(key, Facet::Meta))?;
        match self.publishers.get(id)?.role() {
            Role::Meta { ok } => Some((id, ok())),
            _ => None,
        }
    }

    /// Snapshot of every id-bearing container and supplied publisher.
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        let mut snapshot = Snapshot::new();
        for (_, publisher) in self.publishers.iter() {
            if !matches!(publisher.role(), Role::Container { .. } | Role::Supplied) {
                continue;
            }
            let (Some(id), Some(codec)) = (publisher.label().id(), publisher.codec()) else {
                continue;
            };
            if let Some(json) = codec.encode(publisher.value()) {
                snapshot.push(id.to_string(), json?);
            }
        }
        Ok(snapshot)
    }

    pub fn publisher_count(&self) -> usize {
        self.publishers.len()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn insert_listener(&mut self, listener: Listener) -> ListenerId {
        self.listeners.insert(listener)
    }

    /// Remove a listener and its entries on every publisher it read.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let Some(listener) = self.listeners.remove(id) else {
            return false;
        };
        for source in listener.sources() {
            if let Some(publisher) = self.publishers.get_mut(source) {
                publisher.remove_listener(id);
            }
        }
        true
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.get(id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Subscribe `listener` to `publisher` at the listener's live version.
    pub fn subscribe(&mut self, publisher: PublisherId, listener: ListenerId) {
        let (Some(entry), Some(target)) = (
            self.listeners.get_mut(listener),
            self.publishers.get_mut(publisher),
        ) else {
            return;
        };
        target.add_listener(listener, entry.version());
        entry.add_source(publisher);
    }

    /// Subscriptions of `publisher` whose listener is live at the
    /// remembered version.
    pub fn live_subscribers(&self, publisher: PublisherId) -> usize {
        self.publishers.get(publisher).map_or(0, |publisher| {
            publisher
                .listeners()
                .filter(|(listener, version)| {
                    self.listeners
                        .get(*listener)
                        .is_some_and(|live| live.version() == *version)
                })
                .count()
        })
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    #[cfg(test)]
    pub fn subscription_entries(&self, publisher: PublisherId) -> usize {
        self.publishers
            .get(publisher)
            .map_or(0, |publisher| publisher.listeners().count())
    }

    pub fn next_pass(&mut self) -> Pass {
        self.pass_count += 1;
        Pass::new(self.pass_count)
    }

    /// Mark the cone of `source` in a new pass and make it active.
    pub fn begin_pass(&mut self, source: PublisherId) -> u64 {
        let mut pass = self.next_pass();
        self.mark(&mut pass, source);
        let id = pass.id();
        self.active.push(pass);
        id
    }

    /// Retire an active pass, returning it for inspection.
    pub fn end_pass(&mut self, pass: u64) -> Option<Pass> {
        let index = self.active.iter().rposition(|active| active.id() == pass)?;
        Some(self.active.remove(index))
    }

    fn active_mut(&mut self, pass: u64) -> Option<&mut Pass> {
        self.active.iter_mut().rev().find(|active| active.id() == pass)
    }

    pub fn take_edges(&mut self, pass: u64, publisher: PublisherId) -> Edges {
        self.active_mut(pass)
            .map(|active| active.take_edges(publisher))
            .unwrap_or_default()
    }

    /// Settle one marked edge into `listener` and decide what to do with it
    /// once it is ready.
    pub fn settle(&mut self, pass: u64, listener: ListenerId, changed: bool) -> Step {
        let Some(active) = self.active_mut(pass) else {
            return Step::Skip;
        };
        let Some(ready) = active.settle(listener, changed) else {
            return Step::Skip;
        };
        if let Some(changed) = active.take_pulled(listener) {
            return self
                .listeners
                .get(listener)
                .and_then(Listener::derived_publisher)
                .map_or(Step::Skip, |publisher| Step::Forward(publisher, changed));
        }
        self.claim(listener, ready)
    }

    /// Claim a derived publisher for recomputation ahead of its turn, when
    /// its listener is still marked in an active pass. Bumps the listener
    /// like a normal run.
    pub fn pull(&mut self, publisher: PublisherId) -> Option<(ListenerId, ListenerBody)> {
        let listener = match self.publishers.get(publisher)?.role() {
            Role::Derived { listener } => *listener,
            _ => return None,
        };
        let mut claimed = false;
        for pass in &mut self.active {
            claimed |= pass.pull(listener);
        }
        if !claimed {
            return None;
        }
        let entry = self.listeners.get_mut(listener)?;
        entry.bump();
        trace!(listener = %listener, "pulling marked derivation");
        Some((listener, entry.body().clone()))
    }

    pub fn record_pull(&mut self, listener: ListenerId, changed: bool) {
        for pass in &mut self.active {
            pass.record_pull(listener, changed);
        }
    }

    /// Mark phase: mark every live listener of `source`, then the cones of
    /// the derived ones. Stale entries are dropped from `source`.
    pub fn mark(&mut self, pass: &mut Pass, source: PublisherId) {
        let Some(publisher) = self.publishers.get(source) else {
            return;
        };
        let subscribed: SmallVec<[(ListenerId, u64); 8]> = publisher.listeners().collect();

        let mut stale = SmallVec::<[ListenerId; 4]>::new();
        let mut cone = SmallVec::<[PublisherId; 4]>::new();
        for (listener, remembered) in subscribed {
            match self.listeners.get(listener) {
                Some(live) if live.version() == remembered => {
                    if pass.mark(source, listener, remembered) {
                        cone.extend(live.derived_publisher());
                    }
                }
                _ => stale.push(listener),
            }
        }

        if !stale.is_empty() {
            if let Some(publisher) = self.publishers.get_mut(source) {
                trace!(token = %publisher.label(), dropped = stale.len(), "dropping stale listeners");
                for listener in stale {
                    publisher.remove_listener(listener);
                }
            }
        }

        for derived in cone {
            self.mark(pass, derived);
        }
    }

    /// Decide what to do with a ready listener. Running it bumps its version
    /// first, so everything it subscribed to before goes stale.
    pub fn claim(&mut self, listener: ListenerId, ready: Ready) -> Step {
        let Some(entry) = self.listeners.get_mut(listener) else {
            return Step::Skip;
        };
        // Clean, or already re-run by a nested pass since it was marked.
        if !ready.dirty || entry.version() != ready.version {
            return entry
                .derived_publisher()
                .map_or(Step::Skip, |publisher| Step::Forward(publisher, false));
        }
        entry.bump();
        Step::Run(entry.body().clone())
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn set_manager(&mut self, key: TokenKey, manager: Box<dyn Any + Send + Sync>) {
        self.managers.insert(key, manager);
    }

    pub fn manager(&self, key: TokenKey) -> Option<&(dyn Any + Send + Sync)> {
        self.managers.get(&key).map(Box::as_ref)
    }

    pub fn set_trigger(&mut self, key: TokenKey, listener: ListenerId) -> Option<ListenerId> {
        self.triggers.insert(key, listener)
    }

    pub fn take_trigger(&mut self, key: TokenKey) -> Option<ListenerId> {
        self.triggers.remove(&key)
    }

    // ------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------

    pub fn defer_hooks(&mut self, key: TokenKey, install: Install) {
        self.deferred.entry(key).or_default().push(install);
    }

    /// Hooks waiting for `key`'s publisher, in attach order.
    pub fn take_hooks(&mut self, key: TokenKey) -> Vec<Install> {
        self.deferred.remove(&key).unwrap_or_default()
    }
}

//! Publisher instantiation.

use std::sync::Arc;

use tracing::debug;

use super::registry::Lookup;
use crate::error::{StoreError, StoreResult};
use crate::graph::{Listener, ListenerId, Publisher, PublisherId, Role};
use crate::token::{Facet, Recipe, State, TokenKey};
use crate::{Get, Store};

impl Store {
    /// The publisher for `token`, created on first access.
    pub(crate) fn resolve<S: State>(&self, token: &S) -> StoreResult<PublisherId> {
        let facet = token.facet();
        match self.registry(|r| r.lookup(token.info(), facet)) {
            Lookup::Ready(id) => Ok(id),
            Lookup::Instantiating => Err(StoreError::Cycle {
                token: token.label(),
            }),
            Lookup::Missing(key) => self.instantiate(token, key, facet),
        }
    }

    /// Build a publisher from the token's recipe. The slot is reserved
    /// before a derivation runs, so a derivation reaching its own token
    /// fails with a cycle error instead of recursing. A derivation that
    /// panics gives the reservation back, and the next read tries again.
    fn instantiate<S: State>(
        &self,
        token: &S,
        key: TokenKey,
        facet: Facet,
    ) -> StoreResult<PublisherId> {
        let info = token.info();
        let (id, seed) = self.registry(|r| -> StoreResult<_> {
            let seed = match facet {
                Facet::Value => r.take_seed(info)?,
                Facet::Meta => None,
            };
            Ok((r.reserve(key, facet), seed))
        })?;
        let mut reservation = Reservation {
            store: self,
            key,
            facet,
            id,
            listener: None,
            filled: false,
        };

        let (value, role) = match token.recipe() {
            Recipe::Constant(value) => (value, Role::Constant),
            Recipe::Container { initial, accept } => (
                seed.unwrap_or_else(|| initial.clone_boxed()),
                Role::Container { initial, accept },
            ),
            Recipe::Supplied(initial) => (seed.unwrap_or(initial), Role::Supplied),
            Recipe::Meta { ok } => (ok(), Role::Meta { ok }),
            Recipe::Derived(derive) => {
                let listener =
                    self.registry(|r| r.insert_listener(Listener::derive(id, Arc::clone(&derive))));
                reservation.listener = Some(listener);
                let value = derive(&Get::tracked(self, listener), None);
                (value, Role::Derived { listener })
            }
        };

        let label = token.label();
        let codec = match facet {
            Facet::Value => info.codec,
            Facet::Meta => None,
        };
        let publisher = Publisher::new(key, label, value, role, codec);
        debug!(store = self.id(), publisher = ?publisher, "registered publisher");
        self.registry(|r| r.fill(id, publisher));
        reservation.filled = true;

        if matches!(facet, Facet::Value) {
            for install in self.registry(|r| r.take_hooks(key)) {
                install(self, id)?;
            }
        }
        Ok(id)
    }
}

/// Releases a reserved publisher slot unless instantiation reached `fill`.
struct Reservation<'a> {
    store: &'a Store,
    key: TokenKey,
    facet: Facet,
    id: PublisherId,
    listener: Option<ListenerId>,
    filled: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.filled {
            return;
        }
        debug!(store = self.store.id(), publisher = %self.id, "releasing unfilled publisher");
        self.store
            .registry(|r| r.release(self.key, self.facet, self.id, self.listener));
    }
}

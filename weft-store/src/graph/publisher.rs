//! Publishers
//!
//! A publisher is the runtime counterpart of a token: it holds the current
//! value and the set of listeners subscribed to it. Each listener entry
//! remembers the listener's version at subscription time; an entry whose
//! version no longer matches the live listener is stale and is dropped on
//! the next notification rather than notified.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;

use super::listener::ListenerId;
use super::Id;
use crate::error::StoreResult;
use crate::token::{TokenKey, TokenLabel};
use crate::value::{AnyValue, BoxedValue, Codec};
use crate::Store;

pub type PublisherId = Id<Publisher>;

/// Entry point for writes to a container.
///
/// The base implementation runs the container's reducer; hooks wrap it as
/// decorators, so the publisher only ever sees the outermost `Accept`.
pub trait Accept: Send + Sync {
    fn accept(
        &self,
        store: &Store,
        target: PublisherId,
        message: Box<dyn Any + Send>,
    ) -> StoreResult<()>;
}

/// What kind of token a publisher serves.
pub enum Role {
    Constant,
    Container {
        initial: BoxedValue,
        accept: Arc<dyn Accept>,
    },
    Supplied,
    Meta {
        ok: fn() -> BoxedValue,
    },
    Derived {
        listener: ListenerId,
    },
}

impl Role {
    fn name(&self) -> &'static str {
        match self {
            Role::Constant => "constant",
            Role::Container { .. } => "container",
            Role::Supplied => "supplied",
            Role::Meta { .. } => "meta",
            Role::Derived { .. } => "derived",
        }
    }
}

pub struct Publisher {
    /// Canonical key of the token this publisher serves.
    key: TokenKey,
    label: TokenLabel,
    value: BoxedValue,
    listeners: IndexMap<ListenerId, u64>,
    role: Role,
    codec: Option<Codec>,
}

impl Publisher {
    pub fn new(
        key: TokenKey,
        label: TokenLabel,
        value: BoxedValue,
        role: Role,
        codec: Option<Codec>,
    ) -> Self {
        Self {
            key,
            label,
            value,
            listeners: IndexMap::new(),
            role,
            codec,
        }
    }

    pub fn key(&self) -> TokenKey {
        self.key
    }

    pub fn label(&self) -> &TokenLabel {
        &self.label
    }

    pub fn value(&self) -> &dyn AnyValue {
        self.value.as_ref()
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn role_mut(&mut self) -> &mut Role {
        &mut self.role
    }

    pub fn codec(&self) -> Option<&Codec> {
        self.codec.as_ref()
    }

    /// Replace the value. Returns false, leaving the value untouched, when
    /// the new value equals the current one.
    pub fn replace(&mut self, value: BoxedValue) -> bool {
        if self.value.same_as(value.as_ref()) {
            return false;
        }
        self.value = value;
        true
    }

    /// Record `listener` at `version`. Re-subscribing keeps the entry's
    /// position and refreshes the remembered version.
    pub fn add_listener(&mut self, listener: ListenerId, version: u64) {
        self.listeners.insert(listener, version);
    }

    pub fn remove_listener(&mut self, listener: ListenerId) {
        self.listeners.shift_remove(&listener);
    }

    /// Subscribed listeners with their remembered versions, in subscription
    /// order.
    pub fn listeners(&self) -> impl Iterator<Item = (ListenerId, u64)> + '_ {
        self.listeners
            .iter()
            .map(|(listener, version)| (*listener, *version))
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("token", &self.label.to_string())
            .field("role", &self.role.name())
            .field("listener_count", &self.listeners.len())
            .finish()
    }
}

//! Tokens
//!
//! A token is a plain descriptor naming a piece of state or a command. It
//! owns no runtime state: the [`Store`](crate::Store) creates the matching
//! publisher lazily the first time the token is read or subscribed to.
//!
//! # Identity
//!
//! Every token gets a process-unique [`TokenKey`] when it is constructed;
//! clones share the key. A token may also carry a stable `id`. Tokens that
//! share an `id` resolve to one publisher even when they were built
//! separately, which is what lets per-item tokens minted on every render, or
//! tokens rebuilt on the client after server rendering, find their state.
//!
//! # Kinds
//!
//! - [`Constant`]: fixed value, never notifies.
//! - [`Container`]: mutable value with an optional reducer.
//! - [`Derived`]: pure function of other tokens.
//! - [`Supplied`]: value provided by external (usually async) work.
//! - [`Meta`]: ok/pending/error status channel of a container or supplied
//!   token.
//! - [`Command`]: valueless sink for intents handled by a command manager.

mod command;
mod meta;
mod state;

pub use command::Command;
pub use meta::{HasMeta, Meta, MetaState};
pub use state::{Constant, Container, Derived, Reduction, Supplied};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::value::StateValue;

pub(crate) use sealed::{Facet, Recipe, Seal, TokenInfo};

/// Process-unique identity of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenKey(u64);

impl TokenKey {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Diagnostic name of a token, used in logs and errors.
///
/// Displays the token's `name`, else its `id`, else its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenLabel {
    key: TokenKey,
    id: Option<Arc<str>>,
    name: Option<Arc<str>>,
    meta: bool,
}

impl TokenLabel {
    pub fn key(&self) -> TokenKey {
        self.key
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for TokenLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.id) {
            (Some(name), _) => f.write_str(name)?,
            (None, Some(id)) => f.write_str(id)?,
            (None, None) => write!(f, "{}", self.key)?,
        }
        if self.meta {
            f.write_str(".meta")?;
        }
        Ok(())
    }
}

/// A token whose value can be read through [`Get`](crate::Get) and
/// [`Store::read`](crate::Store::read).
///
/// Sealed: the store knows how to instantiate exactly the token kinds this
/// crate defines.
pub trait State: sealed::Seal + Clone + Send + Sync + 'static {
    type Value: StateValue;

    fn label(&self) -> TokenLabel {
        self.info().label(self.facet() == Facet::Meta)
    }
}

pub(crate) mod sealed {
    use std::sync::Arc;

    use super::{TokenKey, TokenLabel};
    use crate::graph::{Accept, DeriveFn};
    use crate::value::{BoxedValue, Codec};

    /// Which publisher of a token is addressed: its value or its meta channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Facet {
        Value,
        Meta,
    }

    /// Identity data shared by every token kind.
    #[derive(Debug, Clone)]
    pub struct TokenInfo {
        pub key: TokenKey,
        pub id: Option<Arc<str>>,
        pub name: Option<Arc<str>>,
        pub codec: Option<Codec>,
    }

    impl TokenInfo {
        pub fn new() -> Self {
            Self {
                key: TokenKey::next(),
                id: None,
                name: None,
                codec: None,
            }
        }

        pub fn label(&self, meta: bool) -> TokenLabel {
            TokenLabel {
                key: self.key,
                id: self.id.clone(),
                name: self.name.clone(),
                meta,
            }
        }
    }

    /// How to build the publisher for a token on first access.
    pub enum Recipe {
        Constant(BoxedValue),
        Container {
            initial: BoxedValue,
            accept: Arc<dyn Accept>,
        },
        Supplied(BoxedValue),
        Meta {
            ok: fn() -> BoxedValue,
        },
        Derived(DeriveFn),
    }

    pub trait Seal {
        fn info(&self) -> &TokenInfo;

        fn facet(&self) -> Facet {
            Facet::Value
        }

        fn recipe(&self) -> Recipe;
    }
}

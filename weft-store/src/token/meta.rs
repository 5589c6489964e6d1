//! Meta channels.
//!
//! Every container and supplied token has a status channel next to its
//! value. It starts out `Ok`, is moved to `Pending` or `Error` by command
//! managers and write hooks, and falls back to `Ok` whenever the parent
//! accepts a write or receives a supplied value.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::sealed::{Facet, Recipe, Seal, TokenInfo};
use super::{Container, State, Supplied};
use crate::value::{BoxedValue, StateValue};

/// Status of a container or supplied token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetaState<M, E> {
    Ok,
    Pending { message: M },
    Error { message: M, reason: E },
}

impl<M, E> MetaState<M, E> {
    pub fn is_ok(&self) -> bool {
        matches!(self, MetaState::Ok)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MetaState::Pending { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MetaState::Error { .. })
    }
}

/// Token for the meta channel of another token.
pub struct Meta<M, E> {
    parent: TokenInfo,
    _types: PhantomData<fn() -> (M, E)>,
}

impl<M: StateValue, E: StateValue> Meta<M, E> {
    pub(crate) fn of(parent: &TokenInfo) -> Self {
        Self {
            parent: parent.clone(),
            _types: PhantomData,
        }
    }
}

impl<M, E> Clone for Meta<M, E> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            _types: PhantomData,
        }
    }
}

fn ok_state<M: StateValue, E: StateValue>() -> BoxedValue {
    Box::new(MetaState::<M, E>::Ok)
}

impl<M: StateValue, E: StateValue> Seal for Meta<M, E> {
    fn info(&self) -> &TokenInfo {
        &self.parent
    }

    fn facet(&self) -> Facet {
        Facet::Meta
    }

    fn recipe(&self) -> Recipe {
        Recipe::Meta {
            ok: ok_state::<M, E>,
        }
    }
}

impl<M: StateValue, E: StateValue> State for Meta<M, E> {
    type Value = MetaState<M, E>;
}

/// A token with a meta channel.
pub trait HasMeta: State {
    type Message: StateValue;
    type Error: StateValue;

    fn meta(&self) -> Meta<Self::Message, Self::Error>;
}

impl<T: StateValue, M: StateValue, E: StateValue> HasMeta for Container<T, M, E> {
    type Message = M;
    type Error = E;

    fn meta(&self) -> Meta<M, E> {
        Container::meta(self)
    }
}

impl<T: StateValue, M: StateValue, E: StateValue> HasMeta for Supplied<T, M, E> {
    type Message = M;
    type Error = E;

    fn meta(&self) -> Meta<M, E> {
        Supplied::meta(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_state_serializes_with_type_tag() {
        let pending: MetaState<u32, String> = MetaState::Pending { message: 7 };
        assert_eq!(
            serde_json::to_value(&pending).unwrap(),
            serde_json::json!({ "type": "pending", "message": 7 })
        );

        let error: MetaState<u32, String> = MetaState::Error {
            message: 7,
            reason: "offline".into(),
        };
        assert!(error.is_error());
        assert!(!error.is_pending());

        let ok: MetaState<u32, String> = serde_json::from_value(serde_json::json!({ "type": "ok" })).unwrap();
        assert!(ok.is_ok());
    }

    #[test]
    fn meta_shares_parent_identity() {
        let count = Container::new(0).with_id("count");
        let meta = count.meta();
        assert_eq!(meta.info().key, count.info().key);
        assert_eq!(meta.facet(), Facet::Meta);
    }
}

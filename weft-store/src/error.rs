//! Store errors.
//!
//! Everything here is a programmer error: a dispatch that fails does so
//! deterministically and loudly. Soft conditions (a command without a
//! manager, a stale listener) are logged instead and never reach this type,
//! and application-level failures travel through [`MetaState`] values.
//!
//! [`MetaState`]: crate::MetaState

use thiserror::Error;

use crate::token::TokenLabel;

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The publisher behind a token holds a value of another type.
    ///
    /// Happens when two tokens of different value types share an `id`.
    #[error("state `{token}` does not hold a `{expected}`")]
    TypeMismatch {
        token: TokenLabel,
        expected: &'static str,
    },

    /// A message or command payload did not match the target's message type.
    #[error("`{token}` does not accept messages of type `{expected}`")]
    MessageMismatch {
        token: TokenLabel,
        expected: &'static str,
    },

    /// A derivation reached its own token while it was being instantiated.
    #[error("dependency cycle while instantiating `{token}`")]
    Cycle { token: TokenLabel },

    /// A token resolved to a publisher of another kind, e.g. a container
    /// and a supplied token sharing an `id`.
    #[error("`{token}` is not a {expected}")]
    RoleMismatch {
        token: TokenLabel,
        expected: &'static str,
    },

    /// A publisher index no longer resolves in the registry.
    #[error("publisher {publisher} is not registered")]
    UnknownPublisher { publisher: String },

    /// A snapshot entry could not be decoded into the token's value type.
    #[error("failed to hydrate `{id}` from snapshot")]
    Hydration {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Encoding or decoding a snapshot failed.
    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Result alias used throughout the store.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Container;
    use crate::token::State;

    #[test]
    fn messages_name_the_token() {
        let count = Container::new(0).named("count");
        let err = StoreError::TypeMismatch {
            token: count.label(),
            expected: "alloc::string::String",
        };
        assert_eq!(
            err.to_string(),
            "state `count` does not hold a `alloc::string::String`"
        );

        let err = StoreError::Cycle {
            token: count.label(),
        };
        assert!(err.to_string().contains("`count`"));
    }

    #[test]
    fn snapshot_errors_convert_from_serde() {
        let source = serde_json::from_str::<serde_json::Value>("[1,").unwrap_err();
        let err: StoreError = source.into();
        assert!(matches!(err, StoreError::Snapshot(_)));
    }
}

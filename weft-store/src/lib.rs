//! Weft Store
//!
//! This crate provides the state store of the Weft UI library. It
//! implements:
//!
//! - State tokens: constants, containers with reducers, derived values and
//!   externally supplied values, each with an optional status channel
//! - A glitch-free propagation engine over a dynamic dependency graph
//! - Message dispatch with batching and reducer follow-ups
//! - Write hooks and command managers for side effects and async work
//! - Snapshots for server-side rendering and client hydration
//!
//! Tokens are plain descriptions and can be declared anywhere, including in
//! statics. A [`Store`] creates the runtime state for a token the first
//! time the token is used in it, so one set of tokens can back any number
//! of independent stores.
//!
//! # Architecture
//!
//! - `token`: the token kinds and their meta channels
//! - `graph`: publishers, listeners and propagation bookkeeping
//! - `store`: the runtime tying them together, plus effects, hooks and
//!   command managers
//! - `message`: the messages the store dispatches
//! - `config`: store configuration and snapshots
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use weft_store::{batch, write, Container, Derived, Store};
//!
//! let count = Container::new(1).named("count");
//! let doubled = {
//!     let count = count.clone();
//!     Derived::new(move |get| get.get(&count) * 2)
//! };
//!
//! let store = Store::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let _subscription = {
//!     let (doubled, seen) = (doubled.clone(), Arc::clone(&seen));
//!     store.effect(move |get| seen.lock().unwrap().push(get.get(&doubled)))
//! };
//!
//! store.dispatch(batch([write(&count, 2), write(&count, 5)])).unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec![2, 4, 10]);
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod token;

mod dispatch;
mod graph;
mod store;
mod value;

pub use config::{Snapshot, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use message::{batch, exec, reset, run, update, use_rule, write, StoreMessage};
pub use store::{
    CommandActions, CommandManager, ContainerHooks, Effect, Get, Store, Subscription,
    WriteActions,
};
pub use token::{
    Command, Constant, Container, Derived, HasMeta, Meta, MetaState, Reduction, State, Supplied,
    TokenKey, TokenLabel,
};
pub use value::StateValue;

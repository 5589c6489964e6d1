//! Dependency Graph
//!
//! This module holds the data side of the dependency graph: publishers,
//! listeners, the arena that owns them and the bookkeeping for one
//! propagation pass. The store owns one [`Arena`] of each and drives
//! propagation; nothing here calls user code.
//!
//! # Overview
//!
//! - A [`Publisher`] holds a token's current value and the listeners
//!   subscribed to it, each with the listener version it was subscribed at.
//! - A [`Listener`] is a derivation or an effect. Derived listeners are also
//!   the listener side of their own publisher, which is how the graph
//!   becomes a DAG of arbitrary depth.
//! - Edges live only on the publisher side and are rebuilt by every run, so
//!   the graph's shape can change on each recomputation. Old edges go stale
//!   through the version check instead of being torn down eagerly.
//!
//! # Design Decisions
//!
//! 1. Indices are generation-checked, so a removed listener can never be
//!    confused with whatever later reuses its slot.
//!
//! 2. Propagation state is kept in a [`Pass`], not on the listeners, so a
//!    write issued while another write is still propagating gets its own
//!    independent marks.

mod arena;
mod listener;
mod pass;
mod publisher;

pub use arena::{Arena, Id};
pub use listener::{DeriveFn, Listener, ListenerBody, ListenerId};
pub use pass::{Edges, Pass, Ready};
pub use publisher::{Accept, Publisher, PublisherId, Role};

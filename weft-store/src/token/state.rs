//! State tokens: constants, containers, derived and supplied state.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::sealed::{Recipe, Seal, TokenInfo};
use super::{Meta, State};
use crate::message::StoreMessage;
use crate::store::{Get, Reduce};
use crate::value::{AnyValue, BoxedValue, Codec, StateValue};

/// Result of a container reducer: the next value plus an optional follow-up
/// message, dispatched after the value has been published.
pub struct Reduction<T> {
    pub value: T,
    pub message: Option<StoreMessage>,
}

impl<T> Reduction<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            message: None,
        }
    }

    /// Dispatch `message` once the new value has settled.
    pub fn then(mut self, message: StoreMessage) -> Self {
        self.message = Some(message);
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for Reduction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reduction")
            .field("value", &self.value)
            .field("message", &self.message)
            .finish()
    }
}

pub(crate) type Reducer<T, M> = Arc<dyn Fn(M, &T) -> Reduction<T> + Send + Sync>;

// ----------------------------------------------------------------------------
// Constant
// ----------------------------------------------------------------------------

/// A fixed value. Reading it subscribes to nothing that ever changes.
pub struct Constant<T> {
    info: TokenInfo,
    value: Arc<T>,
}

impl<T: StateValue> Constant<T> {
    pub fn new(value: T) -> Self {
        Self {
            info: TokenInfo::new(),
            value: Arc::new(value),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.info.name = Some(name.into().into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.info.id = Some(id.into().into());
        self
    }
}

impl<T> Clone for Constant<T> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: StateValue> Seal for Constant<T> {
    fn info(&self) -> &TokenInfo {
        &self.info
    }

    fn recipe(&self) -> Recipe {
        Recipe::Constant(Box::new(T::clone(&self.value)))
    }
}

impl<T: StateValue> State for Constant<T> {
    type Value = T;
}

// ----------------------------------------------------------------------------
// Container
// ----------------------------------------------------------------------------

/// Mutable state.
///
/// Writes go through the container's reducer, `(message, &current) ->
/// Reduction`. A plain container built with [`Container::new`] takes the
/// new value itself as its message.
///
/// `E` is the error type of the container's [`Meta`] channel.
///
/// # Example
///
/// ```rust
/// use weft_store::{write, Container, Reduction, Store};
///
/// #[derive(Clone, PartialEq)]
/// enum Step {
///     Up,
///     Down,
/// }
///
/// let count = Container::<i32, Step>::with_reducer(0, |step, current| match step {
///     Step::Up => Reduction::new(current + 1),
///     Step::Down => Reduction::new(current - 1),
/// });
///
/// let store = Store::new();
/// store.dispatch(write(&count, Step::Up)).unwrap();
/// assert_eq!(store.read(&count).unwrap(), 1);
/// ```
pub struct Container<T, M = T, E = ()> {
    info: TokenInfo,
    initial: Arc<T>,
    reducer: Reducer<T, M>,
    _error: PhantomData<fn() -> E>,
}

impl<T: StateValue> Container<T> {
    pub fn new(initial: T) -> Self {
        Self::with_reducer(initial, |value, _| Reduction::new(value))
    }
}

impl<T: StateValue, M: Send + 'static> Container<T, M> {
    pub fn with_reducer<F>(initial: T, reducer: F) -> Self
    where
        F: Fn(M, &T) -> Reduction<T> + Send + Sync + 'static,
    {
        Self {
            info: TokenInfo::new(),
            initial: Arc::new(initial),
            reducer: Arc::new(reducer),
            _error: PhantomData,
        }
    }
}

impl<T: StateValue, M: Send + 'static, E: Send + Sync + 'static> Container<T, M, E> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.info.name = Some(name.into().into());
        self
    }

    /// Choose the error type reported through the meta channel.
    pub fn with_error<E2>(self) -> Container<T, M, E2> {
        Container {
            info: self.info,
            initial: self.initial,
            reducer: self.reducer,
            _error: PhantomData,
        }
    }

    /// The value the container starts from and returns to on reset.
    pub fn initial(&self) -> &T {
        &self.initial
    }

    pub(crate) fn reducer(&self) -> &Reducer<T, M> {
        &self.reducer
    }
}

impl<T, M, E> Container<T, M, E>
where
    T: StateValue + Serialize + DeserializeOwned,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Give the container a stable id. Containers sharing an id share state,
    /// and id-bearing containers take part in snapshots.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.info.id = Some(id.into().into());
        self.info.codec = Some(Codec::of::<T>());
        self
    }
}

impl<T, M, E> Container<T, M, E>
where
    T: StateValue,
    M: StateValue,
    E: StateValue,
{
    pub fn meta(&self) -> Meta<M, E> {
        Meta::of(&self.info)
    }
}

impl<T, M, E> Clone for Container<T, M, E> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            initial: Arc::clone(&self.initial),
            reducer: Arc::clone(&self.reducer),
            _error: PhantomData,
        }
    }
}

impl<T, M, E> Seal for Container<T, M, E>
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    fn info(&self) -> &TokenInfo {
        &self.info
    }

    fn recipe(&self) -> Recipe {
        Recipe::Container {
            initial: Box::new(T::clone(&self.initial)),
            accept: Arc::new(Reduce::new(self.clone())),
        }
    }
}

impl<T, M, E> State for Container<T, M, E>
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    type Value = T;
}

// ----------------------------------------------------------------------------
// Derived
// ----------------------------------------------------------------------------

type Derivation<T> = Arc<dyn Fn(&Get<'_>, Option<&T>) -> T + Send + Sync>;

/// State computed from other tokens.
///
/// The derivation runs once when the token is first read and again whenever
/// something it read changes. Reads go through the [`Get`] it is given, so
/// the set of dependencies is whatever the latest run touched.
pub struct Derived<T> {
    info: TokenInfo,
    derive: Derivation<T>,
}

impl<T: StateValue> Derived<T> {
    pub fn new<F>(derive: F) -> Self
    where
        F: Fn(&Get<'_>) -> T + Send + Sync + 'static,
    {
        Self::with_previous(move |get, _| derive(get))
    }

    /// Like [`Derived::new`], but the derivation also sees its previous
    /// value (`None` on the first run).
    pub fn with_previous<F>(derive: F) -> Self
    where
        F: Fn(&Get<'_>, Option<&T>) -> T + Send + Sync + 'static,
    {
        Self {
            info: TokenInfo::new(),
            derive: Arc::new(derive),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.info.name = Some(name.into().into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.info.id = Some(id.into().into());
        self
    }
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            derive: Arc::clone(&self.derive),
        }
    }
}

impl<T: StateValue> Seal for Derived<T> {
    fn info(&self) -> &TokenInfo {
        &self.info
    }

    fn recipe(&self) -> Recipe {
        let derive = Arc::clone(&self.derive);
        Recipe::Derived(Arc::new(
            move |get: &Get<'_>, previous: Option<&dyn AnyValue>| -> BoxedValue {
                let previous = previous.and_then(|value| value.as_any().downcast_ref::<T>());
                Box::new(derive(get, previous))
            },
        ))
    }
}

impl<T: StateValue> State for Derived<T> {
    type Value = T;
}

// ----------------------------------------------------------------------------
// Supplied
// ----------------------------------------------------------------------------

/// State whose value comes from outside the graph, typically the result of
/// async work started by a command manager.
///
/// It is never written through a reducer; values arrive through
/// [`Store::supply`](crate::Store::supply) or
/// [`CommandActions::supply`](crate::CommandActions::supply), and progress
/// is reported through its [`Meta`] channel.
pub struct Supplied<T, M = (), E = ()> {
    info: TokenInfo,
    initial: Arc<T>,
    _meta: PhantomData<fn() -> (M, E)>,
}

impl<T: StateValue> Supplied<T> {
    pub fn new(initial: T) -> Self {
        Self {
            info: TokenInfo::new(),
            initial: Arc::new(initial),
            _meta: PhantomData,
        }
    }
}

impl<T: StateValue, M: Send + Sync + 'static, E: Send + Sync + 'static> Supplied<T, M, E> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.info.name = Some(name.into().into());
        self
    }

    /// Choose the message and error types of the meta channel.
    pub fn with_meta<M2, E2>(self) -> Supplied<T, M2, E2> {
        Supplied {
            info: self.info,
            initial: self.initial,
            _meta: PhantomData,
        }
    }
}

impl<T, M, E> Supplied<T, M, E>
where
    T: StateValue + Serialize + DeserializeOwned,
    M: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.info.id = Some(id.into().into());
        self.info.codec = Some(Codec::of::<T>());
        self
    }
}

impl<T, M, E> Supplied<T, M, E>
where
    T: StateValue,
    M: StateValue,
    E: StateValue,
{
    pub fn meta(&self) -> Meta<M, E> {
        Meta::of(&self.info)
    }
}

impl<T, M, E> Clone for Supplied<T, M, E> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            initial: Arc::clone(&self.initial),
            _meta: PhantomData,
        }
    }
}

impl<T, M, E> Seal for Supplied<T, M, E>
where
    T: StateValue,
    M: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn info(&self) -> &TokenInfo {
        &self.info
    }

    fn recipe(&self) -> Recipe {
        Recipe::Supplied(Box::new(T::clone(&self.initial)))
    }
}

impl<T, M, E> State for Supplied<T, M, E>
where
    T: StateValue,
    M: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Value = T;
}

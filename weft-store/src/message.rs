//! Store Messages
//!
//! A [`StoreMessage`] describes one intended mutation. Messages are plain
//! values: building one has no effect until it is handed to
//! [`Store::dispatch`](crate::Store::dispatch), and each is consumed exactly
//! once. They are `Send`, so they can be built on a worker thread and
//! dispatched from wherever the store is reachable.
//!
//! # Variants
//!
//! - `write`: send a message to a container's reducer.
//! - `update`: compute a message from the container's current value, then
//!   write it.
//! - `reset`: put a container back to its initial value, skipping the
//!   reducer.
//! - `use_rule`: run a rule against the current state; dispatch whatever
//!   message it returns.
//! - `run`: run a side effect with no state access.
//! - `batch`: dispatch several messages in order, each settling fully
//!   before the next.
//! - `exec`: execute a command.

use std::fmt;

use crate::error::StoreResult;
use crate::store::Get;
use crate::token::{Command, Container, State, TokenLabel};
use crate::value::StateValue;
use crate::Store;

pub(crate) type Apply = Box<dyn FnOnce(&Store) -> StoreResult<()> + Send>;
pub(crate) type Rule = Box<dyn FnOnce(&Get<'_>) -> Option<StoreMessage> + Send>;

/// A message aimed at one token.
pub struct Targeted {
    target: TokenLabel,
    apply: Apply,
}

impl Targeted {
    fn new(target: TokenLabel, apply: Apply) -> Self {
        Self { target, apply }
    }

    pub fn target(&self) -> &TokenLabel {
        &self.target
    }

    pub(crate) fn apply(self, store: &Store) -> StoreResult<()> {
        (self.apply)(store)
    }
}

/// One intended mutation, interpreted by the store's dispatcher.
pub enum StoreMessage {
    Write(Targeted),
    Update(Targeted),
    Reset(Targeted),
    Use(Rule),
    Run(Box<dyn FnOnce() + Send>),
    Batch(Vec<StoreMessage>),
    Exec(Targeted),
}

impl StoreMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreMessage::Write(_) => "write",
            StoreMessage::Update(_) => "update",
            StoreMessage::Reset(_) => "reset",
            StoreMessage::Use(_) => "use",
            StoreMessage::Run(_) => "run",
            StoreMessage::Batch(_) => "batch",
            StoreMessage::Exec(_) => "exec",
        }
    }

    /// The token a targeted message is aimed at.
    pub fn target(&self) -> Option<&TokenLabel> {
        match self {
            StoreMessage::Write(message)
            | StoreMessage::Update(message)
            | StoreMessage::Reset(message)
            | StoreMessage::Exec(message) => Some(message.target()),
            StoreMessage::Use(_) | StoreMessage::Run(_) | StoreMessage::Batch(_) => None,
        }
    }
}

impl fmt::Debug for StoreMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreMessage::Batch(messages) => f.debug_tuple("Batch").field(messages).finish(),
            other => match other.target() {
                Some(target) => write!(f, "{}({})", other.kind(), target),
                None => f.write_str(other.kind()),
            },
        }
    }
}

/// Send `message` to the container's reducer.
pub fn write<T, M, E>(container: &Container<T, M, E>, message: M) -> StoreMessage
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    let container = container.clone();
    StoreMessage::Write(Targeted::new(
        container.label(),
        Box::new(move |store| store.write(&container, message)),
    ))
}

/// Build a message from the container's current value, then write it.
pub fn update<T, M, E, F>(container: &Container<T, M, E>, generate: F) -> StoreMessage
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
    F: FnOnce(&T) -> M + Send + 'static,
{
    let container = container.clone();
    StoreMessage::Update(Targeted::new(
        container.label(),
        Box::new(move |store| store.update(&container, generate)),
    ))
}

/// Return the container to its initial value, bypassing its reducer.
pub fn reset<T, M, E>(container: &Container<T, M, E>) -> StoreMessage
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    let container = container.clone();
    StoreMessage::Reset(Targeted::new(
        container.label(),
        Box::new(move |store| store.reset(&container)),
    ))
}

/// Run `rule` against the current state and dispatch the message it
/// returns, if any. Reads inside the rule are not tracked.
pub fn use_rule<F>(rule: F) -> StoreMessage
where
    F: FnOnce(&Get<'_>) -> Option<StoreMessage> + Send + 'static,
{
    StoreMessage::Use(Box::new(rule))
}

/// Run a side effect as part of a dispatch.
pub fn run<F>(effect: F) -> StoreMessage
where
    F: FnOnce() + Send + 'static,
{
    StoreMessage::Run(Box::new(effect))
}

/// Dispatch `messages` in order. Each one settles completely, propagation
/// included, before the next is dispatched.
pub fn batch(messages: impl IntoIterator<Item = StoreMessage>) -> StoreMessage {
    StoreMessage::Batch(messages.into_iter().collect())
}

/// Execute `command` with `message`.
pub fn exec<M: Send + 'static>(command: &Command<M>, message: M) -> StoreMessage {
    let command = command.clone();
    StoreMessage::Exec(Targeted::new(
        command.label(),
        Box::new(move |store| store.exec(&command, message)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_report_kind_and_target() {
        let count = Container::new(0).named("count");
        let message = write(&count, 3);
        assert_eq!(message.kind(), "write");
        assert_eq!(message.target().map(ToString::to_string).as_deref(), Some("count"));

        assert_eq!(reset(&count).kind(), "reset");
        assert_eq!(update(&count, |current| current + 1).kind(), "update");
        assert!(run(|| {}).target().is_none());
        assert!(use_rule(|_| None).target().is_none());
    }

    #[test]
    fn debug_lists_batch_contents() {
        let count = Container::new(0).named("count");
        let refresh = Command::<()>::new().named("refresh");
        let message = batch([write(&count, 1), exec(&refresh, ()), run(|| {})]);
        assert_eq!(
            format!("{message:?}"),
            "Batch([write(count), exec(refresh), run])"
        );
    }

    #[test]
    fn messages_are_send() {
        fn assert_send<T: Send>(_: &T) {}
        let count = Container::new(0);
        assert_send(&write(&count, 1));
    }
}

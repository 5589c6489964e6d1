//! Command managers.

use std::any::type_name;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{StoreError, StoreResult};
use crate::message::StoreMessage;
use crate::token::{Command, HasMeta, State, Supplied};
use crate::value::StateValue;
use crate::Store;

/// Executes a command's messages.
///
/// Managers own side effects. Long-running work is started here and reports
/// back through the [`CommandActions`] clone it keeps: results arrive via
/// [`CommandActions::supply`], progress via [`CommandActions::pending`] and
/// [`CommandActions::error`].
pub trait CommandManager<M>: Send + Sync + 'static {
    fn exec(&self, message: M, actions: &CommandActions);
}

impl<M, F> CommandManager<M> for F
where
    F: Fn(M, &CommandActions) + Send + Sync + 'static,
{
    fn exec(&self, message: M, actions: &CommandActions) {
        self(message, actions)
    }
}

type SharedManager<M> = Arc<dyn CommandManager<M>>;

/// Store access for command managers. Cheap to clone and `Send`; every
/// call takes the store lock, so it is safe to use from any thread.
#[derive(Debug, Clone)]
pub struct CommandActions {
    store: Store,
}

impl CommandActions {
    pub fn read<S: State>(&self, token: &S) -> StoreResult<S::Value> {
        self.store.read(token)
    }

    pub fn supply<T, M, E>(&self, token: &Supplied<T, M, E>, value: T) -> StoreResult<()>
    where
        T: StateValue,
        M: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.store.supply(token, value)
    }

    pub fn pending<S: HasMeta>(&self, token: &S, message: S::Message) -> StoreResult<()> {
        self.store.pending(token, message)
    }

    pub fn error<S: HasMeta>(
        &self,
        token: &S,
        message: S::Message,
        reason: S::Error,
    ) -> StoreResult<()> {
        self.store.error(token, message, reason)
    }

    pub fn dispatch(&self, message: StoreMessage) -> StoreResult<()> {
        self.store.dispatch(message)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl Store {
    /// Attach `manager` to `command` in this store, replacing any previous
    /// manager. A triggered command starts its trigger effect here.
    pub fn use_command<M, C>(&self, command: &Command<M>, manager: C)
    where
        M: Send + 'static,
        C: CommandManager<M>,
    {
        self.transaction(|| {
            let manager: SharedManager<M> = Arc::new(manager);
            let (key, previous) = self.registry(|r| {
                let key = r.canonical(command.info());
                r.set_manager(key, Box::new(manager));
                (key, r.take_trigger(key))
            });
            if let Some(previous) = previous {
                self.registry(|r| r.remove_listener(previous));
            }
            debug!(store = self.id(), command = %command.label(), "command manager attached");

            let Some(trigger) = command.trigger().cloned() else {
                return;
            };
            let triggered = command.clone();
            let subscription = self.effect(move |get| {
                let message = trigger(get);
                if let Err(err) = get.store().exec(&triggered, message) {
                    error!(command = %triggered.label(), error = %err, "triggered command failed");
                }
            });
            self.registry(|r| r.set_trigger(key, subscription.listener()));
        })
    }

    /// Execute `command` with `message`. Without a manager the message is
    /// dropped with a warning.
    pub fn exec<M: Send + 'static>(&self, command: &Command<M>, message: M) -> StoreResult<()> {
        self.transaction(|| {
            let manager = self.registry(|r| {
                let key = r.canonical(command.info());
                r.manager(key)
                    .map(|manager| manager.downcast_ref::<SharedManager<M>>().cloned())
            });
            let manager = match manager {
                None => {
                    warn!(store = self.id(), command = %command.label(), "no manager attached, dropping command");
                    return Ok(());
                }
                Some(None) => {
                    return Err(StoreError::MessageMismatch {
                        token: command.label(),
                        expected: type_name::<M>(),
                    })
                }
                Some(Some(manager)) => manager,
            };

            debug!(store = self.id(), command = %command.label(), "executing command");
            manager.exec(
                message,
                &CommandActions {
                    store: self.clone(),
                },
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::token::Container;

    #[test]
    fn exec_without_manager_is_a_no_op() {
        let store = Store::new();
        let refresh = Command::<u32>::new();
        store.exec(&refresh, 1).unwrap();
    }

    #[test]
    fn manager_receives_messages() {
        let store = Store::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let refresh = Command::<u32>::new();
        {
            let seen = Arc::clone(&seen);
            store.use_command(&refresh, move |message: u32, _: &CommandActions| {
                seen.lock().unwrap().push(message)
            });
        }

        store.exec(&refresh, 1).unwrap();
        store.exec(&refresh, 2).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn shared_id_with_other_message_type_is_rejected() {
        let store = Store::new();
        let numbers = Command::<u32>::new().with_id("load");
        let words = Command::<String>::new().with_id("load");
        store.use_command(&numbers, |_: u32, _: &CommandActions| {});

        assert!(matches!(
            store.exec(&words, "all".to_string()),
            Err(StoreError::MessageMismatch { .. })
        ));
    }

    #[test]
    fn trigger_executes_on_change() {
        let store = Store::new();
        let query = Container::new(String::from("a"));
        let results = Supplied::new(Vec::<String>::new());
        let search = {
            let query = query.clone();
            Command::with_trigger(move |get| get.get(&query))
        };
        {
            let results = results.clone();
            store.use_command(&search, move |query: String, actions: &CommandActions| {
                let mut current = actions.read(&results).unwrap();
                current.push(query);
                actions.supply(&results, current).unwrap();
            });
        }
        assert_eq!(store.read(&results).unwrap(), vec!["a"]);

        store.write(&query, "b".to_string()).unwrap();
        assert_eq!(store.read(&results).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn replacing_manager_replaces_trigger() {
        let store = Store::new();
        let count = Container::new(0);
        let runs = Arc::new(Mutex::new(Vec::new()));
        let report = {
            let count = count.clone();
            Command::with_trigger(move |get| get.get(&count))
        };

        for tag in ["first", "second"] {
            let runs = Arc::clone(&runs);
            store.use_command(&report, move |value: i32, _: &CommandActions| {
                runs.lock().unwrap().push((tag, value))
            });
        }
        store.write(&count, 1).unwrap();

        assert_eq!(
            *runs.lock().unwrap(),
            vec![("first", 0), ("second", 0), ("second", 1)]
        );
        assert_eq!(store.subscriber_count(&count).unwrap(), 1);
    }
}

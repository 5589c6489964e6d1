//! Container Hooks
//!
//! Hooks intercept writes to a container before its reducer sees them. Each
//! attached hook wraps the container's current accept chain, so the most
//! recently attached hook runs first and decides, message by message, what
//! reaches the next link:
//!
//! - forward it unchanged or transformed with [`WriteActions::ok`]
//! - hold it and forward it later, from another thread if need be
//! - drop it, optionally reporting through [`WriteActions::error`]
//!
//! Hooks attached before the container is first used in a store wait until
//! its publisher is created; they are installed in attach order right after
//! it, and each gets its `on_register` call then.

use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use super::accept::downcast_message;
use super::registry::Lookup;
use crate::error::StoreResult;
use crate::graph::{Accept, PublisherId};
use crate::token::{Container, Facet, Seal, State};
use crate::value::StateValue;
use crate::Store;

/// Interceptor for writes to one container.
pub trait ContainerHooks<T, M, E>: Send + Sync + 'static
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Called once, when the container's publisher is created in a store.
    /// Hooks attached to a container the store already uses skip it.
    fn on_register(&self, actions: &WriteActions<T, M, E>) -> StoreResult<()> {
        let _ = actions;
        Ok(())
    }

    /// Called for every write instead of the next link. The default
    /// forwards the message as is.
    fn on_write(&self, message: M, actions: &WriteActions<T, M, E>) -> StoreResult<()> {
        actions.ok(message)
    }
}

/// What a hook can do with the container it intercepts.
///
/// Owned and `Send`, so a hook can move a clone into a task and finish the
/// write later.
pub struct WriteActions<T, M, E> {
    store: Store,
    target: PublisherId,
    next: Arc<dyn Accept>,
    container: Container<T, M, E>,
}

impl<T, M, E> Clone for WriteActions<T, M, E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            target: self.target,
            next: Arc::clone(&self.next),
            container: self.container.clone(),
        }
    }
}

impl<T, M, E> WriteActions<T, M, E>
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    pub fn read<S: State>(&self, token: &S) -> StoreResult<S::Value> {
        self.store.read(token)
    }

    /// The intercepted container's current value.
    pub fn current(&self) -> StoreResult<T> {
        self.store.read(&self.container)
    }

    /// Pass `message` to the next link of the chain.
    pub fn ok(&self, message: M) -> StoreResult<()> {
        self.store
            .transaction(|| self.next.accept(&self.store, self.target, Box::new(message)))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl<T, M, E> WriteActions<T, M, E>
where
    T: StateValue,
    M: StateValue,
    E: StateValue,
{
    /// Mark the container as waiting on `message`.
    pub fn pending(&self, message: M) -> StoreResult<()> {
        self.store.pending(&self.container, message)
    }

    /// Report `message` as rejected.
    pub fn error(&self, message: M, reason: E) -> StoreResult<()> {
        self.store.error(&self.container, message, reason)
    }
}

struct Hooked<T, M, E>
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    next: Arc<dyn Accept>,
    hooks: Arc<dyn ContainerHooks<T, M, E>>,
    container: Container<T, M, E>,
}

impl<T, M, E> Accept for Hooked<T, M, E>
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    fn accept(
        &self,
        store: &Store,
        target: PublisherId,
        message: Box<dyn Any + Send>,
    ) -> StoreResult<()> {
        let message = downcast_message::<M, _>(message, &self.container)?;
        let actions = WriteActions {
            store: store.clone(),
            target,
            next: Arc::clone(&self.next),
            container: self.container.clone(),
        };
        self.hooks.on_write(message, &actions)
    }
}

impl Store {
    /// Attach hooks to a container's writes in this store.
    pub fn use_container_hooks<T, M, E, H>(
        &self,
        container: &Container<T, M, E>,
        hooks: H,
    ) -> StoreResult<()>
    where
        T: StateValue,
        M: Send + 'static,
        E: Send + Sync + 'static,
        H: ContainerHooks<T, M, E>,
    {
        self.transaction(|| {
            let hooks: Arc<dyn ContainerHooks<T, M, E>> = Arc::new(hooks);
            let (key, lookup) = self.registry(|r| {
                let info = container.info();
                (r.canonical(info), r.lookup(info, Facet::Value))
            });
            if let Lookup::Ready(target) = lookup {
                wrap(self, target, container, hooks)?;
                debug!(store = self.id(), token = %container.label(), "container hooks attached");
                return Ok(());
            }

            let container = container.clone();
            self.registry(|r| {
                r.defer_hooks(
                    key,
                    Box::new(move |store: &Store, target: PublisherId| {
                        let actions = wrap(store, target, &container, Arc::clone(&hooks))?;
                        debug!(store = store.id(), token = %container.label(), "container hooks installed");
                        hooks.on_register(&actions)
                    }),
                )
            });
            Ok(())
        })
    }
}

/// Put `hooks` in front of the container's accept chain. Returns the
/// actions for the link they wrap.
fn wrap<T, M, E>(
    store: &Store,
    target: PublisherId,
    container: &Container<T, M, E>,
    hooks: Arc<dyn ContainerHooks<T, M, E>>,
) -> StoreResult<WriteActions<T, M, E>>
where
    T: StateValue,
    M: Send + 'static,
    E: Send + Sync + 'static,
{
    let next = store.registry(|r| r.accept_of(target))?;
    let hooked = Hooked {
        next: Arc::clone(&next),
        hooks,
        container: container.clone(),
    };
    store.registry(|r| r.set_accept(target, Arc::new(hooked)))?;
    Ok(WriteActions {
        store: store.clone(),
        target,
        next,
        container: container.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Clamp(i32);

    impl ContainerHooks<i32, i32, ()> for Clamp {
        fn on_write(&self, message: i32, actions: &WriteActions<i32, i32, ()>) -> StoreResult<()> {
            actions.ok(message.min(self.0))
        }
    }

    struct RejectNegative;

    impl ContainerHooks<i32, i32, String> for RejectNegative {
        fn on_write(&self, message: i32, actions: &WriteActions<i32, i32, String>) -> StoreResult<()> {
            if message < 0 {
                return actions.error(message, "negative".to_string());
            }
            actions.ok(message)
        }
    }

    #[test]
    fn hook_transforms_messages() {
        let store = Store::new();
        let count = Container::new(0);
        store.use_container_hooks(&count, Clamp(10)).unwrap();

        store.write(&count, 4).unwrap();
        assert_eq!(store.read(&count).unwrap(), 4);
        store.write(&count, 40).unwrap();
        assert_eq!(store.read(&count).unwrap(), 10);
    }

    #[test]
    fn hook_rejects_with_error() {
        let store = Store::new();
        let count = Container::new(1).with_error::<String>();
        store.use_container_hooks(&count, RejectNegative).unwrap();

        store.write(&count, -3).unwrap();
        assert_eq!(store.read(&count).unwrap(), 1);
        assert_eq!(
            store.read(&count.meta()).unwrap(),
            crate::MetaState::Error {
                message: -3,
                reason: "negative".to_string()
            }
        );

        store.write(&count, 2).unwrap();
        assert!(store.read(&count.meta()).unwrap().is_ok());
    }

    #[test]
    fn latest_hooks_run_first() {
        struct Log(&'static str, Arc<Mutex<Vec<&'static str>>>);

        impl ContainerHooks<i32, i32, ()> for Log {
            fn on_write(&self, message: i32, actions: &WriteActions<i32, i32, ()>) -> StoreResult<()> {
                self.1.lock().unwrap().push(self.0);
                actions.ok(message)
            }
        }

        let store = Store::new();
        let count = Container::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        store
            .use_container_hooks(&count, Log("first", Arc::clone(&log)))
            .unwrap();
        store
            .use_container_hooks(&count, Log("second", Arc::clone(&log)))
            .unwrap();

        store.write(&count, 1).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn on_register_can_seed_the_container() {
        struct Seed;

        impl ContainerHooks<i32, i32, ()> for Seed {
            fn on_register(&self, actions: &WriteActions<i32, i32, ()>) -> StoreResult<()> {
                let current = actions.current()?;
                actions.ok(current + 100)
            }
        }

        let store = Store::new();
        let count = Container::new(1);
        store.use_container_hooks(&count, Seed).unwrap();
        assert_eq!(store.read(&count).unwrap(), 101);
    }

    struct CountRegister(Arc<Mutex<u32>>);

    impl ContainerHooks<i32, i32, ()> for CountRegister {
        fn on_register(&self, _: &WriteActions<i32, i32, ()>) -> StoreResult<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn on_register_fires_when_the_publisher_is_created() {
        let store = Store::new();
        let count = Container::new(0);
        let registered = Arc::new(Mutex::new(0));

        store
            .use_container_hooks(&count, CountRegister(Arc::clone(&registered)))
            .unwrap();
        store
            .use_container_hooks(&count, CountRegister(Arc::clone(&registered)))
            .unwrap();
        assert_eq!(*registered.lock().unwrap(), 0);

        store.read(&count).unwrap();
        assert_eq!(*registered.lock().unwrap(), 2);

        store.write(&count, 3).unwrap();
        assert_eq!(*registered.lock().unwrap(), 2);
    }

    #[test]
    fn late_hooks_skip_on_register() {
        let store = Store::new();
        let count = Container::new(0);
        let registered = Arc::new(Mutex::new(0));
        store.read(&count).unwrap();

        store
            .use_container_hooks(&count, CountRegister(Arc::clone(&registered)))
            .unwrap();
        store.use_container_hooks(&count, Clamp(2)).unwrap();
        store.write(&count, 9).unwrap();

        assert_eq!(*registered.lock().unwrap(), 0);
        assert_eq!(store.read(&count).unwrap(), 2);
    }

    #[test]
    fn hooks_are_per_store() {
        let first = Store::new();
        let second = Store::new();
        let count = Container::new(0);
        first.use_container_hooks(&count, Clamp(1)).unwrap();

        first.write(&count, 5).unwrap();
        second.write(&count, 5).unwrap();
        assert_eq!(first.read(&count).unwrap(), 1);
        assert_eq!(second.read(&count).unwrap(), 5);
    }
}

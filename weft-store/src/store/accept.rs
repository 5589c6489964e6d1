//! Base accept: the container's reducer.

use std::any::{type_name, Any};

use crate::dispatch::dispatch_message;
use crate::error::{StoreError, StoreResult};
use crate::graph::{Accept, PublisherId};
use crate::token::{Container, Reduction, State};
use crate::value::StateValue;
use crate::Store;

/// Innermost link of a container's accept chain.
///
/// Runs the reducer against the current value, publishes the result, puts
/// the meta channel back to ok and finally dispatches the reducer's
/// follow-up message, after the new value has fully propagated.
pub(crate) struct Reduce<T, M, E> {
    container: Container<T, M, E>,
}

impl<T, M, E> Reduce<T, M, E> {
    pub fn new(container: Container<T, M, E>) -> Self {
        Self { container }
    }
}

impl<T, M, E> Accept for Reduce<T, M, E>
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
        let current = store.registry(|r| r.value_of::<T>(target))?;
        let Reduction { value, message: follow_up } = (self.container.reducer())(message, &current);

        store.publish(target, Box::new(value))?;
        store.settle_meta(target)?;
        match follow_up {
            Some(follow_up) => dispatch_message(store, follow_up),
            None => Ok(()),
        }
    }
}

/// Recover a typed message from an accept chain payload.
pub(crate) fn downcast_message<M: 'static, S: State>(
    message: Box<dyn Any + Send>,
    token: &S,
) -> StoreResult<M> {
    message
        .downcast::<M>()
        .map(|message| *message)
        .map_err(|_| StoreError::MessageMismatch {
            token: token.label(),
            expected: type_name::<M>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::write;
    use crate::token::MetaState;

    #[derive(Debug, Clone, PartialEq)]
    enum Step {
        Up,
        Down,
    }

    fn counter() -> Container<i32, Step, String> {
        Container::<i32, Step>::with_reducer(0, |step, current| match step {
            Step::Up => Reduction::new(current + 1),
            Step::Down => Reduction::new(current - 1),
        })
        .with_error::<String>()
    }

    #[test]
    fn reducer_receives_message_and_current_value() {
        let store = Store::new();
        let count = counter();

        store.write(&count, Step::Up).unwrap();
        store.write(&count, Step::Up).unwrap();
        store.write(&count, Step::Down).unwrap();
        assert_eq!(store.read(&count).unwrap(), 1);
    }

    #[test]
    fn accepted_write_resets_meta() {
        let store = Store::new();
        let count = counter();

        store
            .error(&count, Step::Up, "rejected".to_string())
            .unwrap();
        assert!(store.read(&count.meta()).unwrap().is_error());

        store.write(&count, Step::Up).unwrap();
        assert_eq!(store.read(&count.meta()).unwrap(), MetaState::Ok);
    }

    #[test]
    fn follow_up_runs_after_publish() {
        let store = Store::new();
        let log = Container::new(Vec::<i32>::new());
        let count = {
            let log = log.clone();
            Container::<i32, i32>::with_reducer(0, move |delta, current| {
                let next = current + delta;
                let entries = vec![next];
                Reduction::new(next).then(write(&log, entries))
            })
        };

        store.write(&count, 3).unwrap();
        assert_eq!(store.read(&count).unwrap(), 3);
        assert_eq!(store.read(&log).unwrap(), vec![3]);
    }

    #[test]
    fn wrong_payload_is_rejected() {
        let store = Store::new();
        let count = Container::new(0).named("count");
        let target = store.resolve(&count).unwrap();

        let err = Reduce::new(count.clone())
            .accept(&store, target, Box::new("five"))
            .unwrap_err();
        assert!(matches!(err, StoreError::MessageMismatch { .. }));
    }
}

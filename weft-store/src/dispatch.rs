//! Dispatch interpreter.
//!
//! Executes a [`StoreMessage`] against a store. Every branch is
//! synchronous: by the time `dispatch_message` returns, every write it made
//! has propagated. Async work re-enters through a later dispatch or supply.

use tracing::{debug, trace};

use crate::error::StoreResult;
use crate::message::StoreMessage;
use crate::store::Get;
use crate::Store;

/// Interpret `message`. The caller holds the store's transaction lock.
pub(crate) fn dispatch_message(store: &Store, message: StoreMessage) -> StoreResult<()> {
    trace!(store = store.id(), message = ?message, "dispatching");
    match message {
        StoreMessage::Write(write) => write.apply(store),
        StoreMessage::Update(update) => update.apply(store),
        StoreMessage::Reset(reset) => reset.apply(store),
        StoreMessage::Use(rule) => {
            let next = rule(&Get::untracked(store));
            match next {
                Some(next) => dispatch_message(store, next),
                None => Ok(()),
            }
        }
        StoreMessage::Run(effect) => {
            effect();
            Ok(())
        }
        StoreMessage::Batch(messages) => {
            debug!(store = store.id(), len = messages.len(), "dispatching batch");
            for message in messages {
                dispatch_message(store, message)?;
            }
            Ok(())
        }
        StoreMessage::Exec(exec) => exec.apply(store),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::message::{batch, run, use_rule, write};
    use crate::Container;

    #[test]
    fn use_rule_dispatches_returned_message() {
        let store = Store::new();
        let source = Container::new(2);
        let target = Container::new(0);

        let (s, t) = (source.clone(), target.clone());
        let rule = use_rule(move |get| {
            let value = get.get(&s);
            (value > 1).then(|| write(&t, value * 10))
        });
        dispatch_message(&store, rule).unwrap();
        assert_eq!(store.read(&target).unwrap(), 20);

        let rule = use_rule(|_| None);
        dispatch_message(&store, rule).unwrap();
        assert_eq!(store.read(&target).unwrap(), 20);
    }

    #[test]
    fn batch_runs_in_order() {
        let store = Store::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let messages = (0..3).map(|i| {
            let log = Arc::clone(&log);
            run(move || log.lock().unwrap().push(i))
        });
        dispatch_message(&store, batch(messages)).unwrap();

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }
}

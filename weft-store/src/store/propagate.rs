//! Change propagation.
//!
//! A changed publisher starts a pass. The mark phase runs entirely inside
//! the registry; the run phase alternates between short registry sections
//! and user code (derivations and effects), never holding a borrow across
//! the latter. Writes made by user code during the run phase start their own
//! pass and complete before the outer pass continues.
//!
//! Passes in progress live in the registry, so a read can see that a derived
//! value is still marked and recompute it before handing it out.

use std::collections::VecDeque;

use tracing::{trace, warn};

use super::registry::Step;
use crate::error::StoreResult;
use crate::graph::{ListenerBody, ListenerId, PublisherId};
use crate::value::BoxedValue;
use crate::{Get, Store};

impl Store {
    /// Replace a publisher's value and, if it changed, propagate. Returns
    /// whether the value changed.
    pub(crate) fn publish(&self, source: PublisherId, value: BoxedValue) -> StoreResult<bool> {
        self.transaction(|| {
            let changed = self.registry(|r| r.replace_value(source, value))?;
            if changed {
                self.propagate(source);
            }
            Ok(changed)
        })
    }

    fn propagate(&self, source: PublisherId) {
        let pass = ActivePass {
            store: self,
            id: self.registry(|r| r.begin_pass(source)),
        };
        trace!(store = self.id(), pass = pass.id, source = %source, "propagating");

        let mut settled = VecDeque::from([(source, true)]);
        while let Some((publisher, changed)) = settled.pop_front() {
            for listener in self.registry(|r| r.take_edges(pass.id, publisher)) {
                match self.registry(|r| r.settle(pass.id, listener, changed)) {
                    Step::Skip => {}
                    Step::Forward(derived, changed) => settled.push_back((derived, changed)),
                    Step::Run(body) => settled.extend(self.run_listener(listener, body)),
                }
            }
        }
    }

    /// Bring a derived publisher up to date if an active pass still has it
    /// marked.
    pub(crate) fn refresh(&self, publisher: PublisherId) {
        let Some((listener, body)) = self.registry(|r| r.pull(publisher)) else {
            return;
        };
        if let Some((_, changed)) = self.run_listener(listener, body) {
            self.registry(|r| r.record_pull(listener, changed));
        }
    }

    /// Run a claimed listener. Derived listeners report their publisher and
    /// whether the recompute changed it.
    fn run_listener(&self, listener: ListenerId, body: ListenerBody) -> Option<(PublisherId, bool)> {
        let get = Get::tracked(self, listener);
        match body {
            ListenerBody::Effect(effect) => {
                trace!(store = self.id(), listener = %listener, "running effect");
                effect.run(&get);
                None
            }
            ListenerBody::Derive { publisher, derive } => {
                let previous = self.registry(|r| r.current(publisher));
                let value = derive(&get, previous.as_deref());
                let changed = match self.registry(|r| r.replace_value(publisher, value)) {
                    Ok(changed) => changed,
                    Err(err) => {
                        warn!(store = self.id(), error = %err, "derived publisher vanished");
                        false
                    }
                };
                trace!(store = self.id(), listener = %listener, changed, "recomputed");
                Some((publisher, changed))
            }
        }
    }
}

/// Retires a pass from the registry when propagation ends, even by panic.
struct ActivePass<'a> {
    store: &'a Store,
    id: u64,
}

impl Drop for ActivePass<'_> {
    fn drop(&mut self) {
        let Some(pass) = self.store.registry(|r| r.end_pass(self.id)) else {
            return;
        };
        if pass.unsettled() > 0 {
            warn!(
                store = self.store.id(),
                pass = self.id,
                unsettled = pass.unsettled(),
                "listeners left waiting on a dependency cycle"
            );
        }
    }
}

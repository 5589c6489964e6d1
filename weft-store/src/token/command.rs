//! Command tokens.

use std::marker::PhantomData;
use std::sync::Arc;

use super::sealed::TokenInfo;
use super::TokenLabel;
use crate::store::Get;

pub(crate) type Trigger<M> = Arc<dyn Fn(&Get<'_>) -> M + Send + Sync>;

/// A named sink for intents of type `M`.
///
/// A command holds no value. Executing one hands the message to the
/// [`CommandManager`](crate::CommandManager) attached to it in a store;
/// the manager decides what actually happens, and reports results back
/// through the actions it is given.
///
/// A command may declare a trigger. Once a manager is attached, the trigger
/// runs as an effect and executes the command with its result every time
/// the state it reads changes.
pub struct Command<M> {
    info: TokenInfo,
    trigger: Option<Trigger<M>>,
    _message: PhantomData<fn(M)>,
}

impl<M: Send + 'static> Command<M> {
    pub fn new() -> Self {
        Self {
            info: TokenInfo::new(),
            trigger: None,
            _message: PhantomData,
        }
    }

    pub fn with_trigger<F>(trigger: F) -> Self
    where
        F: Fn(&Get<'_>) -> M + Send + Sync + 'static,
    {
        Self {
            info: TokenInfo::new(),
            trigger: Some(Arc::new(trigger)),
            _message: PhantomData,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.info.name = Some(name.into().into());
        self
    }

    /// Commands sharing an id share their manager.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.info.id = Some(id.into().into());
        self
    }

    pub fn label(&self) -> TokenLabel {
        self.info.label(false)
    }

    pub(crate) fn info(&self) -> &TokenInfo {
        &self.info
    }

    pub(crate) fn trigger(&self) -> Option<&Trigger<M>> {
        self.trigger.as_ref()
    }
}

impl<M: Send + 'static> Default for Command<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Command<M> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            trigger: self.trigger.clone(),
            _message: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for Command<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("token", &self.info.label(false).to_string())
            .field("triggered", &self.trigger.is_some())
            .finish()
    }
}

//! Handlers for bound actions and functions.
//!
//! The dispatcher only loads the instance an operation is bound to; what the
//! operation does is up to the handler registered here under
//! `(entity, operation)`.

use std::collections::HashMap;
use std::sync::Arc;

use cds_auth::User;
use cds_model::Entity;
use cqn::DataValue;
use thiserror::Error;

/// Failure reported by an action handler. The message is sent to the client.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Everything a handler gets to see about one invocation.
pub struct ActionCall<'a> {
    pub service: &'a str,
    pub entity: &'a Entity,
    /// Operation name without namespace qualifier.
    pub action: &'a str,
    /// Bound instance for `Set(key)/op`, the whole collection for `Set/op`.
    pub instances: &'a [DataValue],
    /// Request body, `Null` when there was none.
    pub params: &'a DataValue,
    pub user: &'a User,
}

pub type ActionHandler =
    Arc<dyn for<'a> Fn(ActionCall<'a>) -> Result<DataValue, ActionError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<(String, String), ActionHandler>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for operation `action` bound to entity `entity`
    /// (fully qualified). A later registration replaces an earlier one.
    pub fn register<F>(mut self, entity: impl Into<String>, action: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(ActionCall<'a>) -> Result<DataValue, ActionError> + Send + Sync + 'static,
    {
        let key = (entity.into(), action.into());
        tracing::debug!(entity = %key.0, action = %key.1, "registered bound operation");
        self.handlers.insert(key, Arc::new(handler));
        self
    }

    pub fn get(&self, entity: &str, action: &str) -> Option<&ActionHandler> {
        self.handlers.get(&(entity.to_string(), action.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

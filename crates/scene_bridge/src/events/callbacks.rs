//! Host handlers and the callback registry

use crate::foundation::ids::CallbackId;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a host handler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Host function invoked with an event payload
///
/// Handlers stay on the host side; the engine only ever sees their ids.
pub type Handler = Arc<dyn Fn(&Value) -> Result<(), HandlerError> + Send + Sync>;

/// Wrap an infallible closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(move |payload: &Value| {
        f(payload);
        Ok(())
    })
}

/// Wrap a fallible closure as a [`Handler`]
pub fn fallible_handler<F>(f: F) -> Handler
where
    F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Run a handler, turning a panic into a [`HandlerError`]
pub(crate) fn invoke(handler: &Handler, payload: &Value) -> Result<(), HandlerError> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            Err(HandlerError(format!("panic: {message}")))
        }
    }
}

/// At most one handler per callback id
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: HashMap<CallbackId, Handler>,
    once: HashSet<CallbackId>,
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `id`
    ///
    /// Returns `true` if a handler was replaced.
    pub fn register(&mut self, id: CallbackId, handler: Handler) -> bool {
        self.once.remove(&id);
        self.handlers.insert(id, handler).is_some()
    }

    /// Register a handler that is removed after its first delivery
    pub fn register_once(&mut self, id: CallbackId, handler: Handler) -> bool {
        let replaced = self.register(id.clone(), handler);
        self.once.insert(id);
        replaced
    }

    /// Remove a handler; unknown ids are ignored
    pub fn unregister(&mut self, id: &CallbackId) -> Option<Handler> {
        self.once.remove(id);
        self.handlers.remove(id)
    }

    /// Handler registered for `id`
    pub fn get(&self, id: &CallbackId) -> Option<Handler> {
        self.handlers.get(id).cloned()
    }

    /// Handler to run for a delivery to `id`
    ///
    /// One-shot handlers are unregistered by this call.
    pub fn take_for_dispatch(&mut self, id: &CallbackId) -> Option<Handler> {
        if self.once.remove(id) {
            self.handlers.remove(id)
        } else {
            self.handlers.get(id).cloned()
        }
    }

    /// Whether `id` has a handler
    pub fn contains(&self, id: &CallbackId) -> bool {
        self.handlers.contains_key(id)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Remove every handler
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.once.clear();
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("len", &self.handlers.len())
            .finish()
    }
}

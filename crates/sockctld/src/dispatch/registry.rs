//! Name-to-handler table for request dispatch.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use sockctl_proto::no_such_method;

use super::DISPATCH_TARGET;

/// Handler invoked with a request's `data` member.
///
/// Handlers run on the reactor thread and must not block. The returned value
/// is sent back to the caller verbatim.
pub type MethodHandler = Box<dyn Fn(Value) -> Value>;

/// Registry mapping method names to their handlers.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, MethodHandler>,
}

impl MethodRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any previous handler.
    ///
    /// Returns `true` when an existing handler was replaced.
    pub fn register_method<F>(&mut self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(Value) -> Value + 'static,
    {
        let name = name.into();
        debug!(target: DISPATCH_TARGET, method = %name, "registering method");
        self.methods.insert(name, Box::new(handler)).is_some()
    }

    /// Removes the handler registered under `name`.
    ///
    /// Returns `true` when a handler was removed; unknown names are a no-op.
    pub fn unregister_method(&mut self, name: &str) -> bool {
        let removed = self.methods.remove(name).is_some();
        if removed {
            debug!(target: DISPATCH_TARGET, method = name, "unregistered method");
        }
        removed
    }

    /// Invokes the handler for `name` with `data`.
    ///
    /// Unknown names produce the standard `no such method` error object.
    #[must_use]
    pub fn dispatch(&self, name: &str, data: Value) -> Value {
        match self.methods.get(name) {
            Some(handler) => {
                debug!(target: DISPATCH_TARGET, method = name, "dispatching request");
                handler(data)
            }
            None => {
                debug!(target: DISPATCH_TARGET, method = name, "unknown method requested");
                no_such_method()
            }
        }
    }

    /// Returns `true` when `name` has a handler.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` when no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered method names in lexical order.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MethodRegistry")
            .field("methods", &self.method_names())
            .finish()
    }
}

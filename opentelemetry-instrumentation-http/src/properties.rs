//! Request-scoped storage shared between paired filter hooks.
//!
//! The request and response hooks of a boundary filter may run far apart, on
//! different threads, with arbitrary host machinery in between. They
//! communicate exclusively through string-keyed properties attached to the
//! host's request object, so a filter pair never needs shared state of its
//! own and duplicate registrations can be detected by key lookup.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Well-known property keys used by the boundary filters.
///
/// Downstream pipeline stages (e.g. entity serialization interceptors that
/// want to hang child spans off the request span) may look the records up
/// under the same keys, which is why they are public and stable.
pub mod keys {
    /// The [`SpanHandle`](crate::SpanHandle) of the inbound request span.
    pub const SERVER_SPAN: &str = "opentelemetry.instrumentation.server.span";

    /// The [`SpanHandle`](crate::SpanHandle) of the outbound call span.
    ///
    /// Distinct from [`SERVER_SPAN`] so that a process acting as both server
    /// and client within one call chain never collides with itself.
    pub const CLIENT_SPAN: &str = "opentelemetry.instrumentation.client.span";

    /// An explicit parent [`Context`](opentelemetry::Context) for an outbound
    /// call, overriding the calling thread's current context.
    pub const CLIENT_PARENT_CONTEXT: &str = "opentelemetry.instrumentation.client.parent";

    /// When present (any value), suppresses instrumentation of this outbound
    /// call entirely.
    pub const CLIENT_SUPPRESS: &str = "opentelemetry.instrumentation.client.suppress";
}

/// String-keyed, request-scoped property storage provided by the host.
///
/// Implementations must be shareable across the threads a request may touch.
/// Values are type-erased; use `get_as` on the trait object to recover a
/// concrete type.
pub trait PropertyStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Arc<dyn Any + Send + Sync>);

    /// Removes and returns the value stored under `key`.
    fn remove(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>>;
}

impl dyn PropertyStore + '_ {
    /// Returns the value stored under `key` downcast to `T`.
    ///
    /// A value of a different type yields `None`, same as an absent key.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(|value| value.downcast::<T>().ok())
    }
}

/// A ready-made [`PropertyStore`] for hosts without a native property bag.
#[derive(Default)]
pub struct Properties {
    entries: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Properties {
    /// Creates an empty property store.
    pub fn new() -> Self {
        Properties::default()
    }
}

impl PropertyStore for Properties {
    fn get(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Arc<dyn Any + Send + Sync>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_owned(), value);
        }
    }

    fn remove(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.entries
            .lock()
            .ok()
            .and_then(|mut entries| entries.remove(key))
    }
}

impl std::fmt::Debug for Properties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.entries.lock().map(|entries| entries.len()).unwrap_or(0);
        f.debug_struct("Properties").field("len", &len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_recovers_typed_values() {
        let properties = Properties::new();
        let store: &dyn PropertyStore = &properties;

        store.set("answer", Arc::new(42u64));

        assert_eq!(store.get_as::<u64>("answer").as_deref(), Some(&42));
        assert!(store.get_as::<String>("answer").is_none(), "wrong type");
        assert!(store.get_as::<u64>("missing").is_none());
    }

    #[test]
    fn remove_clears_the_entry() {
        let properties = Properties::new();
        let store: &dyn PropertyStore = &properties;

        store.set("flag", Arc::new(true));
        assert!(store.remove("flag").is_some());
        assert!(store.get("flag").is_none());
        assert!(store.remove("flag").is_none());
    }

    #[test]
    fn set_replaces_previous_value() {
        let properties = Properties::new();
        let store: &dyn PropertyStore = &properties;

        store.set("name", Arc::new("first".to_owned()));
        store.set("name", Arc::new("second".to_owned()));

        assert_eq!(
            store.get_as::<String>("name").as_deref().map(String::as_str),
            Some("second")
        );
    }
}

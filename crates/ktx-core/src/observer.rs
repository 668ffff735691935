//! Write observers for data, users and contexts.

use serde_json::Value;
use std::sync::Arc;

/// Receives every key write after it has been applied.
///
/// Observers run synchronously on the writing task, in registration order.
pub trait ContextObserver: Send + Sync {
    fn set(&self, key: &str, value: &Value);
}

pub type SharedObserver = Arc<dyn ContextObserver>;

pub(crate) fn notify(observers: &[SharedObserver], key: &str, value: &Value) {
    for observer in observers {
        observer.set(key, value);
    }
}

impl<F> ContextObserver for F
where
    F: Fn(&str, &Value) + Send + Sync,
{
    fn set(&self, key: &str, value: &Value) {
        self(key, value)
    }
}

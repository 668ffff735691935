//! Context data bags.
//!
//! A [`ContextData`] shape stores the key-value part of a context. Two
//! shapes ship with the crate: [`DictData`], an explicit string-keyed store,
//! and [`RecordData`](crate::record::RecordData), a compile-time-checked
//! record. Custom shapes implement the trait directly.

use crate::observer::{SharedObserver, notify};
use crate::scope::{DataScopeMirror, SharedScope};
use crate::value::Snapshot;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Capability set every data shape provides.
///
/// Implementations use interior mutability: a context bound in the
/// task-local slot is shared behind an `Arc`. Each call is atomic on its
/// own, but sequences of calls from several tasks sharing one context are
/// not serialized; callers sharing a context must coordinate themselves.
pub trait ContextData: Any + Send + Sync {
    /// Immutable view of the entries actually set.
    fn to_dict(&self) -> Snapshot;

    /// Apply every entry of `other` as a normal write, in key order.
    fn copy_from(&self, other: &Snapshot);

    /// Remove all entries.
    fn clear(&self);

    /// Build an empty instance for a context that was given none.
    ///
    /// `scope` is the observability scope the owning context mirrors into.
    /// Shapes that cannot be built without arguments return `None`.
    fn make_default(scope: Option<&SharedScope>) -> Option<Self>
    where
        Self: Sized,
    {
        let _ = scope;
        None
    }
}

/// Explicit string-keyed store.
#[derive(Default)]
pub struct DictData {
    entries: RwLock<BTreeMap<String, Value>>,
    observers: Vec<SharedObserver>,
}

impl DictData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer called after every write.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_observers(mut self, observers: impl IntoIterator<Item = SharedObserver>) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Value stored under `key`; unknown keys read as absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.entries.write().insert(key.clone(), value.clone());
        notify(&self.observers, &key, &value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ContextData for DictData {
    fn to_dict(&self) -> Snapshot {
        Snapshot::from(self.entries.read().clone())
    }

    fn copy_from(&self, other: &Snapshot) {
        for (key, value) in other {
            self.set(key.as_str(), value.clone());
        }
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn make_default(scope: Option<&SharedScope>) -> Option<Self> {
        let data = DictData::new();
        Some(match scope {
            Some(scope) => data.with_observer(Arc::new(DataScopeMirror::new(scope.clone()))),
            None => data,
        })
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for DictData {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: RwLock::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            observers: Vec::new(),
        }
    }
}

impl fmt::Debug for DictData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictData")
            .field("keys_count", &self.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_key_reads_as_absent() {
        let data = DictData::new();
        assert_eq!(data.get("missing"), None);
    }

    #[test]
    fn clear_removes_everything() {
        let data = DictData::new();
        data.set("a", 1);
        data.set("b", json!({"nested": true}));
        data.clear();
        assert!(data.to_dict().is_empty());
    }

    #[test]
    fn copy_from_overwrites_collisions_and_keeps_others() {
        let data: DictData = [("attr1", json!("val1")), ("attr2", json!("val2"))]
            .into_iter()
            .collect();
        let other: Snapshot = [("attr2", json!("val3")), ("attr3", json!("val4"))]
            .into_iter()
            .collect();

        data.copy_from(&other);

        let expected: Snapshot = [
            ("attr1", json!("val1")),
            ("attr2", json!("val3")),
            ("attr3", json!("val4")),
        ]
        .into_iter()
        .collect();
        assert_eq!(data.to_dict(), expected);
    }
}

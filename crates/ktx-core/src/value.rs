//! Read-only snapshots of context data.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::Arc;

/// Names starting with this marker are excluded from log and scope projections.
pub const PRIVATE_PREFIX: &str = "_";

pub fn is_private_key(key: &str) -> bool {
    key.starts_with(PRIVATE_PREFIX)
}

/// Render a value the way log enrichment stringifies it: strings stay raw,
/// everything else becomes JSON text.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Immutable view of a data bag at one point in time.
///
/// Snapshots are cheap to clone and safe to hand to other code: there is no
/// way to write through one.
///
/// ```compile_fail
/// use ktx_core::Snapshot;
/// let snapshot = Snapshot::default();
/// snapshot.insert("qwe".to_string(), serde_json::json!("qweqwe"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot(Arc<BTreeMap<String, Value>>);

impl Snapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Entries in sorted key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, Value> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Owned copy of the underlying mapping.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.0.as_ref().clone()
    }
}

impl From<BTreeMap<String, Value>> for Snapshot {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(Arc::new(map))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_value_keeps_strings_raw() {
        assert_eq!(display_value(&json!("v1")), "v1");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn snapshot_iterates_in_key_order() {
        let snapshot: Snapshot = [("b", json!(2)), ("a", json!(1))].into_iter().collect();
        let keys: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn snapshot_serializes_as_plain_object() {
        let snapshot: Snapshot = [("route", json!("/x")), ("count", json!(3))]
            .into_iter()
            .collect();
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({"count": 3, "route": "/x"})
        );
    }

    #[test]
    fn private_prefix() {
        assert!(is_private_key("_secret"));
        assert!(!is_private_key("secret_"));
    }
}

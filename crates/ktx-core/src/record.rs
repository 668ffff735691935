//! Record-backed context data with a statically known field set.

use crate::data::ContextData;
use crate::error::{KtxError, Result};
use crate::observer::{SharedObserver, notify};
use crate::scope::{DataScopeMirror, SharedScope};
use crate::value::Snapshot;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Types usable as a [`RecordData`] record.
///
/// The record must serialize to a JSON object. `Option` fields that are
/// `None` count as unset and never appear in snapshots.
pub trait ContextRecord: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

impl<T> ContextRecord for T where T: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

/// Data shape over a typed record.
///
/// Typed access goes through [`read`](Self::read) and
/// [`update`](Self::update); name-based access through [`get`](Self::get)
/// and [`set`](Self::set) uses the record's serialized field names.
pub struct RecordData<R> {
    record: RwLock<R>,
    observers: Vec<SharedObserver>,
}

impl<R: ContextRecord> RecordData<R> {
    pub fn new() -> Self {
        Self::from_record(R::default())
    }

    pub fn from_record(record: R) -> Self {
        Self {
            record: RwLock::new(record),
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn read<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.record.read())
    }

    /// Mutate the record, then notify observers of every changed field.
    pub fn update<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        let (result, before, after) = {
            let mut record = self.record.write();
            let before = set_fields::<R>(&record);
            let result = f(&mut record);
            let after = set_fields::<R>(&record);
            (result, before, after)
        };
        for (key, value) in &after {
            if before.get(key) != Some(value) {
                notify(&self.observers, key, value);
            }
        }
        for key in before.keys().filter(|key| !after.contains_key(*key)) {
            notify(&self.observers, key, &Value::Null);
        }
        result
    }

    /// Field value by serialized name; unset or unknown fields read as absent.
    pub fn get(&self, name: &str) -> Option<Value> {
        set_fields::<R>(&self.record.read()).remove(name)
    }

    /// Write one field by serialized name.
    ///
    /// Fails when the record has no such field or the value does not fit
    /// the field's type; the record is left unchanged in that case.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        {
            let mut record = self.record.write();
            let mut fields = all_fields::<R>(&record);
            fields.insert(name.to_string(), value.clone());
            let updated: R = serde_json::from_value(Value::Object(fields)).map_err(|err| {
                KtxError::Configuration(format!(
                    "record {} cannot hold field {name}: {err}",
                    std::any::type_name::<R>()
                ))
            })?;
            if !value.is_null() && !set_fields::<R>(&updated).contains_key(name) {
                return Err(KtxError::Configuration(format!(
                    "record {} has no field {name}",
                    std::any::type_name::<R>()
                )));
            }
            *record = updated;
        }
        notify(&self.observers, name, &value);
        Ok(())
    }
}

impl<R: ContextRecord> Default for RecordData<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn all_fields<R: ContextRecord>(record: &R) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!(
                record = std::any::type_name::<R>(),
                kind = ?other,
                "context record does not serialize to an object"
            );
            Map::new()
        }
        Err(error) => {
            tracing::warn!(record = std::any::type_name::<R>(), %error, "context record failed to serialize");
            Map::new()
        }
    }
}

fn set_fields<R: ContextRecord>(record: &R) -> BTreeMap<String, Value> {
    all_fields(record)
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect()
}

impl<R: ContextRecord> ContextData for RecordData<R> {
    fn to_dict(&self) -> Snapshot {
        Snapshot::from(set_fields::<R>(&self.record.read()))
    }

    fn copy_from(&self, other: &Snapshot) {
        for (key, value) in other {
            if let Err(error) = self.set(key, value.clone()) {
                tracing::warn!(key = %key, %error, "skipped field while copying context record");
            }
        }
    }

    fn clear(&self) {
        *self.record.write() = R::default();
    }

    fn make_default(scope: Option<&SharedScope>) -> Option<Self> {
        let data = Self::new();
        Some(match scope {
            Some(scope) => data.with_observer(Arc::new(DataScopeMirror::new(scope.clone()))),
            None => data,
        })
    }
}

impl<R: ContextRecord + fmt::Debug> fmt::Debug for RecordData<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordData")
            .field("record", &*self.record.read())
            .field("observers", &self.observers.len())
            .finish()
    }
}

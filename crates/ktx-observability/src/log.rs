//! Flattening of the active context into structured log records.
//!
//! These functions only merge keys into a record owned by the caller's
//! logging pipeline; they never emit anything themselves.

use ktx_core::value::{display_value, is_private_key};
use ktx_core::{AnyContext, KtxError, UserIdentity, get_current, get_current_user};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// A structured-log event as a mutable string-keyed map.
pub type LogRecord = Map<String, Value>;

/// Layout of the keys written into a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordShape {
    /// `data_<key>` and `user_<field>` top-level string keys.
    #[default]
    Flat,
    /// `data` and `user` objects holding native values.
    Nested,
}

impl FromStr for RecordShape {
    type Err = KtxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "nested" => Ok(Self::Nested),
            other => Err(KtxError::Configuration(format!(
                "unknown log record shape: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    /// Include `_`-prefixed data keys.
    pub log_private: bool,
    pub data_key_prefix: String,
    pub user_key_prefix: String,
    /// Key the context id is written under.
    pub id_key: String,
    pub shape: RecordShape,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_private: false,
            data_key_prefix: "data_".to_string(),
            user_key_prefix: "user_".to_string(),
            id_key: "uq_id".to_string(),
            shape: RecordShape::Flat,
        }
    }
}

impl LogOptions {
    pub fn with_private(mut self, log_private: bool) -> Self {
        self.log_private = log_private;
        self
    }

    pub fn with_data_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.data_key_prefix = prefix.into();
        self
    }

    pub fn with_user_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_key_prefix = prefix.into();
        self
    }

    pub fn with_shape(mut self, shape: RecordShape) -> Self {
        self.shape = shape;
        self
    }
}

/// Merge the id, data and user of `ctx` (or the bound context) into `record`.
///
/// With no explicit and no bound context the record is returned untouched.
/// Private keys are skipped unless [`LogOptions::log_private`] is set, and
/// `null` values never produce a key.
pub fn add_context_log<'r>(
    record: &'r mut LogRecord,
    ctx: Option<&dyn AnyContext>,
    options: &LogOptions,
) -> &'r mut LogRecord {
    let bound = if ctx.is_none() { get_current() } else { None };
    let Some(ctx) = ctx.or(bound.as_deref()) else {
        return record;
    };

    record.insert(
        options.id_key.clone(),
        Value::String(ctx.uq_id().to_string()),
    );

    let data = ctx.get_data();
    let visible = data
        .iter()
        .filter(|(key, _)| options.log_private || !is_private_key(key))
        .filter(|(_, value)| !value.is_null());

    match options.shape {
        RecordShape::Flat => {
            for (key, value) in visible {
                record.insert(
                    format!("{}{key}", options.data_key_prefix),
                    Value::String(display_value(value)),
                );
            }
            if let Some(user) = ctx.user() {
                write_flat_user(record, user, &options.user_key_prefix);
            }
        }
        RecordShape::Nested => {
            let data: Map<String, Value> = visible
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            record.insert("data".to_string(), Value::Object(data));
            if let Some(user) = ctx.user() {
                let user = user.to_map();
                if !user.is_empty() {
                    record.insert("user".to_string(), Value::Object(user));
                }
            }
        }
    }
    record
}

/// Merge the present fields of `user` (or the bound user) into `record`.
pub fn add_context_user_log<'r>(
    record: &'r mut LogRecord,
    user: Option<&dyn UserIdentity>,
    options: &LogOptions,
) -> &'r mut LogRecord {
    let bound = if user.is_none() {
        get_current_user()
    } else {
        None
    };
    let Some(user) = user.or(bound.as_deref()) else {
        return record;
    };

    match options.shape {
        RecordShape::Flat => write_flat_user(record, user, &options.user_key_prefix),
        RecordShape::Nested => {
            let fields = user.to_map();
            if !fields.is_empty() {
                record.insert("user".to_string(), Value::Object(fields));
            }
        }
    }
    record
}

/// Fresh record holding the bound context's projection.
pub fn context_fields(options: &LogOptions) -> LogRecord {
    let mut record = LogRecord::new();
    add_context_log(&mut record, None, options);
    record
}

fn write_flat_user(record: &mut LogRecord, user: &dyn UserIdentity, prefix: &str) {
    // ids may be numbers or uuids; text fields are already strings
    for (field, value) in user.to_map() {
        record.insert(format!("{prefix}{field}"), Value::String(display_value(&value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_parses_case_insensitively() {
        assert_eq!("Nested".parse::<RecordShape>(), Ok(RecordShape::Nested));
        assert!("tree".parse::<RecordShape>().is_err());
    }

    #[test]
    fn defaults_match_documented_keys() {
        let options = LogOptions::default();
        assert_eq!(options.id_key, "uq_id");
        assert_eq!(options.data_key_prefix, "data_");
        assert_eq!(options.user_key_prefix, "user_");
        assert!(!options.log_private);
    }
}

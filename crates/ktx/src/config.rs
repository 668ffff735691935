//! Process configuration: id strategy, observability backend, log layout
//! and tracing setup.

use ktx_core::{KtxError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "observability")]
use ktx_observability::{LogOptions, RecordShape, TracingOptions};

/// Where new context ids come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdSource {
    /// Random v4 uuid.
    Uuid,
    /// Active OpenTelemetry trace id, falling back to a uuid.
    #[default]
    Trace,
}

impl FromStr for IdSource {
    type Err = KtxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uuid" => Ok(Self::Uuid),
            "trace" => Ok(Self::Trace),
            other => Err(KtxError::Configuration(format!("unknown id source: {other}"))),
        }
    }
}

/// Observability scope contexts mirror into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeBackend {
    #[default]
    None,
    Tracing,
    Memory,
}

impl FromStr for ScopeBackend {
    type Err = KtxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "tracing" => Ok(Self::Tracing),
            "memory" => Ok(Self::Memory),
            other => Err(KtxError::Configuration(format!(
                "unknown scope backend: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KtxConfig {
    pub id_source: IdSource,
    pub scope_backend: ScopeBackend,
    #[cfg(feature = "observability")]
    pub log: LogOptions,
    #[cfg(feature = "observability")]
    pub tracing: TracingOptions,
}

impl KtxConfig {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            KtxError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            KtxError::Configuration(format!("invalid config {}: {err}", path.display()))
        })
    }

    /// Load from `KTX_*` environment variables after reading a `.env` file
    /// if one exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup, starting from defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup("KTX_ID_SOURCE") {
            config.id_source = value.parse()?;
        }
        if let Some(value) = lookup("KTX_SCOPE_BACKEND") {
            config.scope_backend = value.parse()?;
        }

        #[cfg(feature = "observability")]
        {
            if let Some(value) = lookup("KTX_LOG_PRIVATE") {
                config.log.log_private = parse_bool("KTX_LOG_PRIVATE", &value)?;
            }
            if let Some(value) = lookup("KTX_DATA_KEY_PREFIX") {
                config.log.data_key_prefix = value;
            }
            if let Some(value) = lookup("KTX_USER_KEY_PREFIX") {
                config.log.user_key_prefix = value;
            }
            if let Some(value) = lookup("KTX_LOG_SHAPE") {
                config.log.shape = value.parse::<RecordShape>()?;
            }
            if let Some(value) = lookup("KTX_TRACING_FILTER") {
                config.tracing.filter = value;
            }
            if let Some(value) = lookup("KTX_TRACING_JSON") {
                config.tracing.json = parse_bool("KTX_TRACING_JSON", &value)?;
            }
            if let Some(value) = lookup("KTX_TRACING_OTEL") {
                config.tracing.otel = parse_bool("KTX_TRACING_OTEL", &value)?;
            }
        }

        Ok(config)
    }
}

#[cfg_attr(not(feature = "observability"), allow(dead_code))]
fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(KtxError::Configuration(format!(
            "{key} must be a boolean, got {other}"
        ))),
    }
}

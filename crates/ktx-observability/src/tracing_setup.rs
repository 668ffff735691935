//! Process-wide tracing subscriber installation.

use ktx_core::{KtxError, Result};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{Config, TracerProvider};
use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingOptions {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Attach an OpenTelemetry layer so spans carry trace ids.
    pub otel: bool,
    pub service_name: String,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            otel: true,
            service_name: "ktx".to_string(),
        }
    }
}

fn build_tracer_provider(service_name: &str) -> TracerProvider {
    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        service_name.to_string(),
    )]);
    TracerProvider::builder()
        .with_config(Config::default().with_resource(resource))
        .build()
}

/// Install the global subscriber. Fails instead of panicking when one is
/// already installed.
pub fn init_tracing(options: &TracingOptions) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&options.filter)
            .map_err(|err| KtxError::Tracing(format!("invalid filter {}: {err}", options.filter)))?,
    };

    let otel_layer = if options.otel {
        let provider = build_tracer_provider(&options.service_name);
        let tracer = provider.tracer(options.service_name.clone());
        global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    let json_layer = options.json.then(|| fmt::layer().json());
    let text_layer = (!options.json).then(fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|err| KtxError::Tracing(err.to_string()))?;

    tracing::debug!(
        filter = %options.filter,
        json = options.json,
        otel = options.otel,
        "tracing initialized"
    );
    Ok(())
}

/// Flush and drop the global tracer provider.
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
}

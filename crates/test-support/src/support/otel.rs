//! Local OpenTelemetry-backed subscriber for trace id tests.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::prelude::*;

/// Run `f` with a thread-local subscriber that records spans into an
/// in-process OpenTelemetry tracer.
pub fn with_otel_subscriber<R>(f: impl FnOnce() -> R) -> R {
    let provider = TracerProvider::builder().build();
    let tracer = provider.tracer("ktx-test");
    let subscriber =
        tracing_subscriber::registry().with(tracing_opentelemetry::layer().with_tracer(tracer));
    tracing::subscriber::with_default(subscriber, f)
}

//! Context ids derived from the active OpenTelemetry trace.

use ktx_core::ids::uuid_uq_id;
use opentelemetry::trace::{TraceContextExt, TraceId};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Trace id of the current `tracing` span, or of the ambient OpenTelemetry
/// context when the span carries none.
pub fn current_trace_id() -> Option<TraceId> {
    let from_span = tracing::Span::current()
        .context()
        .span()
        .span_context()
        .trace_id();
    if from_span != TraceId::INVALID {
        return Some(from_span);
    }

    let ambient = opentelemetry::Context::current()
        .span()
        .span_context()
        .trace_id();
    (ambient != TraceId::INVALID).then_some(ambient)
}

/// The active trace id as 32 hex characters, or a fresh uuid outside a trace.
pub fn trace_uq_id() -> String {
    match current_trace_id() {
        Some(trace_id) => trace_id.to_string(),
        None => uuid_uq_id(),
    }
}

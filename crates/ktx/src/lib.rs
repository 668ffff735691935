//! Task-scoped request context propagation.
//!
//! Re-exports the core context types and, with the default `observability`
//! feature, log enrichment and trace-derived ids. [`install`] selects the
//! process-wide strategies from a [`KtxConfig`].

pub mod config;
pub mod setup;

pub use config::{IdSource, KtxConfig, ScopeBackend};
#[cfg(feature = "observability")]
pub use setup::init;
pub use setup::{context_factory, id_generator, install, observability_scope};

pub use ktx_core::*;

#[cfg(feature = "observability")]
pub use ktx_observability as observability;
#[cfg(feature = "observability")]
pub use ktx_observability::{
    LogOptions, LogRecord, RecordShape, TracingOptions, TracingScope, add_context_log,
    add_context_user_log, context_fields, current_trace_id, init_tracing, trace_uq_id,
};

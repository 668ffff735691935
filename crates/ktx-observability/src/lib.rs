//! Observability integration for ktx contexts (trace ids, scopes, log records, tracing setup).

pub mod log;
pub mod spans;
pub mod trace_id;
pub mod tracing_scope;
pub mod tracing_setup;

pub use log::*;
pub use spans::*;
pub use trace_id::*;
pub use tracing_scope::*;
pub use tracing_setup::*;

pub mod otel;
pub mod scope;

//! Error types for context propagation
//!
//! Every error here is a local, synchronous contract violation: nothing is
//! retried and nothing is swallowed. Failures of the external observability
//! collaborator use [`ScopeError`] instead and never reach these paths.

use thiserror::Error;

/// Main error type for context construction and lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KtxError {
    /// The task-local slot holds no context
    #[error("no context found in current task")]
    NoActiveContext,

    /// The task-local slot holds no user
    #[error("no context user found in current task")]
    NoActiveUser,

    /// The active context is not of the requested concrete type
    #[error("current context is not an instance of {expected} but {actual}")]
    ContextTypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// The active user is not of the requested concrete type
    #[error("current context user is not an instance of {expected} but {actual}")]
    UserTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Data inheritance across two different data shapes
    #[error("cannot inherit data from type {parent} to different type {child}")]
    InheritShapeMismatch {
        parent: &'static str,
        child: &'static str,
    },

    /// No data instance was given and the shape has no default constructor
    #[error("data type is not specified or couldn't deduce it for {shape}")]
    DataShapeUndeducible { shape: &'static str },

    /// Invalid configuration or strategy installation
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Tracing subscriber or exporter setup failed
    #[error("tracing setup error: {0}")]
    Tracing(String),
}

/// Failure reported by an external observability scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("observability scope unavailable: {0}")]
    Unavailable(String),
    #[error("unknown observability scope handle {0}")]
    UnknownHandle(u64),
    #[error("observability backend error: {0}")]
    Backend(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, KtxError>;

pub type ScopeResult<T> = std::result::Result<T, ScopeError>;

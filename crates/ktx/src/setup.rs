//! One-time strategy selection at process start.

use crate::config::{IdSource, KtxConfig, ScopeBackend};
use ktx_core::ids::{
    IdGenerator, generator_fn, generator_installed, install_default_generator, uuid_uq_id,
};
use ktx_core::scope::{
    InMemoryScope, NoopScope, SharedScope, install_default_scope, installed_scope,
};
use ktx_core::{ContextFactory, KtxError, Result};
use std::sync::Arc;

/// Id generator selected by `config`.
pub fn id_generator(config: &KtxConfig) -> Result<IdGenerator> {
    match config.id_source {
        IdSource::Uuid => Ok(generator_fn(uuid_uq_id)),
        #[cfg(feature = "observability")]
        IdSource::Trace => Ok(generator_fn(ktx_observability::trace_uq_id)),
        #[cfg(not(feature = "observability"))]
        IdSource::Trace => Err(KtxError::Configuration(
            "trace-derived ids need the observability feature".to_string(),
        )),
    }
}

/// Observability scope selected by `config`; `none` yields a null object.
pub fn observability_scope(config: &KtxConfig) -> Result<SharedScope> {
    match config.scope_backend {
        ScopeBackend::None => Ok(Arc::new(NoopScope)),
        ScopeBackend::Memory => Ok(Arc::new(InMemoryScope::new())),
        #[cfg(feature = "observability")]
        ScopeBackend::Tracing => Ok(Arc::new(ktx_observability::TracingScope::new())),
        #[cfg(not(feature = "observability"))]
        ScopeBackend::Tracing => Err(KtxError::Configuration(
            "the tracing scope backend needs the observability feature".to_string(),
        )),
    }
}

/// Install the process-wide id generator and observability scope.
///
/// Only the first call in a process succeeds; later calls fail with
/// [`KtxError::Configuration`] and leave the installed strategies alone.
pub fn install(config: &KtxConfig) -> Result<()> {
    let generator = id_generator(config)?;
    let scope = observability_scope(config)?;
    if generator_installed() || installed_scope().is_some() {
        return Err(KtxError::Configuration("already installed".to_string()));
    }
    install_default_generator(generator)
        .map_err(|_| KtxError::Configuration("already installed".to_string()))?;
    install_default_scope(scope)
        .map_err(|_| KtxError::Configuration("already installed".to_string()))?;
    tracing::info!(
        id_source = ?config.id_source,
        scope_backend = ?config.scope_backend,
        "context strategies installed"
    );
    Ok(())
}

/// Install the tracing subscriber, then the context strategies.
#[cfg(feature = "observability")]
pub fn init(config: &KtxConfig) -> Result<()> {
    ktx_observability::init_tracing(&config.tracing)?;
    install(config)
}

/// Factory wired to the strategies in `config`, without touching process
/// state.
pub fn context_factory(config: &KtxConfig) -> Result<ContextFactory> {
    Ok(ContextFactory::new()
        .with_id_generator(id_generator(config)?)
        .with_scope(observability_scope(config)?))
}

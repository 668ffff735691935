//! Unique context identifiers.
//!
//! A context id is resolved once at construction and never changes. The
//! default strategy is chosen at process start via
//! [`install_default_generator`]; until then a random uuid is used.

use crate::error::{KtxError, Result};
use std::sync::{Arc, OnceLock};

/// Produces a fresh context id on every call.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

static DEFAULT_GENERATOR: OnceLock<IdGenerator> = OnceLock::new();

/// Random v4 uuid rendered as 32 lowercase hex characters.
pub fn uuid_uq_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Install the process-wide default id generator. First call wins.
pub fn install_default_generator(generator: IdGenerator) -> Result<()> {
    DEFAULT_GENERATOR.set(generator).map_err(|_| {
        KtxError::Configuration("default id generator is already installed".to_string())
    })
}

pub fn generator_installed() -> bool {
    DEFAULT_GENERATOR.get().is_some()
}

/// Generate an id with the installed default generator, or a uuid.
pub fn default_uq_id() -> String {
    match DEFAULT_GENERATOR.get() {
        Some(generator) => generator(),
        None => uuid_uq_id(),
    }
}

/// Wrap a plain function as an [`IdGenerator`].
pub fn generator_fn<F>(f: F) -> IdGenerator
where
    F: Fn() -> String + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_hex_and_unique() {
        let a = uuid_uq_id();
        let b = uuid_uq_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}

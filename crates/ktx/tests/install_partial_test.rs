use ktx::ids::generator_installed;
use ktx::scope::{install_default_scope, installed_scope};
use ktx::{KtxConfig, KtxError, NoopScope, install};
use std::sync::Arc;

// Installation is process-wide, so this binary holds a single test.
#[test]
fn test_install_leaves_generator_alone_when_scope_exists() {
    install_default_scope(Arc::new(NoopScope)).expect("scope install");

    let err = install(&KtxConfig::default()).expect_err("install over existing scope");
    assert_eq!(err, KtxError::Configuration("already installed".to_string()));
    assert!(!generator_installed());
    assert!(installed_scope().is_some());
}

use ktx::{Context, KtxConfig, KtxError, ScopeBackend, install};

// Installation is process-wide, so this binary holds a single test.
#[test]
fn test_install_is_first_wins() {
    let config = KtxConfig {
        id_source: ktx::IdSource::Uuid,
        scope_backend: ScopeBackend::Memory,
        ..KtxConfig::default()
    };
    install(&config).expect("first install");

    let err = install(&KtxConfig::default()).expect_err("second install");
    assert_eq!(err, KtxError::Configuration("already installed".to_string()));

    let ctx: Context = Context::builder().build().expect("context");
    assert_eq!(ctx.uq_id().len(), 32);
    assert!(ktx::scope::installed_scope().is_some());
}

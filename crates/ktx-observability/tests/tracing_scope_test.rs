use ktx_core::{Context, bind};
use ktx_observability::TracingScope;
use std::sync::Arc;
use tracing_test::traced_test;

#[test]
#[traced_test]
fn test_bind_mirrors_into_tracing_scope() {
    let scope = Arc::new(TracingScope::new());
    let ctx: Arc<Context> = Arc::new(
        Context::builder()
            .with_uq_id("traced-ctx")
            .with_scope(scope.clone())
            .build()
            .expect("build context"),
    );

    bind(ctx).run(|bound| {
        assert_eq!(scope.depth(), 1);
        bound.set("attr1", "v1");
        bound.set("_hidden", "v2");
    });

    assert_eq!(scope.depth(), 0);
    assert!(logs_contain("scope tag"));
    assert!(logs_contain("traced-ctx"));
    assert!(logs_contain("scope extra"));
    assert!(logs_contain("attr1"));
    assert!(!logs_contain("_hidden"));
}

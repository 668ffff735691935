use ktx_core::{
    AnyContext, Context, ContextUser, InMemoryScope, KtxError, RecordData, UserIdentity, bind,
    bind_user, get_current, get_current_as, get_current_or_fail, get_current_user,
    get_current_user_as, get_current_user_or_fail,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Barrier};
use test_support::support::scope::FailingScope;
use tracing_test::traced_test;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Request {
    route: Option<String>,
}

fn dict_ctx(uq_id: &str) -> Arc<Context> {
    Arc::new(
        Context::builder()
            .with_uq_id(uq_id)
            .without_scope()
            .build()
            .expect("build context"),
    )
}

fn current_id() -> Option<String> {
    get_current().map(|ctx| ctx.uq_id().to_string())
}

#[test]
fn test_nested_binds_restore_previous_context() {
    assert!(get_current().is_none());

    let outer = bind(dict_ctx("outer")).entered();
    assert_eq!(current_id().as_deref(), Some("outer"));
    {
        let _inner = bind(dict_ctx("inner")).entered();
        assert_eq!(current_id().as_deref(), Some("inner"));
    }
    assert_eq!(current_id().as_deref(), Some("outer"));

    drop(outer);
    assert!(get_current().is_none());
}

#[test]
fn test_bind_and_unbind_are_idempotent() {
    let mut guard = bind(dict_ctx("ctx"));
    assert!(!guard.is_bound());

    let first = guard.bind();
    let second = guard.bind();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(guard.is_bound());

    guard.unbind();
    guard.unbind();
    assert!(!guard.is_bound());
    assert!(get_current().is_none());
}

#[test]
fn test_run_returns_value_and_unbinds() {
    let ctx = dict_ctx("ctx");
    let id = bind(ctx.clone()).run(|bound| {
        bound.set("attr1", "v1");
        current_id()
    });

    assert_eq!(id.as_deref(), Some("ctx"));
    assert!(get_current().is_none());
    assert_eq!(ctx.get("attr1"), Some(json!("v1")));
}

#[test]
fn test_panicking_block_still_unbinds() {
    let result = catch_unwind(AssertUnwindSafe(|| {
        bind(dict_ctx("doomed")).run(|_| panic!("request failed"))
    }));

    assert!(result.is_err());
    assert!(get_current().is_none());
}

#[test]
fn test_get_current_variants() {
    assert_eq!(get_current_or_fail().err(), Some(KtxError::NoActiveContext));
    assert_eq!(
        get_current_as::<Context>().err(),
        Some(KtxError::NoActiveContext)
    );

    bind(dict_ctx("ctx")).run(|bound| {
        let typed = get_current_as::<Context>().expect("typed context");
        assert!(Arc::ptr_eq(&typed, bound));

        let err = get_current_as::<Context<RecordData<Request>>>().expect_err("mismatch");
        match &err {
            KtxError::ContextTypeMismatch { expected, actual } => {
                assert!(expected.contains("RecordData"));
                assert!(actual.contains("DictData"));
                assert!(!actual.contains("RecordData"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("current context is not an instance of"));
    });
}

#[test]
fn test_bind_opens_tagged_scope_and_closes_it() {
    let scope = Arc::new(InMemoryScope::new());
    let ctx: Arc<Context> = Arc::new(
        Context::builder()
            .with_uq_id("scoped")
            .with_scope(scope.clone())
            .build()
            .expect("build context"),
    );

    bind(ctx.clone()).run(|bound| {
        assert_eq!(scope.depth(), 1);
        assert_eq!(scope.tag("uq_id").as_deref(), Some("scoped"));
        assert_eq!(scope.extra("uq_id"), Some(json!("scoped")));

        bound.set("attr1", "v1");
        bound.set("_secret", "hidden");
        assert_eq!(scope.extra("attr1"), Some(json!("v1")));
        assert_eq!(scope.extra("_secret"), None);
    });

    assert_eq!(scope.depth(), 0);
    assert_eq!(scope.tag("uq_id"), None);
    assert_eq!(scope.extra("attr1"), None);
}

fn scoped_ctx(uq_id: &str, scope: &Arc<InMemoryScope>) -> Arc<Context> {
    Arc::new(
        Context::builder()
            .with_uq_id(uq_id)
            .with_scope(scope.clone())
            .build()
            .expect("build context"),
    )
}

#[test]
fn test_sibling_unbind_keeps_other_thread_scope_open() {
    let scope = Arc::new(InMemoryScope::new());
    let both_bound = Arc::new(Barrier::new(2));
    let first_unbound = Arc::new(Barrier::new(2));

    let first = {
        let (scope, both_bound, first_unbound) =
            (scope.clone(), both_bound.clone(), first_unbound.clone());
        std::thread::spawn(move || {
            let guard = bind(scoped_ctx("ctx-a", &scope)).entered();
            both_bound.wait();
            drop(guard);
            first_unbound.wait();
            scope.depth()
        })
    };

    let second = {
        let scope = scope.clone();
        std::thread::spawn(move || {
            let ctx = scoped_ctx("ctx-b", &scope);
            bind(ctx).run(|bound| {
                both_bound.wait();
                first_unbound.wait();
                bound.set("attr", "from-b");
                (
                    scope.depth(),
                    scope.tag("uq_id"),
                    scope.extra("attr"),
                )
            })
        })
    };

    assert_eq!(first.join().expect("first thread"), 0);
    let (depth, tag, extra) = second.join().expect("second thread");
    assert_eq!(depth, 1);
    assert_eq!(tag.as_deref(), Some("ctx-b"));
    assert_eq!(extra, Some(json!("from-b")));

    assert_eq!(scope.depth(), 0);
    assert_eq!(scope.extra("attr"), None);
    assert_eq!(scope.tag("uq_id"), None);
}

#[test]
#[traced_test]
fn test_failing_scope_does_not_break_bind() {
    let scope = Arc::new(FailingScope::new());
    let ctx: Arc<Context> = Arc::new(
        Context::builder()
            .with_uq_id("resilient")
            .with_scope(scope.clone())
            .build()
            .expect("build context"),
    );

    bind(ctx).run(|bound| {
        assert_eq!(current_id().as_deref(), Some("resilient"));
        bound.set("attr1", "v1");
        assert_eq!(bound.get("attr1"), Some(json!("v1")));
    });

    assert!(get_current().is_none());
    assert_eq!(scope.calls(), vec!["open_scope", "set_extra"]);
    assert!(logs_contain("failed to open observability scope"));
    assert!(logs_contain("failed to mirror context data into observability scope"));
}

#[test]
fn test_user_bind_nests_and_restores() {
    assert_eq!(get_current_user_or_fail().err(), Some(KtxError::NoActiveUser));

    let alice = Arc::new(ContextUser::new().with_username("alice"));
    let bob = Arc::new(ContextUser::new().with_username("bob"));

    bind_user(alice).run(|_| {
        let current = get_current_user_as::<ContextUser>().expect("typed user");
        assert_eq!(current.get_username().as_deref(), Some("alice"));

        bind_user(bob).run(|_| {
            let current = get_current_user().expect("user");
            assert_eq!(current.get_username().as_deref(), Some("bob"));
        });

        let current = get_current_user().expect("user");
        assert_eq!(current.get_username().as_deref(), Some("alice"));
    });

    assert!(get_current_user().is_none());
}

#[test]
fn test_user_bind_is_independent_of_context_bind() {
    bind(dict_ctx("ctx")).run(|_| {
        assert!(get_current_user().is_none());
    });
    bind_user(Arc::new(ContextUser::new())).run(|_| {
        assert!(get_current().is_none());
    });
}

#[tokio::test]
async fn test_async_scope_binds_for_the_future_only() {
    let id = bind(dict_ctx("async")).scope(async {
        tokio::task::yield_now().await;
        current_id()
    });

    assert_eq!(id.await.as_deref(), Some("async"));
    assert!(get_current().is_none());
}

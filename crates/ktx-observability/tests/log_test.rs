use ktx_core::{AnyContext, Context, ContextUser, UserIdentity, bind, bind_user};
use ktx_observability::{
    LogOptions, LogRecord, RecordShape, add_context_log, add_context_user_log, context_fields,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn record(value: Value) -> LogRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn request_ctx() -> Arc<Context> {
    let ctx: Context = Context::builder()
        .with_uq_id("trace-1")
        .without_scope()
        .build()
        .expect("build context");
    ctx.user().set_username(Some("alice".to_string()));
    ctx.set("attr1", "v1");
    ctx.set("_hidden", "v2");
    Arc::new(ctx)
}

#[test]
fn test_bound_context_is_flattened() {
    bind(request_ctx()).run(|_| {
        let mut event = LogRecord::new();
        add_context_log(&mut event, None, &LogOptions::default());

        assert_eq!(
            event,
            record(json!({"uq_id": "trace-1", "data_attr1": "v1", "user_username": "alice"}))
        );
    });
}

#[test]
fn test_private_keys_need_opt_in() {
    let ctx = request_ctx();
    let mut event = LogRecord::new();
    add_context_log(&mut event, Some(&*ctx), &LogOptions::default().with_private(true));

    assert_eq!(event.get("data__hidden"), Some(&json!("v2")));
    assert_eq!(event.get("data_attr1"), Some(&json!("v1")));
}

#[test]
fn test_null_values_and_absent_user_fields_are_skipped() {
    let ctx: Context = Context::new("ctx").expect("build context");
    ctx.set("maybe", Value::Null);
    ctx.set("count", 3);
    ctx.user().set_id(Some(json!(17)));

    let mut event = LogRecord::new();
    add_context_log(&mut event, Some(&ctx), &LogOptions::default());

    assert_eq!(
        event,
        record(json!({"uq_id": "ctx", "data_count": "3", "user_id": "17"}))
    );
}

#[test]
fn test_no_context_leaves_record_untouched() {
    let mut event = record(json!({"some": "value"}));
    let returned = add_context_log(&mut event, None, &LogOptions::default()).clone();

    assert_eq!(returned, record(json!({"some": "value"})));
    assert_eq!(event, returned);
    assert!(context_fields(&LogOptions::default()).is_empty());
}

#[test]
fn test_explicit_context_wins_over_bound_one() {
    let explicit: Context = Context::new("explicit").expect("build context");

    bind(request_ctx()).run(|_| {
        let mut event = LogRecord::new();
        add_context_log(&mut event, Some(&explicit as &dyn AnyContext), &LogOptions::default());
        assert_eq!(event, record(json!({"uq_id": "explicit"})));
    });
}

#[test]
fn test_nested_shape_keeps_native_values() {
    let ctx = request_ctx();
    ctx.set("count", 3);
    let options = LogOptions::default().with_shape(RecordShape::Nested);

    let mut event = record(json!({"some": "value"}));
    add_context_log(&mut event, Some(&*ctx), &options);

    assert_eq!(
        event,
        record(json!({
            "some": "value",
            "uq_id": "trace-1",
            "data": {"attr1": "v1", "count": 3},
            "user": {"username": "alice"},
        }))
    );
}

#[test]
fn test_context_fields_for_bound_context() {
    bind(request_ctx()).run(|_| {
        let fields = context_fields(&LogOptions::default().with_data_key_prefix("ctx."));
        assert_eq!(fields.get("ctx.attr1"), Some(&json!("v1")));
        assert_eq!(fields.get("uq_id"), Some(&json!("trace-1")));
    });
}

#[test]
fn test_user_log_uses_explicit_or_bound_user() {
    let user = Arc::new(
        ContextUser::new()
            .with_id(42)
            .with_email("alice@example.com")
            .with_ip_address("10.0.0.1"),
    );

    let mut event = LogRecord::new();
    add_context_user_log(&mut event, Some(&*user), &LogOptions::default());
    let expected = record(json!({
        "user_id": "42",
        "user_email": "alice@example.com",
        "user_ip_address": "10.0.0.1",
    }));
    assert_eq!(event, expected);

    bind_user(user).run(|_| {
        let mut event = LogRecord::new();
        add_context_user_log(&mut event, None, &LogOptions::default());
        assert_eq!(event, expected);
    });

    let mut untouched = LogRecord::new();
    add_context_user_log(&mut untouched, None, &LogOptions::default());
    assert!(untouched.is_empty());
}

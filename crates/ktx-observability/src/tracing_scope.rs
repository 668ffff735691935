//! Observability scope backed by `tracing` spans and events.
//!
//! Each nested scope is a `ktx.scope` span whose `uq_id` field is filled in
//! when the id tag is set; extras, other tags and user fields become debug
//! events recorded inside the innermost span the calling task opened.

use ktx_core::scope::{ObservabilityScope, ScopeHandle, next_scope_handle};
use ktx_core::slot;
use ktx_core::{ScopeError, ScopeResult};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::Span;

#[derive(Debug, Default)]
pub struct TracingScope {
    spans: Mutex<HashMap<ScopeHandle, Span>>,
}

impl TracingScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nested scopes the calling task has open here.
    pub fn depth(&self) -> usize {
        let spans = self.spans.lock();
        spans
            .keys()
            .filter(|handle| slot::has_scope_handle(**handle))
            .count()
    }

    fn current_span(spans: &HashMap<ScopeHandle, Span>) -> Option<Span> {
        slot::innermost_scope_handle(|handle| spans.contains_key(&handle))
            .and_then(|handle| spans.get(&handle).cloned())
    }

    fn in_current<R>(&self, f: impl FnOnce() -> R) -> R {
        let current = Self::current_span(&self.spans.lock());
        match current {
            Some(span) => span.in_scope(f),
            None => f(),
        }
    }
}

impl ObservabilityScope for TracingScope {
    fn set_extra(&self, key: &str, value: &Value) -> ScopeResult<()> {
        self.in_current(|| tracing::debug!(key, value = %value, "scope extra"));
        Ok(())
    }

    fn set_tag(&self, key: &str, value: &str) -> ScopeResult<()> {
        self.in_current(|| {
            if key == "uq_id" {
                Span::current().record("uq_id", value);
            }
            tracing::debug!(key, value, "scope tag");
        });
        Ok(())
    }

    fn set_user(&self, user: &Map<String, Value>) -> ScopeResult<()> {
        let user = Value::Object(user.clone());
        self.in_current(|| tracing::debug!(user = %user, "scope user"));
        Ok(())
    }

    fn set_user_field(&self, key: &str, value: &Value) -> ScopeResult<()> {
        self.in_current(|| tracing::debug!(key, value = %value, "scope user field"));
        Ok(())
    }

    fn open_scope(&self) -> ScopeResult<ScopeHandle> {
        let handle = next_scope_handle();
        let mut spans = self.spans.lock();
        let span = match Self::current_span(&spans) {
            Some(parent) => tracing::debug_span!(
                parent: &parent,
                "ktx.scope",
                handle = handle.raw(),
                uq_id = tracing::field::Empty
            ),
            None => tracing::debug_span!(
                "ktx.scope",
                handle = handle.raw(),
                uq_id = tracing::field::Empty
            ),
        };
        spans.insert(handle, span);
        slot::push_scope_handle(handle);
        Ok(handle)
    }

    fn close_scope(&self, handle: ScopeHandle) -> ScopeResult<()> {
        let mut spans = self.spans.lock();
        if !spans.contains_key(&handle) {
            return Err(ScopeError::UnknownHandle(handle.raw()));
        }
        let open = &*spans;
        let closed = slot::close_scope_handles(handle, |h| open.contains_key(&h));
        for closed in closed {
            spans.remove(&closed);
        }
        Ok(())
    }
}

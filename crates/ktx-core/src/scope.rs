//! External observability scope interface.
//!
//! Contexts mirror their ids, data and users into an error-reporting or
//! APM scope through [`ObservabilityScope`]. Mirroring is a side channel:
//! every failure is logged and swallowed by the callers in this crate.

use crate::error::{KtxError, Result, ScopeError, ScopeResult};
use crate::observer::ContextObserver;
use crate::slot;
use crate::value::{PRIVATE_PREFIX, is_private_key};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Handle for a nested scope returned by [`ObservabilityScope::open_scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeHandle(u64);

impl ScopeHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique scope handle.
pub fn next_scope_handle() -> ScopeHandle {
    ScopeHandle(HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Capabilities consumed from an external observability tool.
pub trait ObservabilityScope: Send + Sync {
    /// Set an extra field on the current scope.
    fn set_extra(&self, key: &str, value: &Value) -> ScopeResult<()>;

    /// Set a tag on the current scope.
    fn set_tag(&self, key: &str, value: &str) -> ScopeResult<()>;

    /// Replace the whole user identity of the current scope.
    fn set_user(&self, user: &Map<String, Value>) -> ScopeResult<()>;

    /// Set a single user identity field on the current scope.
    fn set_user_field(&self, key: &str, value: &Value) -> ScopeResult<()>;

    /// Open a nested scope inheriting the current one.
    fn open_scope(&self) -> ScopeResult<ScopeHandle>;

    /// Close a nested scope and everything the calling task opened after it.
    fn close_scope(&self, handle: ScopeHandle) -> ScopeResult<()>;
}

pub type SharedScope = Arc<dyn ObservabilityScope>;

/// Null object used when no observability backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScope;

impl ObservabilityScope for NoopScope {
    fn set_extra(&self, _key: &str, _value: &Value) -> ScopeResult<()> {
        Ok(())
    }

    fn set_tag(&self, _key: &str, _value: &str) -> ScopeResult<()> {
        Ok(())
    }

    fn set_user(&self, _user: &Map<String, Value>) -> ScopeResult<()> {
        Ok(())
    }

    fn set_user_field(&self, _key: &str, _value: &Value) -> ScopeResult<()> {
        Ok(())
    }

    fn open_scope(&self) -> ScopeResult<ScopeHandle> {
        Ok(next_scope_handle())
    }

    fn close_scope(&self, _handle: ScopeHandle) -> ScopeResult<()> {
        Ok(())
    }
}

/// Contents of one scope frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeFrame {
    pub extras: BTreeMap<String, Value>,
    pub tags: BTreeMap<String, String>,
    pub user: Map<String, Value>,
}

/// In-process scope that keeps nested frames per task.
///
/// A nested frame starts as a copy of the frame that was current for the
/// opening task, so closing it discards everything written while it was
/// open. Each task writes to the innermost frame it opened itself, or to the
/// shared base frame when it has none open. The base frame is never closed.
#[derive(Debug, Default)]
pub struct InMemoryScope {
    frames: Mutex<Frames>,
}

#[derive(Debug, Default)]
struct Frames {
    base: ScopeFrame,
    nested: HashMap<ScopeHandle, ScopeFrame>,
}

impl Frames {
    fn current_handle(&self) -> Option<ScopeHandle> {
        slot::innermost_scope_handle(|handle| self.nested.contains_key(&handle))
    }

    fn current(&self) -> &ScopeFrame {
        self.current_handle()
            .and_then(|handle| self.nested.get(&handle))
            .unwrap_or(&self.base)
    }

    fn current_mut(&mut self) -> &mut ScopeFrame {
        match self.current_handle() {
            Some(handle) => self.nested.entry(handle).or_default(),
            None => &mut self.base,
        }
    }
}

impl InMemoryScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the calling task's innermost frame.
    pub fn current(&self) -> ScopeFrame {
        self.frames.lock().current().clone()
    }

    pub fn extra(&self, key: &str) -> Option<Value> {
        self.current().extras.get(key).cloned()
    }

    pub fn tag(&self, key: &str) -> Option<String> {
        self.current().tags.get(key).cloned()
    }

    pub fn user(&self) -> Map<String, Value> {
        self.current().user
    }

    /// Number of nested scopes the calling task has open here.
    pub fn depth(&self) -> usize {
        let frames = self.frames.lock();
        frames
            .nested
            .keys()
            .filter(|handle| slot::has_scope_handle(**handle))
            .count()
    }

    fn with_top<R>(&self, f: impl FnOnce(&mut ScopeFrame) -> R) -> R {
        f(self.frames.lock().current_mut())
    }
}

impl ObservabilityScope for InMemoryScope {
    fn set_extra(&self, key: &str, value: &Value) -> ScopeResult<()> {
        self.with_top(|frame| frame.extras.insert(key.to_string(), value.clone()));
        Ok(())
    }

    fn set_tag(&self, key: &str, value: &str) -> ScopeResult<()> {
        self.with_top(|frame| frame.tags.insert(key.to_string(), value.to_string()));
        Ok(())
    }

    fn set_user(&self, user: &Map<String, Value>) -> ScopeResult<()> {
        self.with_top(|frame| frame.user = user.clone());
        Ok(())
    }

    fn set_user_field(&self, key: &str, value: &Value) -> ScopeResult<()> {
        self.with_top(|frame| frame.user.insert(key.to_string(), value.clone()));
        Ok(())
    }

    fn open_scope(&self) -> ScopeResult<ScopeHandle> {
        let handle = next_scope_handle();
        let mut frames = self.frames.lock();
        let inherited = frames.current().clone();
        frames.nested.insert(handle, inherited);
        slot::push_scope_handle(handle);
        Ok(handle)
    }

    fn close_scope(&self, handle: ScopeHandle) -> ScopeResult<()> {
        let mut frames = self.frames.lock();
        if !frames.nested.contains_key(&handle) {
            return Err(ScopeError::UnknownHandle(handle.raw()));
        }
        let nested = &frames.nested;
        let closed = slot::close_scope_handles(handle, |h| nested.contains_key(&h));
        for closed in closed {
            frames.nested.remove(&closed);
        }
        Ok(())
    }
}

/// Forwards data writes to a scope as extras, skipping private keys.
pub struct DataScopeMirror {
    scope: SharedScope,
    ignore_prefix: Option<String>,
}

impl DataScopeMirror {
    pub fn new(scope: SharedScope) -> Self {
        Self {
            scope,
            ignore_prefix: Some(PRIVATE_PREFIX.to_string()),
        }
    }

    /// Change the skipped prefix; `None` mirrors every key.
    pub fn with_ignore_prefix(mut self, prefix: Option<String>) -> Self {
        self.ignore_prefix = prefix;
        self
    }

    fn ignored(&self, key: &str) -> bool {
        match &self.ignore_prefix {
            Some(prefix) if prefix == PRIVATE_PREFIX => is_private_key(key),
            Some(prefix) => key.starts_with(prefix.as_str()),
            None => false,
        }
    }
}

impl ContextObserver for DataScopeMirror {
    fn set(&self, key: &str, value: &Value) {
        if self.ignored(key) {
            return;
        }
        if let Err(error) = self.scope.set_extra(key, value) {
            tracing::warn!(key, %error, "failed to mirror context data into observability scope");
        }
    }
}

/// Forwards user field writes into the scope's user identity.
pub struct UserScopeMirror {
    scope: SharedScope,
}

impl UserScopeMirror {
    pub fn new(scope: SharedScope) -> Self {
        Self { scope }
    }
}

impl ContextObserver for UserScopeMirror {
    fn set(&self, key: &str, value: &Value) {
        if let Err(error) = self.scope.set_user_field(key, value) {
            tracing::warn!(key, %error, "failed to mirror context user into observability scope");
        }
    }
}

static DEFAULT_SCOPE: OnceLock<SharedScope> = OnceLock::new();

/// Install the process-wide default scope. First call wins.
pub fn install_default_scope(scope: SharedScope) -> Result<()> {
    DEFAULT_SCOPE.set(scope).map_err(|_| {
        KtxError::Configuration("default observability scope is already installed".to_string())
    })
}

/// The installed default scope, if any.
pub fn installed_scope() -> Option<SharedScope> {
    DEFAULT_SCOPE.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_scope_discards_writes_on_close() {
        let scope = InMemoryScope::new();
        scope.set_tag("outer", "1").unwrap();

        let handle = scope.open_scope().unwrap();
        scope.set_tag("uq_id", "abc").unwrap();
        assert_eq!(scope.tag("outer").as_deref(), Some("1"));
        assert_eq!(scope.tag("uq_id").as_deref(), Some("abc"));

        scope.close_scope(handle).unwrap();
        assert_eq!(scope.tag("uq_id"), None);
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn closing_unknown_handle_fails() {
        let scope = InMemoryScope::new();
        let err = scope.close_scope(ScopeHandle::new(u64::MAX)).unwrap_err();
        assert_eq!(err, ScopeError::UnknownHandle(u64::MAX));
    }

    #[test]
    fn data_mirror_skips_private_keys() {
        let scope = Arc::new(InMemoryScope::new());
        let mirror = DataScopeMirror::new(scope.clone());
        mirror.set("attr1", &json!("val1"));
        mirror.set("_attr2", &json!("val2"));

        assert_eq!(scope.extra("attr1"), Some(json!("val1")));
        assert_eq!(scope.extra("_attr2"), None);
    }

    #[test]
    fn data_mirror_without_prefix_mirrors_everything() {
        let scope = Arc::new(InMemoryScope::new());
        let mirror = DataScopeMirror::new(scope.clone()).with_ignore_prefix(None);
        mirror.set("_attr2", &json!("val2"));
        assert_eq!(scope.extra("_attr2"), Some(json!("val2")));
    }
}

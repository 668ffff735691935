//! Observability scopes with scripted behaviour.

use ktx_core::scope::{ObservabilityScope, ScopeHandle};
use ktx_core::{ScopeError, ScopeResult};
use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Scope whose every operation fails, for exercising swallowed errors.
#[derive(Debug, Default)]
pub struct FailingScope {
    calls: Mutex<Vec<&'static str>>,
}

impl FailingScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the operations attempted so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn fail<T>(&self, op: &'static str) -> ScopeResult<T> {
        self.calls.lock().push(op);
        Err(ScopeError::Backend(format!("{op} rejected")))
    }
}

impl ObservabilityScope for FailingScope {
    fn set_extra(&self, _key: &str, _value: &Value) -> ScopeResult<()> {
        self.fail("set_extra")
    }

    fn set_tag(&self, _key: &str, _value: &str) -> ScopeResult<()> {
        self.fail("set_tag")
    }

    fn set_user(&self, _user: &Map<String, Value>) -> ScopeResult<()> {
        self.fail("set_user")
    }

    fn set_user_field(&self, _key: &str, _value: &Value) -> ScopeResult<()> {
        self.fail("set_user_field")
    }

    fn open_scope(&self) -> ScopeResult<ScopeHandle> {
        self.fail("open_scope")
    }

    fn close_scope(&self, _handle: ScopeHandle) -> ScopeResult<()> {
        self.fail("close_scope")
    }
}

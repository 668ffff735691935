use ktx_core::{ContextObserver, ContextUser};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Observer that remembers every write it sees, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.events.lock().iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn last(&self, key: &str) -> Option<Value> {
        self.events
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ContextObserver for RecordingObserver {
    fn set(&self, key: &str, value: &Value) {
        self.events.lock().push((key.to_string(), value.clone()));
    }
}

/// A user with every attribute populated.
pub fn sample_user() -> ContextUser {
    ContextUser::new()
        .with_id(42)
        .with_username("alice")
        .with_email("alice@example.com")
        .with_ip_address("10.0.0.1")
}

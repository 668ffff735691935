//! User identity attached to a context or bound standalone.

use crate::any::AsAny;
use crate::observer::{ContextObserver, SharedObserver, notify};
use crate::scope::{SharedScope, UserScopeMirror};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;

pub const USER_ID_KEY: &str = "id";
pub const USER_USERNAME_KEY: &str = "username";
pub const USER_EMAIL_KEY: &str = "email";
pub const USER_IP_ADDRESS_KEY: &str = "ip_address";

/// Identity attributes of the user a task is working for.
///
/// Absent attributes are `None`, never an empty string. Setters take `&self`
/// so an identity shared through the task-local slot can be updated in
/// place.
pub trait UserIdentity: AsAny {
    fn get_id(&self) -> Option<Value>;
    fn get_username(&self) -> Option<String>;
    fn get_email(&self) -> Option<String>;
    fn get_ip_address(&self) -> Option<String>;

    fn set_id(&self, value: Option<Value>);
    fn set_username(&self, value: Option<String>);
    fn set_email(&self, value: Option<String>);
    fn set_ip_address(&self, value: Option<String>);

    /// Overwrite all four attributes from `other` without notifying observers.
    fn copy_from(&self, other: &dyn UserIdentity);

    /// Present attributes keyed by their observer names.
    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(id) = self.get_id().filter(|id| !id.is_null()) {
            map.insert(USER_ID_KEY.to_string(), id);
        }
        if let Some(username) = self.get_username() {
            map.insert(USER_USERNAME_KEY.to_string(), Value::String(username));
        }
        if let Some(email) = self.get_email() {
            map.insert(USER_EMAIL_KEY.to_string(), Value::String(email));
        }
        if let Some(ip) = self.get_ip_address() {
            map.insert(USER_IP_ADDRESS_KEY.to_string(), Value::String(ip));
        }
        map
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct UserFields {
    id: Option<Value>,
    username: Option<String>,
    email: Option<String>,
    ip: Option<String>,
}

/// Default [`UserIdentity`] implementation.
#[derive(Default)]
pub struct ContextUser {
    fields: RwLock<UserFields>,
    observers: Vec<SharedObserver>,
    scope_mirror: Option<UserScopeMirror>,
}

impl ContextUser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.fields.get_mut().id = Some(id.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.fields.get_mut().username = Some(username.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.fields.get_mut().email = Some(email.into());
        self
    }

    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.fields.get_mut().ip = Some(ip.into());
        self
    }

    /// Register an observer called after every attribute write.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_observers(mut self, observers: impl IntoIterator<Item = SharedObserver>) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Mirror attribute writes into the scope's user identity, after observers.
    pub fn with_scope(mut self, scope: SharedScope) -> Self {
        self.scope_mirror = Some(UserScopeMirror::new(scope));
        self
    }

    fn post_apply(&self, key: &str, value: Value) {
        notify(&self.observers, key, &value);
        if let Some(mirror) = &self.scope_mirror {
            mirror.set(key, &value);
        }
    }
}

fn optional_string(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

impl UserIdentity for ContextUser {
    fn get_id(&self) -> Option<Value> {
        self.fields.read().id.clone()
    }

    fn get_username(&self) -> Option<String> {
        self.fields.read().username.clone()
    }

    fn get_email(&self) -> Option<String> {
        self.fields.read().email.clone()
    }

    fn get_ip_address(&self) -> Option<String> {
        self.fields.read().ip.clone()
    }

    fn set_id(&self, value: Option<Value>) {
        self.fields.write().id = value.clone();
        self.post_apply(USER_ID_KEY, value.unwrap_or(Value::Null));
    }

    fn set_username(&self, value: Option<String>) {
        self.fields.write().username = value.clone();
        self.post_apply(USER_USERNAME_KEY, optional_string(value));
    }

    fn set_email(&self, value: Option<String>) {
        self.fields.write().email = value.clone();
        self.post_apply(USER_EMAIL_KEY, optional_string(value));
    }

    fn set_ip_address(&self, value: Option<String>) {
        self.fields.write().ip = value.clone();
        self.post_apply(USER_IP_ADDRESS_KEY, optional_string(value));
    }

    fn copy_from(&self, other: &dyn UserIdentity) {
        let copied = UserFields {
            id: other.get_id(),
            username: other.get_username(),
            email: other.get_email(),
            ip: other.get_ip_address(),
        };
        *self.fields.write() = copied;
    }
}

impl fmt::Debug for ContextUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.read();
        f.debug_struct("ContextUser")
            .field("id", &fields.id)
            .field("username", &fields.username)
            .field("email", &fields.email)
            .field("ip", &fields.ip)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Creates users wired to a fixed set of observers.
#[derive(Default, Clone)]
pub struct ContextUserFactory {
    observers: Vec<SharedObserver>,
    scope: Option<SharedScope>,
}

impl ContextUserFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_scope(mut self, scope: SharedScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn create(&self) -> ContextUser {
        let user = ContextUser::new().with_observers(self.observers.iter().cloned());
        match &self.scope {
            Some(scope) => user.with_scope(scope.clone()),
            None => user,
        }
    }
}

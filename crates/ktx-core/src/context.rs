//! Contexts: an id, a data bag and a user bound together.
//!
//! [`AnyContext`] is the object-safe interface stored in the task-local
//! slot, so user-defined context types can be bound alongside the generic
//! [`Context`].

use crate::any::AsAny;
use crate::data::{ContextData, DictData};
use crate::error::{KtxError, Result};
use crate::ids::{IdGenerator, default_uq_id};
use crate::observer::{SharedObserver, notify};
use crate::scope::{SharedScope, installed_scope};
use crate::slot;
use crate::user::{ContextUser, UserIdentity};
use crate::value::Snapshot;
use serde_json::Value;
use std::any::{Any, type_name};
use std::fmt;

/// Interface shared by every bindable context.
pub trait AnyContext: AsAny {
    /// Unique id, fixed at construction.
    fn uq_id(&self) -> &str;

    /// Snapshot of the context data.
    fn get_data(&self) -> Snapshot;

    /// The user owned by this context, when the context models one.
    fn user(&self) -> Option<&dyn UserIdentity> {
        None
    }

    /// Type name of the data shape, used in inheritance errors.
    fn data_shape(&self) -> &'static str;

    /// The data bag as `Any`, for same-shape inheritance.
    fn data_any(&self) -> Option<&dyn Any> {
        None
    }

    /// Observability scope opened around binds of this context.
    fn scope(&self) -> Option<&SharedScope> {
        None
    }
}

/// Generic context over a data shape.
pub struct Context<D: ContextData = DictData> {
    uq_id: String,
    data: D,
    user: ContextUser,
    observers: Vec<SharedObserver>,
    scope: Option<SharedScope>,
}

impl<D: ContextData> Context<D> {
    pub fn builder() -> ContextBuilder<D> {
        ContextBuilder::new()
    }

    /// Build a context with an explicit id and default inheritance.
    pub fn new(uq_id: impl Into<String>) -> Result<Self> {
        Self::builder().with_uq_id(uq_id).build()
    }

    pub fn uq_id(&self) -> &str {
        &self.uq_id
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn user(&self) -> &ContextUser {
        &self.user
    }

    pub fn get_data(&self) -> Snapshot {
        self.data.to_dict()
    }
}

impl Context<DictData> {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key)
    }

    /// Write through to the data, then notify context observers.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.data.set(key.as_str(), value.clone());
        notify(&self.observers, &key, &value);
    }
}

impl<D: ContextData> AnyContext for Context<D> {
    fn uq_id(&self) -> &str {
        &self.uq_id
    }

    fn get_data(&self) -> Snapshot {
        self.data.to_dict()
    }

    fn user(&self) -> Option<&dyn UserIdentity> {
        Some(&self.user)
    }

    fn data_shape(&self) -> &'static str {
        type_name::<D>()
    }

    fn data_any(&self) -> Option<&dyn Any> {
        Some(&self.data)
    }

    fn scope(&self) -> Option<&SharedScope> {
        self.scope.as_ref()
    }
}

impl<D: ContextData> fmt::Debug for Context<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("uq_id", &self.uq_id)
            .field("data_shape", &type_name::<D>())
            .field("user", &self.user)
            .field("observers", &self.observers.len())
            .field("scope", &self.scope.is_some())
            .finish()
    }
}

/// Builder resolving id, user, data and inheritance for a [`Context`].
pub struct ContextBuilder<D: ContextData = DictData> {
    uq_id: Option<String>,
    id_generator: Option<IdGenerator>,
    inherit_user: bool,
    inherit_data: bool,
    user: Option<ContextUser>,
    data: Option<D>,
    observers: Vec<SharedObserver>,
    scope: Option<SharedScope>,
    use_installed_scope: bool,
}

impl<D: ContextData> ContextBuilder<D> {
    pub fn new() -> Self {
        Self {
            uq_id: None,
            id_generator: None,
            inherit_user: true,
            inherit_data: true,
            user: None,
            data: None,
            observers: Vec::new(),
            scope: None,
            use_installed_scope: true,
        }
    }

    pub fn with_uq_id(mut self, uq_id: impl Into<String>) -> Self {
        self.uq_id = Some(uq_id.into());
        self
    }

    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = Some(generator);
        self
    }

    pub fn inherit_user(mut self, inherit: bool) -> Self {
        self.inherit_user = inherit;
        self
    }

    pub fn inherit_data(mut self, inherit: bool) -> Self {
        self.inherit_data = inherit;
        self
    }

    pub fn with_user(mut self, user: ContextUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_data(mut self, data: D) -> Self {
        self.data = Some(data);
        self
    }

    /// Register an observer called after every [`Context::set`].
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_observers(mut self, observers: impl IntoIterator<Item = SharedObserver>) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Scope to mirror into and to open around binds. Defaults to the
    /// installed process scope.
    pub fn with_scope(mut self, scope: SharedScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Do not fall back to the installed process scope.
    pub fn without_scope(mut self) -> Self {
        self.scope = None;
        self.use_installed_scope = false;
        self
    }

    pub fn build(self) -> Result<Context<D>> {
        let uq_id = match (self.uq_id, &self.id_generator) {
            (Some(uq_id), _) => uq_id,
            (None, Some(generator)) => generator(),
            (None, None) => default_uq_id(),
        };

        let scope = match self.scope {
            Some(scope) => Some(scope),
            None if self.use_installed_scope => installed_scope(),
            None => None,
        };

        let user = match (self.user, &scope) {
            (Some(user), _) => user,
            (None, Some(scope)) => ContextUser::new().with_scope(scope.clone()),
            (None, None) => ContextUser::new(),
        };

        let data = match self.data {
            Some(data) => data,
            None => D::make_default(scope.as_ref()).ok_or(KtxError::DataShapeUndeducible {
                shape: type_name::<D>(),
            })?,
        };

        if self.inherit_data || self.inherit_user {
            if let Some(parent) = slot::current_context() {
                if self.inherit_data {
                    let parent_data = parent
                        .data_any()
                        .and_then(|data| data.downcast_ref::<D>())
                        .ok_or(KtxError::InheritShapeMismatch {
                            parent: parent.data_shape(),
                            child: type_name::<D>(),
                        })?;
                    data.copy_from(&parent_data.to_dict());
                }
                if self.inherit_user {
                    if let Some(parent_user) = parent.user() {
                        user.copy_from(parent_user);
                    }
                }
                tracing::trace!(
                    uq_id = %uq_id,
                    parent = %parent.uq_id(),
                    inherit_data = self.inherit_data,
                    inherit_user = self.inherit_user,
                    "context inherited from active parent"
                );
            }
        }

        Ok(Context {
            uq_id,
            data,
            user,
            observers: self.observers,
            scope,
        })
    }
}

impl<D: ContextData> Default for ContextBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

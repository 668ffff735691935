//! Preconfigured context construction.

use crate::context::{Context, ContextBuilder};
use crate::data::{ContextData, DictData};
use crate::error::Result;
use crate::ids::IdGenerator;
use crate::observer::SharedObserver;
use crate::scope::{SharedScope, installed_scope};
use crate::user::ContextUserFactory;
use std::fmt;
use std::marker::PhantomData;

/// Builds contexts that share an id strategy, inheritance flags, observers
/// and an observability scope.
pub struct ContextFactory<D: ContextData = DictData> {
    id_generator: Option<IdGenerator>,
    inherit_user: bool,
    inherit_data: bool,
    observers: Vec<SharedObserver>,
    user_factory: ContextUserFactory,
    scope: Option<SharedScope>,
    _shape: PhantomData<fn() -> D>,
}

impl<D: ContextData> ContextFactory<D> {
    pub fn new() -> Self {
        Self {
            id_generator: None,
            inherit_user: true,
            inherit_data: true,
            observers: Vec::new(),
            user_factory: ContextUserFactory::new(),
            scope: None,
            _shape: PhantomData,
        }
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

    /// Observer attached to every created context.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    /// Observer attached to the user of every created context.
    pub fn with_user_observer(mut self, observer: SharedObserver) -> Self {
        self.user_factory = self.user_factory.with_observer(observer);
        self
    }

    pub fn with_scope(mut self, scope: SharedScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Create a context, generating an id unless one is given.
    ///
    /// Without an explicit scope the installed process scope is used.
    pub fn create(&self, uq_id: Option<&str>) -> Result<Context<D>> {
        let scope = self.scope.clone().or_else(installed_scope);
        let user = match &scope {
            Some(scope) => self.user_factory.clone().with_scope(scope.clone()).create(),
            None => self.user_factory.create(),
        };
        let mut builder = ContextBuilder::<D>::new()
            .inherit_user(self.inherit_user)
            .inherit_data(self.inherit_data)
            .with_observers(self.observers.iter().cloned())
            .with_user(user);

        if let Some(uq_id) = uq_id {
            builder = builder.with_uq_id(uq_id);
        }
        if let Some(generator) = &self.id_generator {
            builder = builder.with_id_generator(generator.clone());
        }
        builder = match scope {
            Some(scope) => builder.with_scope(scope),
            None => builder.without_scope(),
        };
        builder.build()
    }
}

impl<D: ContextData> Default for ContextFactory<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ContextData> Clone for ContextFactory<D> {
    fn clone(&self) -> Self {
        Self {
            id_generator: self.id_generator.clone(),
            inherit_user: self.inherit_user,
            inherit_data: self.inherit_data,
            observers: self.observers.clone(),
            user_factory: self.user_factory.clone(),
            scope: self.scope.clone(),
            _shape: PhantomData,
        }
    }
}

impl<D: ContextData> fmt::Debug for ContextFactory<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFactory")
            .field("data_shape", &std::any::type_name::<D>())
            .field("inherit_user", &self.inherit_user)
            .field("inherit_data", &self.inherit_data)
            .field("observers", &self.observers.len())
            .field("scope", &self.scope.is_some())
            .finish()
    }
}

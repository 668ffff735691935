//! Scoped binding of contexts and users into the task-local slot.
//!
//! A bind guard installs its value on [`bind`](ContextBind::bind) and
//! restores the previous slot value on [`unbind`](ContextBind::unbind) or
//! drop, so release runs exactly once on every exit path, including panics
//! and cancelled futures.

use crate::context::AnyContext;
use crate::scope::{ScopeHandle, SharedScope};
use crate::slot::{self, ContextToken, UserToken};
use crate::user::UserIdentity;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub const UQ_ID_SCOPE_KEY: &str = "uq_id";

struct OpenScope {
    scope: SharedScope,
    handle: ScopeHandle,
}

/// Acquire/release wrapper for a context.
pub struct ContextBind<C: AnyContext> {
    ctx: Arc<C>,
    token: Option<ContextToken>,
    open_scope: Option<OpenScope>,
}

impl<C: AnyContext> ContextBind<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self {
            ctx,
            token: None,
            open_scope: None,
        }
    }

    pub fn ctx(&self) -> &Arc<C> {
        &self.ctx
    }

    pub fn is_bound(&self) -> bool {
        self.token.is_some()
    }

    /// Install the context and open a nested observability scope tagged with
    /// its id. Binding an already bound guard is a no-op.
    pub fn bind(&mut self) -> Arc<C> {
        if self.token.is_some() {
            return self.ctx.clone();
        }

        let ctx: Arc<dyn AnyContext> = self.ctx.clone();
        self.token = Some(slot::attach_context(ctx));
        tracing::debug!(uq_id = %self.ctx.uq_id(), "context bound");

        if let Some(scope) = self.ctx.scope() {
            self.open_scope = open_tagged_scope(scope, self.ctx.uq_id());
        }
        self.ctx.clone()
    }

    /// Restore the slot, then close the nested scope. Idempotent.
    pub fn unbind(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        slot::detach_context(token);
        tracing::debug!(uq_id = %self.ctx.uq_id(), "context unbound");

        if let Some(open) = self.open_scope.take() {
            if let Err(error) = open.scope.close_scope(open.handle) {
                tracing::warn!(uq_id = %self.ctx.uq_id(), %error, "failed to close observability scope");
            }
        }
    }

    /// Bind and hand back the guard; the context unbinds when it drops.
    pub fn entered(mut self) -> Self {
        self.bind();
        self
    }

    /// Run `f` with the context bound.
    pub fn run<R>(mut self, f: impl FnOnce(&Arc<C>) -> R) -> R {
        let ctx = self.bind();
        f(&ctx)
    }

    /// Run `fut` in its own task slot with the context bound.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        slot::fork(async move {
            let _guard = self.entered();
            fut.await
        })
        .await
    }
}

impl<C: AnyContext> Drop for ContextBind<C> {
    fn drop(&mut self) {
        self.unbind();
    }
}

fn open_tagged_scope(scope: &SharedScope, uq_id: &str) -> Option<OpenScope> {
    let handle = match scope.open_scope() {
        Ok(handle) => handle,
        Err(error) => {
            tracing::warn!(uq_id, %error, "failed to open observability scope");
            return None;
        }
    };
    if let Err(error) = scope.set_tag(UQ_ID_SCOPE_KEY, uq_id) {
        tracing::warn!(uq_id, %error, "failed to tag observability scope");
    }
    if let Err(error) = scope.set_extra(UQ_ID_SCOPE_KEY, &Value::from(uq_id)) {
        tracing::warn!(uq_id, %error, "failed to set observability scope extra");
    }
    Some(OpenScope {
        scope: scope.clone(),
        handle,
    })
}

/// Acquire/release wrapper for a standalone user.
pub struct UserBind<U: UserIdentity> {
    user: Arc<U>,
    token: Option<UserToken>,
}

impl<U: UserIdentity> UserBind<U> {
    pub fn new(user: Arc<U>) -> Self {
        Self { user, token: None }
    }

    pub fn user(&self) -> &Arc<U> {
        &self.user
    }

    pub fn is_bound(&self) -> bool {
        self.token.is_some()
    }

    pub fn bind(&mut self) -> Arc<U> {
        if self.token.is_none() {
            let user: Arc<dyn UserIdentity> = self.user.clone();
            self.token = Some(slot::attach_user(user));
        }
        self.user.clone()
    }

    pub fn unbind(&mut self) {
        if let Some(token) = self.token.take() {
            slot::detach_user(token);
        }
    }

    pub fn entered(mut self) -> Self {
        self.bind();
        self
    }

    pub fn run<R>(mut self, f: impl FnOnce(&Arc<U>) -> R) -> R {
        let user = self.bind();
        f(&user)
    }

    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        slot::fork(async move {
            let _guard = self.entered();
            fut.await
        })
        .await
    }
}

impl<U: UserIdentity> Drop for UserBind<U> {
    fn drop(&mut self) {
        self.unbind();
    }
}

pub fn bind<C: AnyContext>(ctx: Arc<C>) -> ContextBind<C> {
    ContextBind::new(ctx)
}

pub fn bind_user<U: UserIdentity>(user: Arc<U>) -> UserBind<U> {
    UserBind::new(user)
}

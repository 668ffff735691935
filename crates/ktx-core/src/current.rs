//! Accessors for the context and user bound in the current task.

use crate::any::AsAny;
use crate::context::AnyContext;
use crate::error::{KtxError, Result};
use crate::slot;
use crate::user::UserIdentity;
use std::any::type_name;
use std::sync::Arc;

/// The active context, if any.
pub fn get_current() -> Option<Arc<dyn AnyContext>> {
    slot::current_context()
}

pub fn get_current_or_fail() -> Result<Arc<dyn AnyContext>> {
    slot::current_context().ok_or(KtxError::NoActiveContext)
}

/// The active context as the concrete type `C`.
///
/// Fails with [`KtxError::NoActiveContext`] when nothing is bound and with
/// [`KtxError::ContextTypeMismatch`] when the bound context is another type.
pub fn get_current_as<C: AnyContext>() -> Result<Arc<C>> {
    let ctx = get_current_or_fail()?;
    if !AsAny::as_any(&*ctx).is::<C>() {
        return Err(KtxError::ContextTypeMismatch {
            expected: type_name::<C>(),
            actual: describe_context(&*ctx),
        });
    }
    AsAny::into_any_arc(ctx)
        .downcast::<C>()
        .map_err(|_| KtxError::ContextTypeMismatch {
            expected: type_name::<C>(),
            actual: "unknown".to_string(),
        })
}

// `type_name` drops defaulted generic parameters, so name the data shape
// whenever the type name leaves it out.
fn describe_context(ctx: &dyn AnyContext) -> String {
    let name = AsAny::type_name(ctx);
    let shape = ctx.data_shape();
    if name.contains(shape) {
        name.to_string()
    } else {
        format!("{name} (data {shape})")
    }
}

/// The active standalone user, if any.
pub fn get_current_user() -> Option<Arc<dyn UserIdentity>> {
    slot::current_user()
}

pub fn get_current_user_or_fail() -> Result<Arc<dyn UserIdentity>> {
    slot::current_user().ok_or(KtxError::NoActiveUser)
}

pub fn get_current_user_as<U: UserIdentity>() -> Result<Arc<U>> {
    let user = get_current_user_or_fail()?;
    if !AsAny::as_any(&*user).is::<U>() {
        return Err(KtxError::UserTypeMismatch {
            expected: type_name::<U>(),
            actual: AsAny::type_name(&*user),
        });
    }
    AsAny::into_any_arc(user)
        .downcast::<U>()
        .map_err(|_| KtxError::UserTypeMismatch {
            expected: type_name::<U>(),
            actual: "unknown",
        })
}

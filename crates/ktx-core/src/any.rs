//! Downcasting support for trait objects stored in the task-local slot.

use std::any::Any;
use std::sync::Arc;

/// Implemented for every `'static + Send + Sync` type.
///
/// Call through the trait path (`AsAny::type_name(&*value)`) on `Arc`s so
/// the blanket impl for the `Arc` itself is not picked.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

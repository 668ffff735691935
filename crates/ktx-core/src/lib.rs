//! Task-scoped request context: ids, data, users and the slot they live in.
//!
//! A [`Context`] is bound to the current task with [`bind`]; any code running
//! in that task reads it back with [`get_current`] without the context being
//! threaded through call signatures.

pub mod any;
pub mod bind;
pub mod context;
pub mod current;
pub mod data;
pub mod error;
pub mod factory;
pub mod ids;
pub mod observer;
pub mod record;
pub mod scope;
pub mod slot;
pub mod user;
pub mod value;

pub use any::AsAny;
pub use bind::{ContextBind, UserBind, bind, bind_user};
pub use context::{AnyContext, Context, ContextBuilder};
pub use current::{
    get_current, get_current_as, get_current_or_fail, get_current_user, get_current_user_as,
    get_current_user_or_fail,
};
pub use data::{ContextData, DictData};
pub use error::{KtxError, Result, ScopeError, ScopeResult};
pub use factory::ContextFactory;
pub use ids::{IdGenerator, default_uq_id, generator_fn, uuid_uq_id};
pub use observer::{ContextObserver, SharedObserver};
pub use record::{ContextRecord, RecordData};
pub use scope::{InMemoryScope, NoopScope, ObservabilityScope, ScopeHandle, SharedScope};
pub use user::{ContextUser, ContextUserFactory, UserIdentity};
pub use value::Snapshot;

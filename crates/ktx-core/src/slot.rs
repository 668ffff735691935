//! Task-local storage for the active context and user.
//!
//! Each logical task sees its own slot. Futures run through [`fork`] (or
//! spawned with [`spawn`]) get a task-local cell seeded with the caller's
//! current values; everything else uses a per-thread cell. Threads started
//! with [`spawn_thread`] inherit the caller's values the same way, plain
//! `std::thread::spawn` starts empty.
//!
//! The slot also records which observability scopes the task has open, so a
//! backend shared between tasks resolves its current frame per task.
//!
//! A bind on one task is never visible to a sibling task; children only see
//! what was active when they were forked.
//!
//! Async code that holds a bind guard across `.await` must run inside a
//! forked future. Otherwise the guard writes the worker thread's cell, which
//! other tasks scheduled on that thread can observe.

use crate::context::AnyContext;
use crate::scope::ScopeHandle;
use crate::user::UserIdentity;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

#[derive(Default, Clone)]
struct SlotCell {
    context: Option<Arc<dyn AnyContext>>,
    user: Option<Arc<dyn UserIdentity>>,
    scopes: Vec<ScopeHandle>,
}

thread_local! {
    static THREAD_SLOT: RefCell<SlotCell> = RefCell::new(SlotCell::default());
}

tokio::task_local! {
    static TASK_SLOT: RefCell<SlotCell>;
}

fn with_cell<R>(f: impl FnOnce(&mut SlotCell) -> R) -> R {
    if TASK_SLOT.try_with(|_| ()).is_ok() {
        TASK_SLOT.with(|cell| f(&mut cell.borrow_mut()))
    } else {
        THREAD_SLOT.with(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Restores the context slot to its value before the paired attach.
#[must_use = "dropping a token without detaching leaves the context bound"]
pub struct ContextToken {
    previous: Option<Arc<dyn AnyContext>>,
}

/// Restores the user slot to its value before the paired attach.
#[must_use = "dropping a token without detaching leaves the user bound"]
pub struct UserToken {
    previous: Option<Arc<dyn UserIdentity>>,
}

pub fn attach_context(context: Arc<dyn AnyContext>) -> ContextToken {
    let previous = with_cell(|cell| cell.context.replace(context));
    ContextToken { previous }
}

pub fn detach_context(token: ContextToken) {
    let replaced = with_cell(|cell| std::mem::replace(&mut cell.context, token.previous));
    drop(replaced);
}

pub fn attach_user(user: Arc<dyn UserIdentity>) -> UserToken {
    let previous = with_cell(|cell| cell.user.replace(user));
    UserToken { previous }
}

pub fn detach_user(token: UserToken) {
    let replaced = with_cell(|cell| std::mem::replace(&mut cell.user, token.previous));
    drop(replaced);
}

pub fn current_context() -> Option<Arc<dyn AnyContext>> {
    with_cell(|cell| cell.context.clone())
}

pub fn current_user() -> Option<Arc<dyn UserIdentity>> {
    with_cell(|cell| cell.user.clone())
}

/// Record `handle` as the innermost scope opened by the current task.
pub fn push_scope_handle(handle: ScopeHandle) {
    with_cell(|cell| cell.scopes.push(handle));
}

/// Forget `handle` and every scope accepted by `owned` that the current
/// task opened after it.
///
/// Returns the forgotten handles. A handle the task never opened is returned
/// alone and the task's stack is left as is.
pub fn close_scope_handles(
    handle: ScopeHandle,
    owned: impl Fn(ScopeHandle) -> bool,
) -> Vec<ScopeHandle> {
    with_cell(|cell| {
        let Some(position) = cell.scopes.iter().rposition(|h| *h == handle) else {
            return vec![handle];
        };
        let (closed, kept): (Vec<_>, Vec<_>) = cell
            .scopes
            .split_off(position)
            .into_iter()
            .partition(|h| *h == handle || owned(*h));
        cell.scopes.extend(kept);
        closed
    })
}

/// Whether the current task has `handle` open.
pub fn has_scope_handle(handle: ScopeHandle) -> bool {
    with_cell(|cell| cell.scopes.contains(&handle))
}

/// Innermost scope handle of the current task accepted by `owned`.
pub fn innermost_scope_handle(owned: impl Fn(ScopeHandle) -> bool) -> Option<ScopeHandle> {
    with_cell(|cell| cell.scopes.iter().rev().copied().find(|h| owned(*h)))
}

/// Run `fut` with its own slot, seeded with the caller's current values.
pub fn fork<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let seed = with_cell(|cell| cell.clone());
    TASK_SLOT.scope(RefCell::new(seed), fut)
}

/// `tokio::spawn` with the caller's current values inherited.
pub fn spawn<F>(fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(fork(fut))
}

/// `std::thread::spawn` with the caller's current values inherited.
pub fn spawn_thread<F, T>(f: F) -> std::thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let seed = with_cell(|cell| cell.clone());
    std::thread::spawn(move || {
        THREAD_SLOT.with(|cell| *cell.borrow_mut() = seed);
        f()
    })
}

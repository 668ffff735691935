//! Spans carrying context identity.

use ktx_core::AnyContext;
use tracing::Span;

/// Info-level span tagged with the context's id.
pub fn context_span(ctx: &dyn AnyContext) -> Span {
    tracing::info_span!("ktx.context", uq_id = %ctx.uq_id())
}

/// Span for the bound context, disabled when nothing is bound.
pub fn current_context_span() -> Span {
    match ktx_core::get_current() {
        Some(ctx) => context_span(&*ctx),
        None => Span::none(),
    }
}

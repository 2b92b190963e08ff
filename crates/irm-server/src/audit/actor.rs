//! Actor context
//!
//! Task-local holder of "who is performing this unit of work". Request
//! handling installs the authenticated principal once at the boundary (see
//! the middleware in this module's sibling), and the change interceptor reads
//! it at commit time, however deep in the call stack that happens. No
//! parameter threading, and no process-wide mutable state: each tokio task
//! sees only its own value, so concurrent requests can never observe each
//! other's actor.
//!
//! The value is installed with [`scope`], which restores the previous value
//! on every exit path of the wrapped future, including panics and
//! cancellation. Nested scopes shadow and restore in LIFO order.

use std::future::Future;

tokio::task_local! {
    static CURRENT_ACTOR: Option<String>;
}

/// Run `fut` with the given actor installed for the current task.
///
/// `None` runs the future with the actor explicitly cleared, which shadows
/// any outer scope (used by system jobs spawned from request context).
pub async fn scope<F>(actor: Option<String>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_ACTOR.scope(actor, fut).await
}

/// The actor installed for the current task, or `None` when none was set
/// (background/system work). Reading outside any scope is not an error.
pub fn current() -> Option<String> {
    CURRENT_ACTOR.try_with(Clone::clone).ok().flatten()
}

//! Per-message resolution scope.
//!
//! Every dispatched message gets its own `Scope`. Handlers and their
//! dependencies are built inside it and may register release actions,
//! which run when the scope is dropped: after the handler returns, after it
//! fails, or while unwinding from a panic.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use uuid::Uuid;

type Release = Box<dyn FnOnce() + Send>;

pub struct Scope {
    id: Uuid,
    topic: String,
    releases: Vec<Release>,
}

impl Scope {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            releases: Vec::new(),
        }
    }

    /// Unique per scope; used to correlate log lines of one dispatch.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Register an action to run when the scope is released.
    ///
    /// Actions run once, in reverse registration order.
    pub fn on_release(&mut self, release: impl FnOnce() + Send + 'static) {
        self.releases.push(Box::new(release));
    }

    pub fn pending_releases(&self) -> usize {
        self.releases.len()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        while let Some(release) = self.releases.pop() {
            // A panicking release must not skip the others.
            if catch_unwind(AssertUnwindSafe(release)).is_err() {
                tracing::error!(scope_id = %self.id, topic = %self.topic, "scope release action panicked");
            }
        }
        tracing::trace!(scope_id = %self.id, topic = %self.topic, "scope released");
    }
}

/// Run `f` inside a fresh scope.
///
/// The scope is moved into the future `f` returns, so it is released when
/// that future completes, fails or unwinds.
pub async fn with_scope<F, Fut, T>(topic: &str, f: F) -> T
where
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = T>,
{
    f(Scope::new(topic)).await
}

use async_trait::async_trait;

/// Capability the router invokes for one message.
///
/// A fresh instance is built per message inside its own
/// [`Scope`](crate::scope::Scope), so implementations may hold
/// per-message state without it leaking into the next dispatch.
#[async_trait]
pub trait TopicHandler: Send {
    /// Process one raw payload, exactly as received.
    async fn handle_event(&mut self, payload: &str) -> anyhow::Result<()>;
}

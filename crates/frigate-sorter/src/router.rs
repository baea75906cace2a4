//! Topic router: inbound message → handler, one message at a time.
//!
//! Lookup is an exact match on the topic string. Each matched message runs
//! in its own scope inside a spawned task that is awaited before the next
//! message is taken, so delivery order is preserved and a failing or
//! panicking handler never reaches the connection's event loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::sync::mpsc;

use frigate_mqtt::InboundMessage;
use frigate_protocol::topics;

use crate::handler::TopicHandler;
use crate::handlers::{FrigateConfigHandler, FrigateEventHandler};
use crate::scope::{Scope, with_scope};

/// Builds a fresh handler inside a scope.
pub type HandlerFactory =
    Arc<dyn Fn(&mut Scope) -> anyhow::Result<Box<dyn TopicHandler>> + Send + Sync>;

/// Static topic → factory map.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the default handlers for `frigate/events` and
    /// `frigate/config`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(topics::EVENTS, FrigateEventHandler::resolve);
        registry.register(topics::CONFIG, FrigateConfigHandler::resolve);
        registry
    }

    /// Register (or replace) the factory for `topic`.
    pub fn register<F, H>(&mut self, topic: impl Into<String>, factory: F)
    where
        F: Fn(&mut Scope) -> anyhow::Result<H> + Send + Sync + 'static,
        H: TopicHandler + 'static,
    {
        let topic = topic.into();
        if !topics::is_known(&topic) {
            tracing::warn!(topic = %topic, "handler registered for a topic that is never subscribed");
        }
        let factory: HandlerFactory = Arc::new(move |scope: &mut Scope| {
            factory(scope).map(|h| Box::new(h) as Box<dyn TopicHandler>)
        });
        self.factories.insert(topic, factory);
    }

    pub fn get(&self, topic: &str) -> Option<HandlerFactory> {
        self.factories.get(topic).cloned()
    }

    /// Registered topics, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Outcome of routing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler ran and returned `Ok`.
    Handled,
    /// Resolution failed, or the handler returned an error or panicked.
    Failed,
    /// No handler registered for the topic.
    Dropped,
}

/// Counters reported when the router stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub handled: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl RouterStats {
    fn record(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Handled => self.handled += 1,
            Dispatch::Failed => self.failed += 1,
            Dispatch::Dropped => self.dropped += 1,
        }
    }
}

#[derive(Clone)]
pub struct Router {
    registry: Arc<HandlerRegistry>,
}

impl Router {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Route one message. Never fails; failures are logged.
    pub async fn route(&self, msg: InboundMessage) -> Dispatch {
        let Some(factory) = self.registry.get(&msg.topic) else {
            tracing::debug!(
                topic = %msg.topic,
                frigate = topics::is_frigate(&msg.topic),
                "no handler for topic, dropping message"
            );
            return Dispatch::Dropped;
        };

        let topic = msg.topic.clone();
        let started = Instant::now();

        match tokio::spawn(dispatch(factory, msg)).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    topic = %topic,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "message handled"
                );
                Dispatch::Handled
            }
            Ok(Err(e)) => {
                tracing::error!(topic = %topic, error = %format!("{e:#}"), "handler failed");
                Dispatch::Failed
            }
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "handler panicked");
                Dispatch::Failed
            }
        }
    }
}

async fn dispatch(factory: HandlerFactory, msg: InboundMessage) -> anyhow::Result<()> {
    let topic = msg.topic.clone();
    with_scope(&topic, |mut scope| async move {
        let mut handler = factory(&mut scope)
            .with_context(|| format!("failed to resolve handler for '{}'", msg.topic))?;
        tracing::trace!(scope_id = %scope.id(), topic = %msg.topic, "handler resolved");
        // `handler` drops before `scope`.
        handler.handle_event(&msg.payload).await
    })
    .await
}

/// Route every message from `inbound` in order until the stream closes.
pub async fn run(mut inbound: mpsc::Receiver<InboundMessage>, router: Router) -> RouterStats {
    tracing::info!(topics = ?router.registry().topics(), "message router started");

    let mut stats = RouterStats::default();
    while let Some(msg) = inbound.recv().await {
        stats.record(router.route(msg).await);
    }

    tracing::info!(
        handled = stats.handled,
        failed = stats.failed,
        dropped = stats.dropped,
        "message router stopped"
    );
    stats
}

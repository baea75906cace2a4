//! Shared test harness for E2E tests.
//!
//! Builds routers whose handlers record what they saw, so tests can assert
//! exactly which handler ran, with which payload, and how often.

#![allow(dead_code)]

pub mod broker;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use frigate_protocol::topics;
use frigate_sorter::handler::TopicHandler;
use frigate_sorter::router::{HandlerRegistry, Router};
use frigate_sorter::scope::Scope;

/// One handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub handler: &'static str,
    pub payload: String,
}

/// What a recording handler does after recording.
#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Succeed,
    /// Fail when the payload equals this string.
    FailOn(&'static str),
    /// Panic when the payload equals this string.
    PanicOn(&'static str),
}

struct RecordingHandler {
    name: &'static str,
    behaviour: Behaviour,
    log: Arc<Mutex<Vec<Invocation>>>,
}

#[async_trait]
impl TopicHandler for RecordingHandler {
    async fn handle_event(&mut self, payload: &str) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(Invocation {
            handler: self.name,
            payload: payload.to_string(),
        });
        match self.behaviour {
            Behaviour::FailOn(p) if p == payload => anyhow::bail!("handler rejected payload"),
            Behaviour::PanicOn(p) if p == payload => panic!("handler blew up"),
            _ => Ok(()),
        }
    }
}

/// Router wired to recording handlers, plus scope bookkeeping.
pub struct TestHarness {
    pub router: Router,
    pub invocations: Arc<Mutex<Vec<Invocation>>>,
    pub scopes_opened: Arc<Mutex<u32>>,
    pub scopes_released: Arc<Mutex<u32>>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_behaviour(Behaviour::Succeed)
    }

    /// Both handlers use `behaviour`.
    pub fn with_behaviour(behaviour: Behaviour) -> Self {
        let invocations = Arc::new(Mutex::new(Vec::new()));
        let opened = Arc::new(Mutex::new(0u32));
        let released = Arc::new(Mutex::new(0u32));

        let mut registry = HandlerRegistry::new();
        for (topic, name) in [(topics::EVENTS, "events"), (topics::CONFIG, "config")] {
            let log = invocations.clone();
            let opened = opened.clone();
            let released = released.clone();
            registry.register(topic, move |scope: &mut Scope| {
                *opened.lock().unwrap() += 1;
                let released = released.clone();
                scope.on_release(move || *released.lock().unwrap() += 1);
                Ok(RecordingHandler {
                    name,
                    behaviour,
                    log: log.clone(),
                })
            });
        }

        Self {
            router: Router::new(registry),
            invocations,
            scopes_opened: opened,
            scopes_released: released,
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn scopes(&self) -> (u32, u32) {
        (
            *self.scopes_opened.lock().unwrap(),
            *self.scopes_released.lock().unwrap(),
        )
    }
}

/// A realistic `frigate/events` payload.
pub fn event_payload(kind: &str, camera: &str, label: &str) -> String {
    let object = serde_json::json!({
        "id": "1700000000.000001-e2e",
        "camera": camera,
        "label": label,
        "top_score": 0.91,
        "start_time": 1700000000.000001,
        "end_time": if kind == "end" { serde_json::json!(1700000012.5) } else { serde_json::Value::Null },
        "has_clip": true,
        "has_snapshot": true,
        "entered_zones": ["porch"]
    });
    serde_json::json!({"type": kind, "before": object, "after": object}).to_string()
}

/// A realistic `frigate/config` payload.
pub fn config_payload(cameras: &[&str]) -> String {
    let cameras: serde_json::Map<String, serde_json::Value> = cameras
        .iter()
        .map(|c| (c.to_string(), serde_json::json!({"enabled": true})))
        .collect();
    serde_json::json!({"mqtt": {"host": "broker"}, "cameras": cameras}).to_string()
}

/// Poll `condition` until it holds, for up to ten seconds.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

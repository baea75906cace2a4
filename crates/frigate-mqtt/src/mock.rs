//! Test doubles: a channel that records subscriptions and an in-memory
//! secrets provider that counts lookups.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rumqttc::QoS;

use crate::channel::Channel;
use crate::error::{MqttError, MqttResult};
use crate::secrets::SecretsProvider;

/// A recorded `subscribe_many` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeCall {
    pub filters: Vec<String>,
    pub qos: QoS,
}

/// Mock implementation of the `Channel` trait.
///
/// Thread-safe via `Mutex` (fine for test contexts).
pub struct MockChannel {
    calls: Mutex<Vec<SubscribeCall>>,
    fail_with: Option<String>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// A channel whose subscriptions always fail with `reason`.
    /// Calls are still recorded.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<SubscribeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every filter subscribed, flattened across calls.
    pub fn filters(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|c| c.filters.iter().cloned())
            .collect()
    }

    pub fn is_subscribed_to(&self, filter: &str) -> bool {
        self.filters().iter().any(|f| f == filter)
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn subscribe_many(&self, filters: &[&str], qos: QoS) -> MqttResult<()> {
        self.calls.lock().unwrap().push(SubscribeCall {
            filters: filters.iter().map(|f| f.to_string()).collect(),
            qos,
        });
        match &self.fail_with {
            Some(reason) => Err(MqttError::Subscribe(reason.clone())),
            None => Ok(()),
        }
    }
}

/// In-memory secrets provider that counts lookups.
#[derive(Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl StaticSecrets {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of `get` calls so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl SecretsProvider for StaticSecrets {
    fn get(&self, key: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.values.get(key).cloned()
    }
}

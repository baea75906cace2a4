use async_trait::async_trait;
use rumqttc::QoS;

use crate::error::MqttResult;

/// Abstraction over the subscribe side of a broker connection.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Subscribe to all `filters` in one SUBSCRIBE request.
    async fn subscribe_many(&self, filters: &[&str], qos: QoS) -> MqttResult<()>;
}

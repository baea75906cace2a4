//! Startup subscription for the fixed topic set.

use frigate_mqtt::{Channel, QoS};

/// Issue one batched subscribe for `topics` at QoS 1.
///
/// Failures are logged and reported as `false`; they never abort startup
/// and are not retried here. The managed connection re-subscribes recorded
/// filters on every reconnect.
pub async fn subscribe<C: Channel + ?Sized>(channel: &C, topics: &[&str]) -> bool {
    match channel.subscribe_many(topics, QoS::AtLeastOnce).await {
        Ok(()) => {
            tracing::info!(?topics, "MQTT subscriptions requested");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, ?topics, "error subscribing to MQTT topics");
            false
        }
    }
}

//! MQTT topics published by Frigate that the sorter listens to.
//!
//! Topic structure:
//! ```text
//! frigate/events   tracked object lifecycle (new / update / end)
//! frigate/config   full running configuration, published on change
//! ```
//!
//! Matching is exact. No wildcards are ever subscribed.

const PREFIX: &str = "frigate";

/// Tracked object lifecycle events.
pub const EVENTS: &str = "frigate/events";

/// Running configuration document.
pub const CONFIG: &str = "frigate/config";

/// The fixed, ordered subscription set issued after every (re)connect.
pub const SUBSCRIPTIONS: [&str; 2] = [EVENTS, CONFIG];

/// Whether `topic` is one of the subscribed topics (exact string match).
pub fn is_known(topic: &str) -> bool {
    SUBSCRIPTIONS.contains(&topic)
}

/// Whether the topic lives under the Frigate prefix at all, e.g. the
/// per-camera `frigate/front_door/person` counters.
pub fn is_frigate(topic: &str) -> bool {
    topic
        .split_once('/')
        .is_some_and(|(head, rest)| head == PREFIX && !rest.is_empty())
}

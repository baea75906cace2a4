//! Point-in-time copy of the process environment.
//!
//! Everything that reads configuration takes an `EnvSnapshot` instead of
//! calling `std::env::var`, so tests never mutate the real environment.

use std::collections::HashMap;

/// Broker address, `host[:port]`.
pub const MQTT_URL: &str = "MQTT_URL";
pub const MQTT_USERNAME: &str = "MQTT_USERNAME";
pub const MQTT_PASSWORD: &str = "MQTT_PASSWORD";
pub const MQTT_CLIENT_ID: &str = "MQTT_CLIENT_ID";
pub const MQTT_KEEPALIVE_SECS: &str = "MQTT_KEEPALIVE_SECS";
pub const MQTT_RECONNECT_DELAY_SECS: &str = "MQTT_RECONNECT_DELAY_SECS";
/// Overrides the location of the user secrets file.
pub const SECRETS_PATH: &str = "FRIGATE_SORTER_SECRETS";

#[derive(Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit pairs (tests, embedding).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`. An empty string is a present value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

// Values may hold secrets, so only the names are printed.
impl std::fmt::Debug for EnvSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("EnvSnapshot").field("keys", &keys).finish()
    }
}

use std::time::Duration;

use serde::Deserialize;

use crate::env::{
    EnvSnapshot, MQTT_CLIENT_ID, MQTT_KEEPALIVE_SECS, MQTT_RECONNECT_DELAY_SECS, MQTT_URL,
};
use crate::error::{MqttError, MqttResult};

/// MQTT connection configuration, loadable from TOML or environment.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname or IP. Usually filled from `MQTT_URL`.
    #[serde(default)]
    pub broker_host: String,
    /// Broker port (default 1883, plaintext).
    #[serde(default = "default_port")]
    pub broker_port: u16,
    /// MQTT client ID.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Keep-alive interval in seconds. Zero disables keep-alive.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// Pause between reconnect attempts after a connection error.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    /// How long `start()` waits for the first CONNACK.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// How long `stop()` waits for the event loop before aborting it.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Buffered inbound messages before polling applies backpressure.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("frigate-sorter-{}", &id[..8])
}

fn default_keepalive() -> u16 {
    30
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_inbound_capacity() -> usize {
    64
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: String::new(),
            broker_port: default_port(),
            client_id: default_client_id(),
            keepalive_secs: default_keepalive(),
            reconnect_delay_secs: default_reconnect_delay(),
            connect_timeout_secs: default_connect_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            inbound_capacity: default_inbound_capacity(),
        }
    }
}

impl MqttConfig {
    /// Build a config purely from environment variables.
    pub fn from_env(env: &EnvSnapshot) -> MqttResult<Self> {
        let mut config = Self::default();
        config.apply_env(env)?;
        Ok(config)
    }

    /// Overlay environment variables on top of file/default values.
    pub fn apply_env(&mut self, env: &EnvSnapshot) -> MqttResult<()> {
        if let Some(url) = env.get(MQTT_URL) {
            let (host, port) = parse_broker_url(url)?;
            self.broker_host = host;
            if let Some(port) = port {
                self.broker_port = port;
            }
        }
        if let Some(id) = env.get(MQTT_CLIENT_ID) {
            self.client_id = id.to_string();
        }
        if let Some(secs) = env.get(MQTT_KEEPALIVE_SECS) {
            self.keepalive_secs = parse_number(MQTT_KEEPALIVE_SECS, secs)?;
        }
        if let Some(secs) = env.get(MQTT_RECONNECT_DELAY_SECS) {
            self.reconnect_delay_secs = parse_number(MQTT_RECONNECT_DELAY_SECS, secs)?;
        }
        Ok(())
    }

    /// Reject values rumqttc would panic on.
    pub fn validate(&self) -> MqttResult<()> {
        if self.broker_host.trim().is_empty() {
            return Err(MqttError::Config(format!(
                "broker host is empty (set {MQTT_URL})"
            )));
        }
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(MqttError::Config(format!(
                "invalid client id '{}'",
                self.client_id
            )));
        }
        if (1..5).contains(&self.keepalive_secs) {
            return Err(MqttError::Config(format!(
                "keepalive must be 0 or at least 5 seconds, got {}",
                self.keepalive_secs
            )));
        }
        if self.inbound_capacity == 0 {
            return Err(MqttError::Config("inbound capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.into())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Split a broker address of the form `host[:port]`.
///
/// Accepts an optional `mqtt://` or `tcp://` scheme and bracketed IPv6
/// literals (`[::1]:1883`). A bare IPv6 literal without brackets is taken
/// as a host with no port.
pub fn parse_broker_url(url: &str) -> MqttResult<(String, Option<u16>)> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("mqtt://")
        .or_else(|| trimmed.strip_prefix("tcp://"))
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    if rest.is_empty() {
        return Err(MqttError::Config(format!("{MQTT_URL} is empty")));
    }

    if let Some(inner) = rest.strip_prefix('[') {
        let (host, tail) = inner
            .split_once(']')
            .ok_or_else(|| MqttError::Config(format!("unterminated IPv6 literal in '{url}'")))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => Some(parse_port(url, p)?),
            None if tail.is_empty() => None,
            None => return Err(MqttError::Config(format!("invalid broker address '{url}'"))),
        };
        return Ok((host.to_string(), port));
    }

    match rest.split_once(':') {
        Some((host, port)) if !port.contains(':') => {
            if host.is_empty() {
                return Err(MqttError::Config(format!("missing host in '{url}'")));
            }
            Ok((host.to_string(), Some(parse_port(url, port)?)))
        }
        _ => Ok((rest.to_string(), None)),
    }
}

fn parse_port(url: &str, port: &str) -> MqttResult<u16> {
    port.parse::<u16>()
        .map_err(|_| MqttError::Config(format!("invalid port '{port}' in '{url}'")))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> MqttResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MqttError::Config(format!("{name} must be a number, got '{value}'")))
}

//! Sorter configuration, loadable from TOML and overlaid with environment.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use frigate_mqtt::{EnvSnapshot, MqttConfig};

/// Top-level configuration for the sorter.
#[derive(Debug, Clone, Deserialize)]
pub struct SorterConfig {
    /// MQTT connection settings.
    #[serde(default)]
    pub mqtt: MqttConfig,
    /// How long shutdown waits for the router to finish in-flight messages.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

fn default_drain_timeout() -> u64 {
    10
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

impl SorterConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file '{path}'"))?;
        Ok(config)
    }

    /// File (if given) or defaults, then environment on top, then validated.
    pub fn load(path: Option<&str>, env: &EnvSnapshot) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let mut config = Self::from_file(path)?;
                config.mqtt.apply_env(env)?;
                config
            }
            None => Self {
                mqtt: MqttConfig::from_env(env)?,
                ..Self::default()
            },
        };
        config.mqtt.validate()?;
        Ok(config)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

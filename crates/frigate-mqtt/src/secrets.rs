//! Local, user-scoped secrets store.
//!
//! The store is a JSON file outside the working tree. Nested objects are
//! flattened into `:`-separated keys, so
//!
//! ```json
//! { "MQTT_USERNAME": "sorter", "broker": { "tls": { "ca": "/etc/ca.pem" } } }
//! ```
//!
//! exposes `MQTT_USERNAME` and `broker:tls:ca`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::env::{EnvSnapshot, SECRETS_PATH};
use crate::error::{MqttError, MqttResult};

/// Read-only key/value lookup for secrets.
pub trait SecretsProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Secrets loaded from a JSON file.
#[derive(Default)]
pub struct UserSecrets {
    path: Option<PathBuf>,
    values: HashMap<String, String>,
}

impl UserSecrets {
    /// Parse a secrets document.
    pub fn from_json(json: &str) -> MqttResult<Self> {
        let root: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| MqttError::Config(format!("malformed secrets file: {e}")))?;
        if !root.is_object() {
            return Err(MqttError::Config(
                "secrets file must contain a JSON object".into(),
            ));
        }
        let mut values = HashMap::new();
        flatten("", &root, &mut values);
        Ok(Self { path: None, values })
    }

    /// Load the store from `path`. A missing file is an empty store.
    pub fn load(path: &Path) -> MqttResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no user secrets file");
                return Ok(Self {
                    path: Some(path.to_path_buf()),
                    values: HashMap::new(),
                });
            }
            Err(e) => {
                return Err(MqttError::Io(format!(
                    "failed to read secrets file '{}': {e}",
                    path.display()
                )));
            }
        };
        let mut secrets = Self::from_json(&contents)?;
        secrets.path = Some(path.to_path_buf());
        Ok(secrets)
    }

    /// Like [`UserSecrets::load`], but unreadable or malformed files are
    /// logged and treated as empty.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(secrets) => secrets,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring user secrets file");
                Self {
                    path: Some(path.to_path_buf()),
                    values: HashMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SecretsProvider for UserSecrets {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Default location of the secrets file.
///
/// `FRIGATE_SORTER_SECRETS` wins; otherwise `$HOME/.config/frigate-sorter/secrets.json`.
pub fn default_secrets_path(env: &EnvSnapshot) -> Option<PathBuf> {
    if let Some(path) = env.get(SECRETS_PATH).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    env.get("HOME").filter(|h| !h.is_empty()).map(|home| {
        Path::new(home)
            .join(".config")
            .join("frigate-sorter")
            .join("secrets.json")
    })
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut HashMap<String, String>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}:{key}")
        }
    };
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                flatten(&join(key), child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten(&join(&i.to_string()), child, out);
            }
        }
        serde_json::Value::Null => {}
        serde_json::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Ordered list of secrets providers.
///
/// Lookups go to the first configured provider only; later providers are
/// never consulted.
#[derive(Default)]
pub struct SecretsChain {
    providers: Vec<Box<dyn SecretsProvider>>,
}

impl SecretsChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl SecretsProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// The standard chain: the user secrets file at its default location.
    pub fn user_default(env: &EnvSnapshot) -> Self {
        match default_secrets_path(env) {
            Some(path) => {
                let secrets = UserSecrets::load_or_empty(&path);
                if secrets.is_empty() {
                    tracing::debug!(path = %path.display(), "user secrets store is empty");
                }
                Self::new().with(secrets)
            }
            None => {
                tracing::debug!("no HOME and no secrets path configured");
                Self::new()
            }
        }
    }
}

impl SecretsProvider for SecretsChain {
    fn get(&self, key: &str) -> Option<String> {
        self.providers.first().and_then(|p| p.get(key))
    }
}

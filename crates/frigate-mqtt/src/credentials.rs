//! Broker credential resolution.
//!
//! Environment first, user secrets file second. The switch is
//! all-or-nothing: if either `MQTT_USERNAME` or `MQTT_PASSWORD` is missing
//! from the environment, *both* are read from the secrets store.

use crate::env::{EnvSnapshot, MQTT_PASSWORD, MQTT_USERNAME};
use crate::secrets::{SecretsChain, SecretsProvider};

/// Where a set of credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    SecretsStore,
}

/// Username plus opaque secret. Held in memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: Vec<u8>,
    pub source: CredentialSource,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<Vec<u8>>,
        source: CredentialSource,
    ) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
            source,
        }
    }

    /// Neither a username nor a secret was found.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.secret.is_empty()
    }

    /// Secret as text, as the MQTT CONNECT packet carries it.
    pub fn secret_lossy(&self) -> String {
        String::from_utf8_lossy(&self.secret).into_owned()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve credentials from an environment snapshot and a secrets provider.
///
/// Never fails: missing values come back empty and surface later as a
/// connect failure.
pub fn resolve(env: &EnvSnapshot, secrets: &dyn SecretsProvider) -> Credentials {
    if let (Some(username), Some(password)) = (env.get(MQTT_USERNAME), env.get(MQTT_PASSWORD)) {
        tracing::debug!(source = "environment", "MQTT credentials resolved");
        return Credentials::new(username, password, CredentialSource::Environment);
    }

    tracing::debug!("MQTT credentials incomplete in environment, reading secrets store");
    let username = secrets.get(MQTT_USERNAME).unwrap_or_default();
    let password = secrets.get(MQTT_PASSWORD).unwrap_or_default();
    if username.is_empty() {
        tracing::warn!("no MQTT username found in environment or secrets store");
    }
    Credentials::new(username, password, CredentialSource::SecretsStore)
}

/// Resolve against the real process environment and default secrets file.
pub fn resolve_from_process() -> Credentials {
    let env = EnvSnapshot::capture();
    let secrets = SecretsChain::user_default(&env);
    resolve(&env, &secrets)
}

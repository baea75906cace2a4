//! MQTT plumbing for the Frigate sorter.
//!
//! - `ConnectionManager`: managed rumqttc connection (reconnect + resubscribe)
//! - `Channel` trait for subscribing (mockable in tests)
//! - `resolve` credentials from the environment or the user secrets file
//! - `InboundMessage` stream handed to the router
//! - `MockChannel` / `StaticSecrets` for testing without a broker

pub mod channel;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod env;
pub mod error;
pub mod message;
pub mod mock;
pub mod secrets;

// Re-exports for convenience.
pub use channel::Channel;
pub use config::MqttConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use credentials::{CredentialSource, Credentials, resolve, resolve_from_process};
pub use env::EnvSnapshot;
pub use error::{MqttError, MqttResult};
pub use message::InboundMessage;
pub use mock::{MockChannel, StaticSecrets};
pub use rumqttc::QoS;
pub use secrets::{SecretsChain, SecretsProvider, UserSecrets};

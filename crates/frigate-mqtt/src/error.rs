//! MQTT error types.

use thiserror::Error;

/// Errors surfaced by the connection layer.
///
/// None of these are fatal to the process; callers log them and carry on.
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("subscribe error: {0}")]
    Subscribe(String),

    #[error("connection is not running")]
    NotRunning,

    #[error("I/O error: {0}")]
    Io(String),
}

/// Convenience alias for MQTT results.
pub type MqttResult<T> = Result<T, MqttError>;

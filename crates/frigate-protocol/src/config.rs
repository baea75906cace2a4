//! Payload of `frigate/config`.
//!
//! The document is large and version dependent, so only the camera map is
//! typed; per-camera settings stay as raw JSON.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Subset of the running Frigate configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FrigateConfig {
    #[serde(default)]
    pub cameras: BTreeMap<String, serde_json::Value>,
}

impl FrigateConfig {
    /// Parse a raw `frigate/config` payload.
    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    /// Camera names in sorted order.
    pub fn camera_names(&self) -> Vec<&str> {
        self.cameras.keys().map(String::as_str).collect()
    }

    /// Cameras whose `enabled` flag is not explicitly `false`.
    pub fn enabled_cameras(&self) -> Vec<&str> {
        self.cameras
            .iter()
            .filter(|(_, cfg)| cfg.get("enabled").and_then(|v| v.as_bool()) != Some(false))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

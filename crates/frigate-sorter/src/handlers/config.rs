use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use frigate_protocol::config::FrigateConfig;

use crate::handler::TopicHandler;
use crate::scope::Scope;

/// Handles `frigate/config`.
pub struct FrigateConfigHandler {
    scope_id: Uuid,
    cameras: Vec<String>,
}

impl FrigateConfigHandler {
    pub fn new(scope_id: Uuid) -> Self {
        Self {
            scope_id,
            cameras: Vec::new(),
        }
    }

    /// Factory used by the handler registry.
    pub fn resolve(scope: &mut Scope) -> anyhow::Result<Self> {
        let scope_id = scope.id();
        scope.on_release(move || {
            tracing::trace!(scope_id = %scope_id, "frigate config handler released");
        });
        Ok(Self::new(scope_id))
    }

    /// Cameras seen in the last handled document.
    pub fn cameras(&self) -> &[String] {
        &self.cameras
    }
}

#[async_trait]
impl TopicHandler for FrigateConfigHandler {
    async fn handle_event(&mut self, payload: &str) -> anyhow::Result<()> {
        let config =
            FrigateConfig::from_payload(payload).context("invalid frigate config payload")?;

        let enabled = config.enabled_cameras();
        tracing::info!(
            scope_id = %self.scope_id,
            cameras = ?config.camera_names(),
            enabled = enabled.len(),
            "frigate config received"
        );

        self.cameras = config.camera_names().into_iter().map(String::from).collect();
        Ok(())
    }
}

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use frigate_protocol::events::{EventKind, FrigateEvent};

use crate::handler::TopicHandler;
use crate::scope::Scope;

/// Handles `frigate/events`.
pub struct FrigateEventHandler {
    scope_id: Uuid,
    last: Option<FrigateEvent>,
}

impl FrigateEventHandler {
    pub fn new(scope_id: Uuid) -> Self {
        Self {
            scope_id,
            last: None,
        }
    }

    /// Factory used by the handler registry.
    pub fn resolve(scope: &mut Scope) -> anyhow::Result<Self> {
        let scope_id = scope.id();
        scope.on_release(move || {
            tracing::trace!(scope_id = %scope_id, "frigate event handler released");
        });
        Ok(Self::new(scope_id))
    }

    /// The event parsed by the last successful call.
    pub fn last_event(&self) -> Option<&FrigateEvent> {
        self.last.as_ref()
    }
}

#[async_trait]
impl TopicHandler for FrigateEventHandler {
    async fn handle_event(&mut self, payload: &str) -> anyhow::Result<()> {
        let event = FrigateEvent::from_payload(payload).context("invalid frigate event payload")?;

        match event.kind {
            EventKind::New => tracing::info!(
                scope_id = %self.scope_id,
                event_id = %event.id(),
                camera = %event.after.camera,
                label = %event.after.label,
                "tracked object appeared"
            ),
            EventKind::Update => tracing::debug!(
                scope_id = %self.scope_id,
                event_id = %event.id(),
                camera = %event.after.camera,
                zones = ?event.after.entered_zones,
                top_score = ?event.after.top_score,
                "tracked object updated"
            ),
            EventKind::End => tracing::info!(
                scope_id = %self.scope_id,
                event_id = %event.id(),
                camera = %event.after.camera,
                label = %event.after.label,
                duration_secs = ?event.duration_secs(),
                has_clip = event.after.has_clip,
                has_snapshot = event.after.has_snapshot,
                "tracked object ended"
            ),
        }

        self.last = Some(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(kind: &str) -> String {
        let object = json!({
            "id": "1700000000.123456-abcdef",
            "camera": "driveway",
            "label": "car",
            "start_time": 1700000000.123456,
            "end_time": null,
            "has_clip": false,
            "has_snapshot": true
        });
        json!({"type": kind, "before": object, "after": object}).to_string()
    }

    #[tokio::test]
    async fn handles_each_kind() {
        for kind in ["new", "update", "end"] {
            let mut handler = FrigateEventHandler::new(Uuid::now_v7());
            handler.handle_event(&payload(kind)).await.unwrap();
            assert_eq!(handler.last_event().unwrap().after.camera, "driveway");
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_error() {
        let mut handler = FrigateEventHandler::new(Uuid::now_v7());
        let err = handler.handle_event("{\"type\": 1}").await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid frigate event payload"));
        assert!(handler.last_event().is_none());
    }

    #[test]
    fn resolve_registers_release() {
        let mut scope = Scope::new("frigate/events");
        let handler = FrigateEventHandler::resolve(&mut scope).unwrap();
        assert_eq!(handler.scope_id, scope.id());
        assert_eq!(scope.pending_releases(), 1);
    }
}

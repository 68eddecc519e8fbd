//! Inbound frame processing.

use tracing::{debug, warn};

use crate::models::event::ServerEvent;

/// Parses a text frame into a [`ServerEvent`].
///
/// Heartbeats are consumed silently. Anything else that does not match a
/// known event is logged and dropped; the server's next snapshot corrects
/// whatever was missed.
pub fn handle_text(text: &str) -> Option<ServerEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring non-JSON frame: {e}");
            return None;
        }
    };

    let msg_type = value.get("type").and_then(|t| t.as_str()).map(String::from);
    match msg_type.as_deref() {
        Some("heartbeat" | "pong") => {
            debug!("Received heartbeat");
            None
        }
        Some(_) => match serde_json::from_value::<ServerEvent>(value) {
            Ok(event) => {
                debug!(order_id = event.order_id(), "Received event");
                Some(event)
            }
            Err(e) => {
                warn!(msg_type = ?msg_type, "Ignoring unrecognized event: {e}");
                None
            }
        },
        None => {
            warn!("Ignoring frame without a type");
            None
        }
    }
}

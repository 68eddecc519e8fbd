//! Inbound server events and outbound kitchen commands.
//!
//! Frames are JSON text, internally tagged by `type`. Framing, handshake
//! and encryption belong to the transport.

use serde::{Deserialize, Serialize};

use super::Order;
use crate::Result;
use crate::error::GalleyError;

/// Status carried by an `order_update` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Cancelled,
    Ready,
}

/// Who produced a status update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    /// Waiter or cashier terminal.
    #[default]
    FrontOfHouse,
    /// Another kitchen display.
    Kitchen,
}

/// Events consumed from the order channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full snapshot of an order, new or resent.
    NewOrder { order: Order },
    OrderUpdate {
        order_id: String,
        status: UpdateStatus,
        #[serde(default)]
        source: UpdateSource,
    },
    OrderCancelled { order_id: String },
}

impl ServerEvent {
    /// Parses a text frame into an event.
    ///
    /// # Errors
    ///
    /// Returns [`GalleyError::MalformedMessage`] if the frame is not valid
    /// JSON or does not match a known event shape.
    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| GalleyError::MalformedMessage(e.to_string()))
    }

    /// The order this event refers to.
    #[must_use]
    pub fn order_id(&self) -> &str {
        match self {
            Self::NewOrder { order } => &order.id,
            Self::OrderUpdate { order_id, .. } | Self::OrderCancelled { order_id } => order_id,
        }
    }
}

/// Status a kitchen display reports back to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundStatus {
    /// Sent when the kitchen marks an order ready.
    Ready,
    /// Sent when a ready mark is undone.
    Preparing,
}

/// A `status_update` command sent to the order-management server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(rename = "type")]
    tpe: String,
    pub order_id: String,
    pub status: OutboundStatus,
}

impl StatusUpdateRequest {
    #[must_use]
    pub fn new(order_id: &str, status: OutboundStatus) -> Self {
        Self {
            tpe: "status_update".to_string(),
            order_id: order_id.to_string(),
            status,
        }
    }
}

//! Order models shared by the reconciliation engine, the board, and the
//! durable store.
//!
//! Wire-level event envelopes live in [`event`].

pub mod event;

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Server-side status tag carried on every order. Only the server writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

/// Per-line annotation produced by reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    #[default]
    Unchanged,
    Added,
    Modified,
    /// Present in the previous snapshot but gone from the latest one.
    /// Rendered struck through rather than dropped.
    Removed,
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    pub quantity: u32,
    pub subtotal: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub change: ChangeKind,
    /// Quantity shown before a modification, display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_quantity: Option<u32>,
}

impl OrderItem {
    /// Creates an unannotated line.
    #[must_use]
    pub fn new(product_id: &str, quantity: u32, subtotal: Decimal) -> Self {
        Self {
            product_id: product_id.to_string(),
            product_name: String::new(),
            quantity,
            subtotal,
            note: None,
            change: ChangeKind::Unchanged,
            previous_quantity: None,
        }
    }

    /// Sets the free-form note for this line.
    #[must_use]
    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    /// Sets the display name for this line.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.product_name = name.to_string();
        self
    }

    /// Returns the diffing key for this line.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::new(&self.product_id, self.note.as_deref())
    }

    /// Note text with absent treated as empty.
    #[must_use]
    pub fn note_text(&self) -> &str {
        self.note.as_deref().unwrap_or("")
    }
}

/// Composite line identity used for diffing: product plus note text.
///
/// Two lines with the same product and the same note share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub product_id: String,
    pub note: String,
}

impl ItemKey {
    #[must_use]
    pub fn new(product_id: &str, note: Option<&str>) -> Self {
        Self {
            product_id: product_id.to_string(),
            note: note.unwrap_or("").to_string(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.product_id, self.note)
    }
}

/// An order as issued by the order-management server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub status: OrderStatus,
    /// Dine-in, takeaway, delivery, ... as labelled by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Order {
    /// Creates a pending order with the given lines.
    #[must_use]
    pub fn new(id: &str, items: Vec<OrderItem>) -> Self {
        Self {
            id: id.to_string(),
            items,
            status: OrderStatus::Pending,
            order_type: None,
            table: None,
            created_at: None,
        }
    }

    /// Total quantity per item key. Lines sharing a key are summed.
    #[must_use]
    pub fn quantities(&self) -> HashMap<ItemKey, u32> {
        let mut totals: HashMap<ItemKey, u32> = HashMap::new();
        for item in &self.items {
            let total = totals.entry(item.key()).or_insert(0);
            *total = total.saturating_add(item.quantity);
        }
        totals
    }

    /// Lines still shown as live, i.e. not struck through.
    pub fn live_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items
            .iter()
            .filter(|item| item.change != ChangeKind::Removed)
    }
}

//! Shared test utilities.

#![allow(dead_code)]

use galley::models::event::ServerEvent;
use galley::models::{Order, OrderItem};
use rust_decimal::Decimal;

/// Builds an order line priced at 5.00 per unit.
pub fn item(product_id: &str, quantity: u32) -> OrderItem {
    OrderItem::new(product_id, quantity, Decimal::from(quantity * 5))
}

/// Builds an order line with a note.
pub fn noted(product_id: &str, quantity: u32, note: &str) -> OrderItem {
    item(product_id, quantity).with_note(note)
}

/// Wraps a snapshot in a `new_order` event.
pub fn snapshot(id: &str, items: Vec<OrderItem>) -> ServerEvent {
    ServerEvent::NewOrder {
        order: Order::new(id, items),
    }
}

/// `(product_id, note, quantity)` for every line, in order.
pub fn lines(order: &Order) -> Vec<(String, String, u32)> {
    order
        .items
        .iter()
        .map(|i| (i.product_id.clone(), i.note_text().to_string(), i.quantity))
        .collect()
}

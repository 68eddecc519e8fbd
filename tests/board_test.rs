//! Multi-step board scenarios spanning reconciliation, the ready ledger,
//! and lifecycle transitions.

mod common;

use rust_decimal_macros::dec;
use tokio::time::Instant;

use galley::ledger::ReadyLedger;
use galley::lifecycle::{Board, DisplayState, Effect};
use galley::models::event::{OutboundStatus, ServerEvent, UpdateSource, UpdateStatus};
use galley::models::{ChangeKind, Order};
use galley::persistence::PersistOp;
use galley::reconcile::{Reconciliation, reconcile};

use common::{item, lines, noted, snapshot};

fn sends(effects: &[Effect]) -> Vec<OutboundStatus> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Send(request) => Some(request.status),
            _ => None,
        })
        .collect()
}

#[test]
fn test_dinner_service_round_trip() {
    let mut board = Board::default();
    let now = Instant::now();

    board.apply(snapshot("t12", vec![item("P1", 2), noted("P2", 1, "no onion")]), now);

    // Waiter edits the note on P2.
    let effects = board.apply(
        snapshot("t12", vec![item("P1", 2), noted("P2", 1, "extra cheese")]),
        now,
    );
    assert!(effects.contains(&Effect::Alert));
    let entry = board.entry("t12").unwrap();
    assert!(entry.updated_at.is_some());
    assert_eq!(entry.order.items[1].change, ChangeKind::Modified);
    assert_eq!(entry.order.items[1].previous_quantity, Some(1));

    let effects = board.mark_ready("t12", now);
    assert_eq!(sends(&effects), [OutboundStatus::Ready]);
    assert!(board.active().is_empty());

    // Table orders more of P1; only the increment comes back.
    board.apply(snapshot("t12", vec![item("P1", 5), noted("P2", 1, "extra cheese")]), now);
    let entry = board.entry("t12").unwrap();
    assert_eq!(lines(&entry.order), [("P1".to_string(), String::new(), 3)]);
    assert_eq!(entry.order.items[0].subtotal, dec!(15));
    assert_eq!(entry.order.items[0].change, ChangeKind::Added);
    assert!(board.completed().iter().all(|e| e.order.id != "t12"));

    board.mark_ready("t12", now);
    let effects = board.undo("t12", now);
    assert_eq!(sends(&effects), [OutboundStatus::Preparing]);
    assert_eq!(board.entry("t12").unwrap().state, DisplayState::Active);

    // The ledger survived the undo, so a verbatim resend leaves nothing to cook.
    board.apply(
        snapshot("t12", vec![item("P1", 5), noted("P2", 1, "extra cheese")]),
        now,
    );
    assert_eq!(board.entry("t12").unwrap().order.live_items().count(), 0);

    let effects = board.delete("t12");
    assert_eq!(effects, [Effect::Persist(PersistOp::Delete("t12".to_string()))]);
    assert!(!board.ledger().contains("t12"));

    // With the ledger gone the same snapshot is a brand new order.
    board.apply(snapshot("t12", vec![item("P1", 5)]), now);
    assert_eq!(board.entry("t12").unwrap().order.items[0].quantity, 5);
}

#[test]
fn test_waiter_ready_then_increment() {
    let mut board = Board::default();
    let now = Instant::now();

    board.apply(snapshot("o1", vec![item("P1", 2), item("P2", 1)]), now);
    let effects = board.apply(
        ServerEvent::OrderUpdate {
            order_id: "o1".to_string(),
            status: UpdateStatus::Ready,
            source: UpdateSource::FrontOfHouse,
        },
        now,
    );
    assert!(sends(&effects).is_empty());
    assert!(board.entry("o1").unwrap().is_ready_from_waiter());
    assert_eq!(board.ledger().snapshot("o1").len(), 2);

    board.apply(snapshot("o1", vec![item("P1", 2), item("P2", 1), item("P3", 4)]), now);
    let entry = board.entry("o1").unwrap();
    assert_eq!(entry.state, DisplayState::Active);
    assert_eq!(lines(&entry.order), [("P3".to_string(), String::new(), 4)]);
}

#[test]
fn test_restart_keeps_served_orders_off_the_board() {
    let mut board = Board::default();
    let now = Instant::now();
    let served = Order::new("t3", vec![item("P1", 2), noted("P2", 1, "well done")]);
    board.restore(Vec::new(), vec![served], now);

    let effects = board.apply(
        snapshot("t3", vec![item("P1", 2), noted("P2", 1, "well done")]),
        now,
    );
    assert!(effects.is_empty());
    assert!(board.entry("t3").is_none());

    // Anything ordered on top still comes through.
    board.apply(
        snapshot("t3", vec![item("P1", 3), noted("P2", 1, "well done")]),
        now,
    );
    let entry = board.entry("t3").unwrap();
    assert_eq!(lines(&entry.order), [("P1".to_string(), String::new(), 1)]);
}

#[test]
fn test_colliding_lines_share_ready_budget() {
    let mut board = Board::default();
    let now = Instant::now();

    board.apply(snapshot("o1", vec![item("P1", 1), item("P1", 1)]), now);
    board.mark_ready("o1", now);

    board.apply(
        snapshot("o1", vec![item("P1", 1), item("P1", 1), item("P1", 1)]),
        now,
    );
    let entry = board.entry("o1").unwrap();
    assert_eq!(lines(&entry.order), [("P1".to_string(), String::new(), 1)]);
    assert_eq!(entry.order.items[0].change, ChangeKind::Added);
}

#[test]
fn test_reconcile_properties() {
    let ledger = ReadyLedger::new();
    let cached = Order::new("o1", vec![item("P1", 1), item("P2", 1)]);

    // Idempotent resend.
    let applied = reconcile(&cached, Some(&cached), &ledger).applied().unwrap();
    assert!(!applied.changed);
    assert!(applied.order.items.iter().all(|i| i.change == ChangeKind::Unchanged));

    // Removed-item detection.
    let incoming = Order::new("o1", vec![item("P1", 1)]);
    let applied = reconcile(&incoming, Some(&cached), &ledger).applied().unwrap();
    assert!(applied.changed);
    let changes: Vec<_> = applied.order.items.iter().map(|i| i.change).collect();
    assert_eq!(changes, [ChangeKind::Unchanged, ChangeKind::Removed]);

    // Ready suppression.
    ledger.accumulate("o1", &Order::new("o1", vec![item("P1", 2)]).quantities());
    let served = Order::new("o1", vec![item("P1", 2)]);
    assert_eq!(reconcile(&served, None, &ledger), Reconciliation::Suppressed);
}

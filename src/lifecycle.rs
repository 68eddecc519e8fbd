//! Display-state lifecycle of every order on a kitchen display.
//!
//! [`Board`] is the owned state container the event loop mutates. Each
//! operation applies its state transition synchronously and returns the
//! [`Effect`]s the caller must carry out: commands for the server, writes
//! for the durable store, delayed expiries, alert sounds.
//!
//! Transient states (`CancelledPending`, `ReadyFromWaiterPending`) carry a
//! [`Stamp`]. A delayed expiry only acts if the entry still carries the
//! exact stamp it was scheduled against; any newer event that replaced
//! the state makes the old expiry a no-op.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ledger::{FullQuantities, ReadyLedger};
use crate::models::event::{
    OutboundStatus, ServerEvent, StatusUpdateRequest, UpdateSource, UpdateStatus,
};
use crate::models::{ItemKey, Order, OrderStatus};
use crate::persistence::PersistOp;
use crate::reconcile::{Reconciliation, reconcile};
use crate::websocket::ConnectionState;

/// How long a cancelled order stays on screen.
pub const CANCEL_EXPIRY: Duration = Duration::from_secs(10);

/// How long an order marked ready by front-of-house stays on screen.
pub const WAITER_READY_EXPIRY: Duration = Duration::from_secs(5);

/// Maximum number of completed orders kept in memory.
pub const MAX_COMPLETED_HISTORY: usize = 100;

/// Identity token of a transient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    seq: u64,
    pub at: Instant,
}

/// Presentation state of a board entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    Active,
    CancelledPending(Stamp),
    ReadyFromWaiterPending(Stamp),
    Completed,
}

/// One order as shown on the board.
#[derive(Debug, Clone)]
pub struct DisplayEntry {
    pub order: Order,
    pub state: DisplayState,
    pub received_at: Instant,
    /// Set when an update changed the order, for transient emphasis.
    pub updated_at: Option<Instant>,
    pub completed_at: Option<Instant>,
}

impl DisplayEntry {
    fn new(order: Order, now: Instant) -> Self {
        Self {
            order,
            state: DisplayState::Active,
            received_at: now,
            updated_at: None,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, DisplayState::CancelledPending(_))
    }

    #[must_use]
    pub fn is_ready_from_waiter(&self) -> bool {
        matches!(self.state, DisplayState::ReadyFromWaiterPending(_))
    }
}

/// Side effects requested by a board transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a command to the order-management server.
    Send(StatusUpdateRequest),
    /// Mirror a committed transition to the durable store.
    Persist(PersistOp),
    /// Call [`Board::expire`] with this stamp once `after` has elapsed.
    ScheduleExpiry {
        order_id: String,
        stamp: Stamp,
        after: Duration,
    },
    /// Play the new-order alert.
    Alert,
}

/// Active and completed orders of one kitchen display.
pub struct Board {
    active: Vec<DisplayEntry>,
    completed: VecDeque<DisplayEntry>,
    ledger: Arc<ReadyLedger>,
    full_quantities: Arc<FullQuantities>,
    next_stamp: u64,
    connection: ConnectionState,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(Arc::default(), Arc::default())
    }
}

impl Board {
    #[must_use]
    pub fn new(ledger: Arc<ReadyLedger>, full_quantities: Arc<FullQuantities>) -> Self {
        Self {
            active: Vec::new(),
            completed: VecDeque::with_capacity(MAX_COMPLETED_HISTORY),
            ledger,
            full_quantities,
            next_stamp: 0,
            connection: ConnectionState::Disconnected,
        }
    }

    /// Entries currently shown, in arrival order.
    #[must_use]
    pub fn active(&self) -> &[DisplayEntry] {
        &self.active
    }

    /// Completed entries, oldest first.
    #[must_use]
    pub fn completed(&self) -> &VecDeque<DisplayEntry> {
        &self.completed
    }

    #[must_use]
    pub fn entry(&self, order_id: &str) -> Option<&DisplayEntry> {
        self.active.iter().find(|e| e.order.id == order_id)
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<ReadyLedger> {
        &self.ledger
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    /// Applies one inbound server event.
    pub fn apply(&mut self, event: ServerEvent, now: Instant) -> Vec<Effect> {
        match event {
            ServerEvent::NewOrder { order } => self.receive_order(order, now),
            ServerEvent::OrderUpdate {
                order_id,
                status: UpdateStatus::Cancelled,
                ..
            }
            | ServerEvent::OrderCancelled { order_id } => self.cancel(&order_id, now),
            ServerEvent::OrderUpdate {
                order_id,
                status: UpdateStatus::Ready,
                source,
            } => self.ready_from_server(&order_id, source, now),
        }
    }

    fn receive_order(&mut self, order: Order, now: Instant) -> Vec<Effect> {
        self.full_quantities.record(&order);
        let position = self.position(&order.id);
        let cached = position.map(|i| &self.active[i].order);

        let reconciled = match reconcile(&order, cached, &self.ledger) {
            Reconciliation::Suppressed => {
                debug!(order_id = %order.id, "Resend already fully served, suppressed");
                return Vec::new();
            }
            Reconciliation::Applied(reconciled) => reconciled,
        };

        let mut effects = Vec::new();
        match position {
            Some(index) => {
                let entry = &mut self.active[index];
                let mut order = reconciled.order;
                // A pending state only yields to a snapshot with work left in it.
                if entry.state != DisplayState::Active {
                    if order.live_items().next().is_some() {
                        info!(order_id = %entry.order.id, "Order reactivated by newer snapshot");
                        entry.state = DisplayState::Active;
                    } else {
                        order.status = entry.order.status;
                    }
                }
                entry.order = order;
                if reconciled.changed {
                    info!(order_id = %entry.order.id, "Order updated");
                    entry.updated_at = Some(now);
                    effects.push(Effect::Alert);
                }
                effects.push(Effect::Persist(PersistOp::UpsertActive(entry.order.clone())));
            }
            None => {
                info!(
                    order_id = %reconciled.order.id,
                    items = reconciled.order.items.len(),
                    "New order"
                );
                self.completed.retain(|e| e.order.id != reconciled.order.id);
                effects.push(Effect::Persist(PersistOp::UpsertActive(
                    reconciled.order.clone(),
                )));
                effects.push(Effect::Alert);
                self.active.push(DisplayEntry::new(reconciled.order, now));
            }
        }
        effects
    }

    fn cancel(&mut self, order_id: &str, now: Instant) -> Vec<Effect> {
        let Some(index) = self.position(order_id) else {
            warn!(order_id, "Cancellation for unknown order ignored");
            return Vec::new();
        };
        let stamp = self.stamp(now);
        let entry = &mut self.active[index];
        entry.state = DisplayState::CancelledPending(stamp);
        entry.order.status = OrderStatus::Cancelled;
        info!(order_id, "Order cancelled, removal pending");

        vec![
            Effect::Persist(PersistOp::UpsertActive(entry.order.clone())),
            Effect::ScheduleExpiry {
                order_id: order_id.to_string(),
                stamp,
                after: CANCEL_EXPIRY,
            },
        ]
    }

    fn ready_from_server(
        &mut self,
        order_id: &str,
        source: UpdateSource,
        now: Instant,
    ) -> Vec<Effect> {
        let Some(index) = self.position(order_id) else {
            warn!(order_id, "Ready update for unknown order ignored");
            return Vec::new();
        };
        self.credit_ledger(index);

        if source == UpdateSource::Kitchen {
            info!(order_id, "Order completed by another kitchen display");
            self.complete(index, now);
            return vec![Effect::Persist(PersistOp::MarkCompleted(order_id.to_string()))];
        }

        let stamp = self.stamp(now);
        let entry = &mut self.active[index];
        entry.state = DisplayState::ReadyFromWaiterPending(stamp);
        entry.order.status = OrderStatus::Ready;
        info!(order_id, "Order marked ready by front of house");

        vec![
            Effect::Persist(PersistOp::UpsertActive(entry.order.clone())),
            Effect::ScheduleExpiry {
                order_id: order_id.to_string(),
                stamp,
                after: WAITER_READY_EXPIRY,
            },
        ]
    }

    /// Kitchen marks an order ready: completes it immediately and tells
    /// the server.
    pub fn mark_ready(&mut self, order_id: &str, now: Instant) -> Vec<Effect> {
        let Some(index) = self.position(order_id) else {
            warn!(order_id, "Cannot mark unknown order ready");
            return Vec::new();
        };
        self.credit_ledger(index);
        self.complete(index, now);
        info!(order_id, "Order marked ready");

        vec![
            Effect::Send(StatusUpdateRequest::new(order_id, OutboundStatus::Ready)),
            Effect::Persist(PersistOp::MarkCompleted(order_id.to_string())),
        ]
    }

    /// Moves a completed order back onto the board.
    ///
    /// The ready ledger is left intact, so a later resend only shows what
    /// was added after the ready mark.
    pub fn undo(&mut self, order_id: &str, now: Instant) -> Vec<Effect> {
        let Some(index) = self.completed.iter().rposition(|e| e.order.id == order_id) else {
            warn!(order_id, "Cannot undo order that is not completed");
            return Vec::new();
        };
        let Some(mut entry) = self.completed.remove(index) else {
            return Vec::new();
        };
        entry.state = DisplayState::Active;
        entry.completed_at = None;
        entry.updated_at = Some(now);
        entry.order.status = OrderStatus::Preparing;
        info!(order_id, "Ready mark undone");

        let effects = vec![
            Effect::Send(StatusUpdateRequest::new(order_id, OutboundStatus::Preparing)),
            Effect::Persist(PersistOp::UpsertActive(entry.order.clone())),
        ];
        self.active.push(entry);
        effects
    }

    /// Permanently removes an order from the board, the completed list,
    /// and the ledger.
    pub fn delete(&mut self, order_id: &str) -> Vec<Effect> {
        let before = self.active.len() + self.completed.len();
        self.active.retain(|e| e.order.id != order_id);
        self.completed.retain(|e| e.order.id != order_id);
        if self.active.len() + self.completed.len() == before {
            warn!(order_id, "Cannot delete unknown order");
            return Vec::new();
        }
        self.forget(order_id);
        info!(order_id, "Order deleted");
        vec![Effect::Persist(PersistOp::Delete(order_id.to_string()))]
    }

    /// Runs a scheduled expiry if the entry still carries `stamp`.
    pub fn expire(&mut self, order_id: &str, stamp: Stamp, now: Instant) -> Vec<Effect> {
        let Some(index) = self.position(order_id) else {
            debug!(order_id, "Expiry for order no longer on board");
            return Vec::new();
        };
        match self.active[index].state {
            DisplayState::CancelledPending(current) if current == stamp => {
                self.active.remove(index);
                self.forget(order_id);
                info!(order_id, "Cancelled order removed");
                vec![Effect::Persist(PersistOp::Delete(order_id.to_string()))]
            }
            DisplayState::ReadyFromWaiterPending(current) if current == stamp => {
                self.complete(index, now);
                info!(order_id, "Ready order moved to completed");
                vec![Effect::Persist(PersistOp::MarkCompleted(order_id.to_string()))]
            }
            _ => {
                debug!(order_id, "Superseded expiry ignored");
                Vec::new()
            }
        }
    }

    /// Seeds the board from the durable store on cold start.
    ///
    /// Completed orders are always loaded. Active orders are only loaded
    /// into an empty board so state rebuilt from live events wins.
    pub fn restore(
        &mut self,
        active: Vec<Order>,
        completed: Vec<Order>,
        now: Instant,
    ) -> Vec<Effect> {
        for order in completed {
            if self.completed.iter().any(|e| e.order.id == order.id) {
                continue;
            }
            let served = self.shown_quantities(&order);
            self.ledger.accumulate(&order.id, &served);
            let mut entry = DisplayEntry::new(order, now);
            entry.state = DisplayState::Completed;
            entry.completed_at = Some(now);
            self.push_completed(entry);
        }

        if !self.active.is_empty() {
            debug!(
                persisted = active.len(),
                "Board already populated, persisted active orders skipped"
            );
            return Vec::new();
        }

        let mut effects = Vec::new();
        for order in active {
            if order.status == OrderStatus::Cancelled {
                let stamp = self.stamp(now);
                effects.push(Effect::ScheduleExpiry {
                    order_id: order.id.clone(),
                    stamp,
                    after: CANCEL_EXPIRY,
                });
                let mut entry = DisplayEntry::new(order, now);
                entry.state = DisplayState::CancelledPending(stamp);
                self.active.push(entry);
            } else {
                self.active.push(DisplayEntry::new(order, now));
            }
        }
        info!(
            active = self.active.len(),
            completed = self.completed.len(),
            "Board restored from store"
        );
        effects
    }

    fn position(&self, order_id: &str) -> Option<usize> {
        self.active.iter().position(|e| e.order.id == order_id)
    }

    fn stamp(&mut self, now: Instant) -> Stamp {
        self.next_stamp += 1;
        Stamp {
            seq: self.next_stamp,
            at: now,
        }
    }

    /// Credits the ledger with the last full snapshot of the order. Orders
    /// restored from disk have none and fall back to [`Self::shown_quantities`].
    fn credit_ledger(&self, index: usize) {
        let order = &self.active[index].order;
        let full = self
            .full_quantities
            .get(&order.id)
            .unwrap_or_else(|| self.shown_quantities(order));
        self.ledger.accumulate(&order.id, &full);
    }

    /// Displayed live lines added on top of what the ledger already holds.
    fn shown_quantities(&self, order: &Order) -> HashMap<ItemKey, u32> {
        let mut shown = self.ledger.snapshot(&order.id);
        for item in order.live_items() {
            let total = shown.entry(item.key()).or_insert(0);
            *total = total.saturating_add(item.quantity);
        }
        shown
    }

    fn complete(&mut self, index: usize, now: Instant) {
        let mut entry = self.active.remove(index);
        entry.state = DisplayState::Completed;
        entry.completed_at = Some(now);
        entry.order.status = OrderStatus::Completed;
        self.push_completed(entry);
    }

    fn push_completed(&mut self, entry: DisplayEntry) {
        if self.completed.len() >= MAX_COMPLETED_HISTORY {
            self.completed.pop_front();
        }
        self.completed.push_back(entry);
    }

    fn forget(&self, order_id: &str) {
        self.ledger.discard(order_id);
        self.full_quantities.discard(order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderItem;
    use rust_decimal_macros::dec;

    fn new_order(id: &str, items: Vec<OrderItem>) -> ServerEvent {
        ServerEvent::NewOrder {
            order: Order::new(id, items),
        }
    }

    fn scheduled(effects: &[Effect]) -> Stamp {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::ScheduleExpiry { stamp, .. } => Some(*stamp),
                _ => None,
            })
            .expect("no expiry scheduled")
    }

    #[test]
    fn new_order_is_active_and_alerts() {
        let mut board = Board::default();
        let order = new_order("o1", vec![OrderItem::new("P1", 1, dec!(5))]);
        let effects = board.apply(order, Instant::now());
        assert_eq!(board.active().len(), 1);
        assert_eq!(board.active()[0].state, DisplayState::Active);
        assert!(effects.contains(&Effect::Alert));
        assert!(matches!(effects[0], Effect::Persist(PersistOp::UpsertActive(_))));
    }

    #[test]
    fn identical_resend_does_not_alert() {
        let mut board = Board::default();
        let now = Instant::now();
        let event = new_order("o1", vec![OrderItem::new("P1", 1, dec!(5))]);
        board.apply(event.clone(), now);
        let effects = board.apply(event, now);
        assert!(!effects.contains(&Effect::Alert));
        assert!(board.active()[0].updated_at.is_none());
    }

    #[test]
    fn changed_resend_sets_emphasis() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 1, dec!(5))]), now);
        let effects = board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        assert!(effects.contains(&Effect::Alert));
        assert_eq!(board.active()[0].updated_at, Some(now));
    }

    #[test]
    fn cancel_then_expire_removes_entry_and_ledger() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 1, dec!(5))]), now);
        let effects = board.apply(
            ServerEvent::OrderCancelled {
                order_id: "o1".to_string(),
            },
            now,
        );
        assert!(board.active()[0].is_cancelled());
        let stamp = scheduled(&effects);

        let effects = board.expire("o1", stamp, now + CANCEL_EXPIRY);
        assert!(board.active().is_empty());
        assert_eq!(
            effects,
            vec![Effect::Persist(PersistOp::Delete("o1".to_string()))]
        );
    }

    #[test]
    fn reactivated_entry_survives_stale_cancel_expiry() {
        let mut board = Board::default();
        let t1 = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 1, dec!(5))]), t1);
        let effects = board.apply(
            ServerEvent::OrderCancelled {
                order_id: "o1".to_string(),
            },
            t1,
        );
        let stale = scheduled(&effects);

        let t2 = t1 + Duration::from_secs(3);
        board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), t2);
        assert_eq!(board.active()[0].state, DisplayState::Active);

        let effects = board.expire("o1", stale, t1 + CANCEL_EXPIRY);
        assert!(effects.is_empty());
        assert_eq!(board.active().len(), 1);
    }

    #[test]
    fn second_cancel_supersedes_first_timer() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 1, dec!(5))]), now);
        let cancel = ServerEvent::OrderCancelled {
            order_id: "o1".to_string(),
        };
        let first = scheduled(&board.apply(cancel.clone(), now));
        let second = scheduled(&board.apply(cancel, now));
        assert_ne!(first, second);

        assert!(board.expire("o1", first, now).is_empty());
        assert_eq!(board.active().len(), 1);
        board.expire("o1", second, now);
        assert!(board.active().is_empty());
    }

    #[test]
    fn waiter_ready_credits_ledger_then_completes() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        let effects = board.apply(
            ServerEvent::OrderUpdate {
                order_id: "o1".to_string(),
                status: UpdateStatus::Ready,
                source: UpdateSource::FrontOfHouse,
            },
            now,
        );
        assert!(board.active()[0].is_ready_from_waiter());
        assert_eq!(
            board.ledger().lookup("o1", &crate::models::ItemKey::new("P1", None)),
            Some(2)
        );

        board.expire("o1", scheduled(&effects), now + WAITER_READY_EXPIRY);
        assert!(board.active().is_empty());
        assert_eq!(board.completed().len(), 1);
        assert_eq!(board.completed()[0].state, DisplayState::Completed);
    }

    #[test]
    fn kitchen_sourced_ready_completes_without_command() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        let effects = board.apply(
            ServerEvent::OrderUpdate {
                order_id: "o1".to_string(),
                status: UpdateStatus::Ready,
                source: UpdateSource::Kitchen,
            },
            now,
        );
        assert!(board.active().is_empty());
        assert_eq!(board.completed().len(), 1);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Send(_))));
    }

    #[test]
    fn mark_ready_sends_command_and_completes() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        let effects = board.mark_ready("o1", now);
        assert_eq!(
            effects[0],
            Effect::Send(StatusUpdateRequest::new("o1", OutboundStatus::Ready))
        );
        assert!(board.active().is_empty());
        assert_eq!(board.completed()[0].completed_at, Some(now));
    }

    #[test]
    fn undo_keeps_ledger_so_resend_shows_nothing_new() {
        let mut board = Board::default();
        let now = Instant::now();
        let event = new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]);
        board.apply(event.clone(), now);
        board.mark_ready("o1", now);

        let effects = board.undo("o1", now);
        assert_eq!(
            effects[0],
            Effect::Send(StatusUpdateRequest::new("o1", OutboundStatus::Preparing))
        );
        assert_eq!(board.active().len(), 1);
        assert!(board.completed().is_empty());
        assert!(board.ledger().contains("o1"));

        board.apply(event, now);
        let entry = board.entry("o1").unwrap();
        assert_eq!(entry.state, DisplayState::Active);
        assert_eq!(entry.order.live_items().count(), 0);
    }

    #[test]
    fn shrinking_resend_clears_stale_increment() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        board.mark_ready("o1", now);

        board.apply(new_order("o1", vec![OrderItem::new("P1", 5, dec!(25))]), now);
        let shown: Vec<_> = board.entry("o1").unwrap().order.live_items().cloned().collect();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].quantity, 3);

        let effects = board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        let entry = board.entry("o1").unwrap();
        assert_eq!(entry.order.live_items().count(), 0);
        assert!(effects.contains(&Effect::Persist(PersistOp::UpsertActive(entry.order.clone()))));
    }

    #[test]
    fn fully_served_resend_keeps_pending_cancel() {
        let mut board = Board::default();
        let now = Instant::now();
        let event = new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]);
        board.apply(event.clone(), now);
        board.apply(
            ServerEvent::OrderUpdate {
                order_id: "o1".to_string(),
                status: UpdateStatus::Ready,
                source: UpdateSource::FrontOfHouse,
            },
            now,
        );
        let cancelled = board.apply(
            ServerEvent::OrderCancelled {
                order_id: "o1".to_string(),
            },
            now,
        );
        let stamp = scheduled(&cancelled);

        board.apply(event, now);
        let entry = board.entry("o1").unwrap();
        assert!(entry.is_cancelled());
        assert_eq!(entry.order.status, OrderStatus::Cancelled);
        board.expire("o1", stamp, now + CANCEL_EXPIRY);
        assert!(board.entry("o1").is_none());
    }

    #[test]
    fn resend_after_ready_shows_only_new_increment() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        board.mark_ready("o1", now);

        board.apply(
            new_order(
                "o1",
                vec![
                    OrderItem::new("P1", 2, dec!(10)),
                    OrderItem::new("P2", 1, dec!(4)),
                ],
            ),
            now,
        );
        let entry = board.entry("o1").unwrap();
        assert_eq!(entry.order.items.len(), 1);
        assert_eq!(entry.order.items[0].product_id, "P2");
    }

    #[test]
    fn updates_for_unknown_orders_are_ignored() {
        let mut board = Board::default();
        let now = Instant::now();
        let effects = board.apply(
            ServerEvent::OrderUpdate {
                order_id: "ghost".to_string(),
                status: UpdateStatus::Ready,
                source: UpdateSource::FrontOfHouse,
            },
            now,
        );
        assert!(effects.is_empty());
        let ghost = ServerEvent::OrderCancelled {
            order_id: "ghost".to_string(),
        };
        assert!(board.apply(ghost, now).is_empty());
        assert!(board.active().is_empty());
    }

    #[test]
    fn delete_discards_ledger() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        board.mark_ready("o1", now);
        let effects = board.delete("o1");
        assert_eq!(
            effects,
            vec![Effect::Persist(PersistOp::Delete("o1".to_string()))]
        );
        assert!(board.completed().is_empty());
        assert!(!board.ledger().contains("o1"));
    }

    #[test]
    fn restore_only_seeds_empty_board() {
        let mut board = Board::default();
        let now = Instant::now();
        board.apply(new_order("live", vec![OrderItem::new("P1", 1, dec!(5))]), now);

        let persisted = vec![Order::new("stale", vec![OrderItem::new("P9", 1, dec!(1))])];
        let done = vec![Order::new("done", vec![OrderItem::new("P2", 1, dec!(2))])];
        board.restore(persisted, done, now);

        assert_eq!(board.active().len(), 1);
        assert_eq!(board.active()[0].order.id, "live");
        assert_eq!(board.completed().len(), 1);
    }

    #[test]
    fn restored_completed_order_stays_served() {
        let mut board = Board::default();
        let now = Instant::now();
        let done = Order::new("o1", vec![OrderItem::new("P1", 2, dec!(10))]);
        board.restore(Vec::new(), vec![done], now);
        assert_eq!(
            board.ledger().lookup("o1", &ItemKey::new("P1", None)),
            Some(2)
        );

        let effects = board.apply(new_order("o1", vec![OrderItem::new("P1", 2, dec!(10))]), now);
        assert!(effects.is_empty());
        assert!(board.active().is_empty());
        assert_eq!(board.completed().len(), 1);
    }

    #[test]
    fn restore_reschedules_cancelled_orders() {
        let mut board = Board::default();
        let now = Instant::now();
        let mut cancelled = Order::new("o1", vec![OrderItem::new("P1", 1, dec!(5))]);
        cancelled.status = OrderStatus::Cancelled;
        let effects = board.restore(
            vec![cancelled, Order::new("o2", vec![])],
            Vec::new(),
            now,
        );
        assert_eq!(board.active().len(), 2);
        assert!(board.active()[0].is_cancelled());
        let stamp = scheduled(&effects);
        board.expire("o1", stamp, now + CANCEL_EXPIRY);
        assert_eq!(board.active().len(), 1);
    }

    #[test]
    fn completed_history_is_bounded() {
        let mut board = Board::default();
        let now = Instant::now();
        for i in 0..(MAX_COMPLETED_HISTORY + 5) {
            let id = format!("o{i}");
            board.apply(new_order(&id, vec![OrderItem::new("P1", 1, dec!(1))]), now);
            board.mark_ready(&id, now);
        }
        assert_eq!(board.completed().len(), MAX_COMPLETED_HISTORY);
        assert_eq!(board.completed()[0].order.id, "o5");
    }
}

//! Line-level diff of an incoming order snapshot against the cached one.
//!
//! Each incoming line is resolved in priority order:
//!
//! 1. a ready-ledger entry for its key: only the quantity above what was
//!    already served survives, as [`ChangeKind::Added`];
//! 2. no cached order at all: the line is new;
//! 3. otherwise it is matched against the cached lines, exactly by key
//!    first, then by product alone (note edits), giving unchanged,
//!    modified, or added.
//!
//! Cached lines left unmatched and not covered by the ledger come back as
//! [`ChangeKind::Removed`]. An order with nothing left to show is only
//! suppressed when it is not on the board; a cached order is always
//! updated so stale increments disappear.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::ledger::ReadyLedger;
use crate::models::{ChangeKind, ItemKey, Order, OrderItem};

/// Outcome of reconciling one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Everything in the snapshot has already been served and the order is
    /// not on the board; it must not reappear.
    Suppressed,
    Applied(ReconciledOrder),
}

/// An annotated order ready to be placed on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledOrder {
    pub order: Order,
    /// No cached copy existed.
    pub is_new: bool,
    /// Live lines differ from the cached ones in quantity, membership or
    /// note. Always false for new orders.
    pub changed: bool,
}

impl Reconciliation {
    /// The reconciled order, if not suppressed.
    #[must_use]
    pub fn applied(self) -> Option<ReconciledOrder> {
        match self {
            Self::Applied(order) => Some(order),
            Self::Suppressed => None,
        }
    }
}

/// Reconciles `incoming` against the board's `cached` copy and the ledger.
///
/// Lines that share a key draw down a single ready budget, so a second
/// identical line only surfaces once the first has used up what the
/// kitchen already finished.
#[must_use]
pub fn reconcile(incoming: &Order, cached: Option<&Order>, ledger: &ReadyLedger) -> Reconciliation {
    let mut ready_budget = ledger.snapshot(&incoming.id);
    let cached_items: Vec<&OrderItem> = cached
        .map(|order| order.live_items().collect())
        .unwrap_or_default();
    let mut matched = vec![false; cached_items.len()];

    let mut items = Vec::with_capacity(incoming.items.len());

    for item in &incoming.items {
        let key = item.key();

        if let Some(remaining) = ready_budget.get_mut(&key) {
            if item.quantity <= *remaining {
                *remaining -= item.quantity;
                continue;
            }
            let delta = item.quantity - *remaining;
            *remaining = 0;
            items.push(OrderItem {
                quantity: delta,
                subtotal: scale_subtotal(item.subtotal, item.quantity, delta),
                change: ChangeKind::Added,
                previous_quantity: Some(0),
                ..item.clone()
            });
            continue;
        }

        if cached.is_none() {
            items.push(annotate(item, ChangeKind::Added, None));
            continue;
        }

        let found = find_unmatched(&cached_items, &matched, |c| c.key() == key)
            .or_else(|| {
                find_unmatched(&cached_items, &matched, |c| c.product_id == item.product_id)
            });

        match found {
            None => items.push(annotate(item, ChangeKind::Added, None)),
            Some(index) => {
                matched[index] = true;
                let previous = cached_items[index];
                if previous.note_text() != item.note_text() || previous.quantity != item.quantity {
                    items.push(annotate(
                        item,
                        ChangeKind::Modified,
                        Some(previous.quantity),
                    ));
                } else {
                    items.push(annotate(item, ChangeKind::Unchanged, None));
                }
            }
        }
    }

    for (index, previous) in cached_items.iter().enumerate() {
        if matched[index] || ready_budget.contains_key(&previous.key()) {
            continue;
        }
        items.push(annotate(previous, ChangeKind::Removed, None));
    }

    if items.is_empty() && cached.is_none() {
        return Reconciliation::Suppressed;
    }

    let order = Order {
        items,
        ..incoming.clone()
    };
    let changed = match cached {
        Some(previous) => live_signature(&order) != live_signature(previous),
        None => false,
    };

    Reconciliation::Applied(ReconciledOrder {
        order,
        is_new: cached.is_none(),
        changed,
    })
}

fn annotate(item: &OrderItem, change: ChangeKind, previous_quantity: Option<u32>) -> OrderItem {
    OrderItem {
        change,
        previous_quantity,
        ..item.clone()
    }
}

fn find_unmatched(
    cached: &[&OrderItem],
    matched: &[bool],
    predicate: impl Fn(&OrderItem) -> bool,
) -> Option<usize> {
    cached
        .iter()
        .enumerate()
        .find(|(index, item)| !matched[*index] && predicate(item))
        .map(|(index, _)| index)
}

/// Subtotal of `delta` units out of a line of `quantity` units.
fn scale_subtotal(subtotal: Decimal, quantity: u32, delta: u32) -> Decimal {
    if quantity == 0 {
        return Decimal::ZERO;
    }
    subtotal * Decimal::from(delta) / Decimal::from(quantity)
}

/// Multiset of (key, quantity) over live lines, order-insensitive.
fn live_signature(order: &Order) -> Vec<(ItemKey, u32)> {
    let mut counts: HashMap<(ItemKey, u32), usize> = HashMap::new();
    for item in order.live_items() {
        *counts.entry((item.key(), item.quantity)).or_default() += 1;
    }
    let mut signature: Vec<(ItemKey, u32)> = counts
        .into_iter()
        .flat_map(|(entry, n)| std::iter::repeat_n(entry, n))
        .collect();
    signature.sort();
    signature
}

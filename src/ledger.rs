//! Per-order, per-line record of what the kitchen has already finished.
//!
//! [`ReadyLedger`] answers "how much of this line is already served";
//! [`FullQuantities`] keeps the last unfiltered quantities seen from the
//! server so that marking an order ready can credit the whole order even
//! when the board only shows a partial increment.
//!
//! Both are shared between the event loop and the delayed-removal path and
//! are guarded by a mutex so every read-modify-write is atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{ItemKey, Order};

type Quantities = HashMap<ItemKey, u32>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Accumulated ready quantities keyed by order and item.
#[derive(Debug, Default)]
pub struct ReadyLedger {
    entries: Mutex<HashMap<String, Quantities>>,
}

impl ReadyLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `full` as ready for `order_id`.
    ///
    /// Each key is set to the latest observed full quantity rather than
    /// added to. A key never moves backwards while the order is served.
    pub fn accumulate(&self, order_id: &str, full: &HashMap<ItemKey, u32>) {
        let mut entries = lock(&self.entries);
        let ledger = entries.entry(order_id.to_string()).or_default();
        for (key, quantity) in full {
            let ready = ledger.entry(key.clone()).or_insert(0);
            *ready = (*ready).max(*quantity);
        }
    }

    /// Ready quantity for one line, if any was ever recorded.
    #[must_use]
    pub fn lookup(&self, order_id: &str, key: &ItemKey) -> Option<u32> {
        lock(&self.entries)
            .get(order_id)
            .and_then(|ledger| ledger.get(key))
            .copied()
    }

    /// Copy of every ready quantity recorded for an order.
    #[must_use]
    pub fn snapshot(&self, order_id: &str) -> HashMap<ItemKey, u32> {
        lock(&self.entries)
            .get(order_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, order_id: &str) -> bool {
        lock(&self.entries).contains_key(order_id)
    }

    /// Drops everything recorded for an order. Only called on permanent
    /// removal, never on undo.
    pub fn discard(&self, order_id: &str) {
        lock(&self.entries).remove(order_id);
    }
}

/// Last unfiltered quantities received from the server, per order.
#[derive(Debug, Default)]
pub struct FullQuantities {
    snapshots: Mutex<HashMap<String, Quantities>>,
}

impl FullQuantities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the quantities of an incoming snapshot, replacing the
    /// previous capture for that order.
    pub fn record(&self, order: &Order) {
        lock(&self.snapshots).insert(order.id.clone(), order.quantities());
    }

    #[must_use]
    pub fn get(&self, order_id: &str) -> Option<HashMap<ItemKey, u32>> {
        lock(&self.snapshots).get(order_id).cloned()
    }

    pub fn discard(&self, order_id: &str) {
        lock(&self.snapshots).remove(order_id);
    }
}

//! Best-effort mirror of board state to a durable local store.
//!
//! The in-memory board is authoritative. [`PersistenceBridge`] queues
//! every committed transition and a single background task applies them
//! to the [`OrderStore`] in submission order; failures are logged and
//! dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

use crate::Result;
use crate::error::GalleyError;
use crate::models::Order;

/// A committed transition to mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    UpsertActive(Order),
    MarkCompleted(String),
    Delete(String),
}

/// Read/write contract of the durable store.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn load_active(&self) -> Result<Vec<Order>>;
    async fn load_completed(&self) -> Result<Vec<Order>>;
    async fn upsert_active(&self, order: &Order) -> Result<()>;
    async fn mark_completed(&self, order_id: &str) -> Result<()>;
    async fn delete(&self, order_id: &str) -> Result<()>;
}

/// One persisted order and whether it has left the active set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredOrder {
    order: Order,
    completed: bool,
}

/// Store contents, keyed by order ID in first-insert order.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Records {
    orders: Vec<StoredOrder>,
}

impl Records {
    fn select(&self, completed: bool) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|r| r.completed == completed)
            .map(|r| r.order.clone())
            .collect()
    }

    fn upsert(&mut self, order: &Order) {
        match self.orders.iter_mut().find(|r| r.order.id == order.id) {
            Some(record) => {
                record.order = order.clone();
                record.completed = false;
            }
            None => self.orders.push(StoredOrder {
                order: order.clone(),
                completed: false,
            }),
        }
    }

    fn mark_completed(&mut self, order_id: &str) {
        if let Some(record) = self.orders.iter_mut().find(|r| r.order.id == order_id) {
            record.completed = true;
        }
    }

    fn delete(&mut self, order_id: &str) {
        self.orders.retain(|r| r.order.id != order_id);
    }
}

fn poison_err<T>(_: PoisonError<T>) -> GalleyError {
    GalleyError::Store("lock poisoned".to_string())
}

/// Volatile store for tests and for running without a disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn load_active(&self) -> Result<Vec<Order>> {
        Ok(self.records.read().map_err(poison_err)?.select(false))
    }

    async fn load_completed(&self) -> Result<Vec<Order>> {
        Ok(self.records.read().map_err(poison_err)?.select(true))
    }

    async fn upsert_active(&self, order: &Order) -> Result<()> {
        self.records.write().map_err(poison_err)?.upsert(order);
        Ok(())
    }

    async fn mark_completed(&self, order_id: &str) -> Result<()> {
        self.records
            .write()
            .map_err(poison_err)?
            .mark_completed(order_id);
        Ok(())
    }

    async fn delete(&self, order_id: &str) -> Result<()> {
        self.records.write().map_err(poison_err)?.delete(order_id);
        Ok(())
    }
}

/// Store backed by a single JSON file, rewritten atomically on each change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Records> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Records::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Records::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, records: &Records) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn modify(&self, f: impl FnOnce(&mut Records)) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut records = self.read().await?;
        f(&mut records);
        self.write(&records).await
    }
}

#[async_trait]
impl OrderStore for JsonFileStore {
    async fn load_active(&self) -> Result<Vec<Order>> {
        let _guard = self.guard.lock().await;
        Ok(self.read().await?.select(false))
    }

    async fn load_completed(&self) -> Result<Vec<Order>> {
        let _guard = self.guard.lock().await;
        Ok(self.read().await?.select(true))
    }

    async fn upsert_active(&self, order: &Order) -> Result<()> {
        self.modify(|records| records.upsert(order)).await
    }

    async fn mark_completed(&self, order_id: &str) -> Result<()> {
        self.modify(|records| records.mark_completed(order_id)).await
    }

    async fn delete(&self, order_id: &str) -> Result<()> {
        self.modify(|records| records.delete(order_id)).await
    }
}

enum Job {
    Write(PersistOp),
    Flush(oneshot::Sender<()>),
}

/// Queues store writes behind the board and loads startup state.
#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn OrderStore>,
    queue: mpsc::UnboundedSender<Job>,
}

impl PersistenceBridge {
    /// Starts the background writer. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn OrderStore>) -> Self {
        let (queue, mut jobs) = mpsc::unbounded_channel::<Job>();
        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            while let Some(job) = jobs.recv().await {
                match job {
                    Job::Write(op) => apply(writer.as_ref(), op).await,
                    Job::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Persistence writer stopped");
        });
        Self { store, queue }
    }

    /// Queues a write without waiting for it.
    pub fn submit(&self, op: PersistOp) {
        if self.queue.send(Job::Write(op)).is_err() {
            warn!("Persistence writer is gone, write dropped");
        }
    }

    /// Waits until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.queue.send(Job::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Reads persisted active and completed orders. A failed read yields an
    /// empty list.
    pub async fn load(&self) -> (Vec<Order>, Vec<Order>) {
        let active = self.store.load_active().await.unwrap_or_else(|e| {
            warn!("Failed to load active orders: {e}");
            Vec::new()
        });
        let completed = self.store.load_completed().await.unwrap_or_else(|e| {
            warn!("Failed to load completed orders: {e}");
            Vec::new()
        });
        (dedup(active), dedup(completed))
    }
}

async fn apply(store: &dyn OrderStore, op: PersistOp) {
    let result = match &op {
        PersistOp::UpsertActive(order) => store.upsert_active(order).await,
        PersistOp::MarkCompleted(id) => store.mark_completed(id).await,
        PersistOp::Delete(id) => store.delete(id).await,
    };
    if let Err(e) = result {
        warn!(op = ?op, "Persistence write failed: {e}");
    }
}

/// Keeps the last record per order ID.
fn dedup(orders: Vec<Order>) -> Vec<Order> {
    let mut latest: HashMap<String, usize> = HashMap::new();
    for (index, order) in orders.iter().enumerate() {
        latest.insert(order.id.clone(), index);
    }
    orders
        .into_iter()
        .enumerate()
        .filter(|(index, order)| latest.get(&order.id) == Some(index))
        .map(|(_, order)| order)
        .collect()
}

//! The kitchen display event loop.
//!
//! Every input (server events, connection changes, kitchen actions,
//! expiry timers) arrives as a [`Message`] on one channel and is applied
//! to the [`Board`] serially. Effects returned by the board are executed
//! here: commands go to the connection supervisor, writes to the
//! persistence bridge, expiries become timers that post back into the
//! same channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::lifecycle::{Board, Effect, Stamp};
use crate::models::event::ServerEvent;
use crate::notify::Notifier;
use crate::persistence::PersistenceBridge;
use crate::websocket::{ConnectionState, SupervisorCommand};

/// Actions taken by kitchen staff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KitchenAction {
    MarkReady(String),
    Undo(String),
    Delete(String),
    /// Log the current board.
    ShowBoard,
}

/// Messages that update the board.
#[derive(Debug)]
pub enum Message {
    /// Event from the order server.
    Server(ServerEvent),
    /// Channel state transition.
    Connection(ConnectionState),
    /// A delayed removal came due.
    Expire { order_id: String, stamp: Stamp },
    /// Input from kitchen staff.
    Kitchen(KitchenAction),
    /// Request to stop the event loop.
    Quit,
}

/// Owns the board and executes its effects.
pub struct Runtime {
    board: Board,
    persistence: PersistenceBridge,
    notifier: Arc<dyn Notifier>,
    tx: mpsc::UnboundedSender<Message>,
    commands: mpsc::UnboundedSender<SupervisorCommand>,
}

impl Runtime {
    /// Creates a runtime. `tx` must feed the receiver later passed to
    /// [`Runtime::run`]; expiry timers post through it.
    #[must_use]
    pub fn new(
        board: Board,
        persistence: PersistenceBridge,
        notifier: Arc<dyn Notifier>,
        tx: mpsc::UnboundedSender<Message>,
        commands: mpsc::UnboundedSender<SupervisorCommand>,
    ) -> Self {
        Self {
            board,
            persistence,
            notifier,
            tx,
            commands,
        }
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Seeds the board from the durable store.
    pub async fn restore(&mut self) {
        let (active, completed) = self.persistence.load().await;
        let effects = self.board.restore(active, completed, Instant::now());
        self.execute(effects);
    }

    /// Applies one message. Returns `false` once the loop should stop.
    pub fn handle(&mut self, message: Message) -> bool {
        let now = Instant::now();
        let effects = match message {
            Message::Server(event) => self.board.apply(event, now),
            Message::Connection(state) => {
                info!(state = ?state, "Connection state changed");
                self.board.set_connection(state);
                Vec::new()
            }
            Message::Expire { order_id, stamp } => self.board.expire(&order_id, stamp, now),
            Message::Kitchen(action) => match action {
                KitchenAction::MarkReady(id) => self.board.mark_ready(&id, now),
                KitchenAction::Undo(id) => self.board.undo(&id, now),
                KitchenAction::Delete(id) => self.board.delete(&id),
                KitchenAction::ShowBoard => {
                    self.log_board();
                    Vec::new()
                }
            },
            Message::Quit => return false,
        };
        self.execute(effects);
        true
    }

    /// Waits until every persistence write issued so far has been attempted.
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    /// Restores from the store, then processes messages until
    /// [`Message::Quit`] or the channel closes.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        self.restore().await;
        while let Some(message) = rx.recv().await {
            if !self.handle(message) {
                break;
            }
        }
        self.flush().await;
        info!("Runtime stopped");
    }

    fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(request) => {
                    if self.commands.send(SupervisorCommand::Send(request)).is_err() {
                        warn!("Connection supervisor is gone, command dropped");
                    }
                }
                Effect::Persist(op) => self.persistence.submit(op),
                Effect::ScheduleExpiry {
                    order_id,
                    stamp,
                    after,
                } => {
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = tx.send(Message::Expire { order_id, stamp });
                    });
                }
                Effect::Alert => self.notifier.play_alert_sound(),
            }
        }
    }

    fn log_board(&self) {
        info!(
            connection = ?self.board.connection(),
            active = self.board.active().len(),
            completed = self.board.completed().len(),
            "Board"
        );
        for entry in self.board.active() {
            info!(
                order_id = %entry.order.id,
                table = ?entry.order.table,
                state = ?entry.state,
                items = entry.order.items.len(),
                "Active order"
            );
            for item in &entry.order.items {
                info!(
                    product = %item.product_id,
                    name = %item.product_name,
                    qty = item.quantity,
                    previous_qty = ?item.previous_quantity,
                    note = item.note_text(),
                    change = ?item.change,
                    "Item"
                );
            }
        }
    }
}

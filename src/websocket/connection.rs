//! Order channel lifecycle management.
//!
//! [`ConnectionSupervisor`] connects, forwards inbound events to the
//! runtime, writes outbound commands, and reconnects with exponential
//! backoff after an unexpected disconnect. A manual reconnect with a new
//! descriptor bypasses the backoff state entirely.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};
use tungstenite::Message as WsMessage;

use super::backoff::{Backoff, BackoffPolicy};
use super::{WsReader, WsWriter, connect, handle_text, ping, send_status_update};
use crate::discovery::ConnectionDescriptor;
use crate::models::event::StatusUpdateRequest;
use crate::runtime::Message;

/// Interval between keepalive pings while connected.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Outbound commands kept while disconnected; the oldest are dropped first.
const MAX_PENDING_COMMANDS: usize = 256;

/// Channel state as seen by the kitchen display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected { tunnel: bool },
    Disconnected,
    /// User-facing failure, e.g. reconnects exhausted.
    Error(String),
}

/// Commands sent from the runtime to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorCommand {
    /// Deliver a status update to the server, now or after reconnecting.
    Send(StatusUpdateRequest),
    /// Drop the current connection and dial this descriptor immediately.
    Reconnect(ConnectionDescriptor),
}

/// Why the reader loop exited.
enum DisconnectReason {
    /// The connection was lost or errored.
    ConnectionError,
    /// A manual reconnect asked for a different server.
    Reconnect(ConnectionDescriptor),
    /// The command channel closed (app shutting down).
    Shutdown,
}

/// How a wait between attempts ended.
enum Wait {
    Retry,
    Shutdown,
}

/// Owns the channel lifecycle for one kitchen display.
pub struct ConnectionSupervisor {
    descriptor: Option<ConnectionDescriptor>,
    tls_config: Option<Arc<rustls::ClientConfig>>,
    backoff: Backoff,
    tx: mpsc::UnboundedSender<Message>,
    cmd_rx: mpsc::UnboundedReceiver<SupervisorCommand>,
    pending: VecDeque<StatusUpdateRequest>,
}

impl ConnectionSupervisor {
    /// Creates a supervisor. With no descriptor it waits for a
    /// [`SupervisorCommand::Reconnect`].
    #[must_use]
    pub fn new(
        descriptor: Option<ConnectionDescriptor>,
        tls_config: Option<Arc<rustls::ClientConfig>>,
        policy: BackoffPolicy,
        tx: mpsc::UnboundedSender<Message>,
        cmd_rx: mpsc::UnboundedReceiver<SupervisorCommand>,
    ) -> Self {
        Self {
            descriptor,
            tls_config,
            backoff: Backoff::new(policy),
            tx,
            cmd_rx,
            pending: VecDeque::new(),
        }
    }

    fn emit(&self, state: ConnectionState) {
        let _ = self.tx.send(Message::Connection(state));
    }

    fn queue(&mut self, request: StatusUpdateRequest) {
        if self.pending.len() >= MAX_PENDING_COMMANDS {
            if let Some(dropped) = self.pending.pop_front() {
                warn!(order_id = %dropped.order_id, "Pending command queue full, dropping oldest");
            }
        }
        info!(order_id = %request.order_id, "Disconnected, command queued");
        self.pending.push_back(request);
    }

    /// Runs the supervisor until the command channel closes.
    pub async fn run(mut self) {
        loop {
            let Some(descriptor) = self.descriptor.clone() else {
                self.emit(ConnectionState::Disconnected);
                match self.wait_for_descriptor().await {
                    Wait::Retry => continue,
                    Wait::Shutdown => return,
                }
            };

            self.emit(ConnectionState::Connecting);
            let url = descriptor.url();
            info!(url = %url, tunnel = descriptor.tunnel, "Connecting to order server");
            let tls = if descriptor.encrypted {
                self.tls_config.clone()
            } else {
                None
            };

            match connect(&url, tls).await {
                Ok((mut write, read)) => {
                    self.backoff.reset();
                    self.emit(ConnectionState::Connected {
                        tunnel: descriptor.tunnel,
                    });
                    info!("Order channel connected");

                    let reason = match self.flush_pending(&mut write).await {
                        Ok(()) => self.read_loop(write, read).await,
                        Err(()) => DisconnectReason::ConnectionError,
                    };
                    match reason {
                        DisconnectReason::Shutdown => {
                            info!("Connection supervisor shutting down");
                            return;
                        }
                        DisconnectReason::Reconnect(next) => {
                            info!(address = %next.address, "Manual reconnect requested");
                            self.descriptor = Some(next);
                            self.backoff.reset();
                            continue;
                        }
                        DisconnectReason::ConnectionError => {
                            self.emit(ConnectionState::Disconnected);
                        }
                    }
                }
                Err(e) => {
                    warn!("Connection failed: {e}");
                    self.emit(ConnectionState::Disconnected);
                }
            }

            if let Wait::Shutdown = self.wait_backoff().await {
                info!("Connection supervisor shutting down");
                return;
            }
        }
    }

    /// Sends commands queued while disconnected, oldest first.
    async fn flush_pending(&mut self, write: &mut WsWriter) -> Result<(), ()> {
        while let Some(request) = self.pending.pop_front() {
            if let Err(e) = send_status_update(write, &request).await {
                warn!("Failed to flush queued command: {e}");
                self.pending.push_front(request);
                return Err(());
            }
        }
        Ok(())
    }

    /// Waits out the next backoff delay, or the cooldown once attempts are
    /// exhausted. Commands keep being served meanwhile.
    async fn wait_backoff(&mut self) -> Wait {
        loop {
            let now = Instant::now();
            let (delay, cooling_down) = match self.backoff.next_delay(now) {
                Ok(delay) => {
                    info!(
                        delay_secs = delay.as_secs(),
                        attempt = self.backoff.attempts(),
                        "Backing off before reconnect"
                    );
                    (delay, false)
                }
                Err(e) => {
                    self.emit(ConnectionState::Error(e.to_string()));
                    let remaining = self.backoff.cooldown_remaining(now).unwrap_or_default();
                    (remaining, true)
                }
            };

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    () = &mut sleep => break,
                    cmd = self.cmd_rx.recv() => match cmd {
                        Some(SupervisorCommand::Send(request)) => self.queue(request),
                        Some(SupervisorCommand::Reconnect(next)) => {
                            info!(address = %next.address, "Manual reconnect requested");
                            self.descriptor = Some(next);
                            self.backoff.reset();
                            return Wait::Retry;
                        }
                        None => return Wait::Shutdown,
                    },
                }
            }

            if !cooling_down {
                return Wait::Retry;
            }
        }
    }

    /// Serves commands until a descriptor arrives.
    async fn wait_for_descriptor(&mut self) -> Wait {
        loop {
            match self.cmd_rx.recv().await {
                Some(SupervisorCommand::Send(request)) => self.queue(request),
                Some(SupervisorCommand::Reconnect(next)) => {
                    self.descriptor = Some(next);
                    self.backoff.reset();
                    return Wait::Retry;
                }
                None => return Wait::Shutdown,
            }
        }
    }

    /// Reads frames and writes commands until disconnection, a manual
    /// reconnect, or shutdown.
    async fn read_loop(&mut self, mut write: WsWriter, mut read: WsReader) -> DisconnectReason {
        let mut keepalive = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Some(event) = handle_text(&text) {
                                if self.tx.send(Message::Server(event)).is_err() {
                                    return DisconnectReason::Shutdown;
                                }
                            }
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            warn!(frame = ?frame, "Server closed the connection");
                            return DisconnectReason::ConnectionError;
                        }
                        Some(Ok(_)) => {} // Binary/Ping/Pong frames
                        Some(Err(e)) => {
                            warn!("WebSocket error: {e}");
                            return DisconnectReason::ConnectionError;
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return DisconnectReason::ConnectionError;
                        }
                    }
                }

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(SupervisorCommand::Send(request)) => {
                            if let Err(e) = send_status_update(&mut write, &request).await {
                                warn!("Failed to send command: {e}");
                                self.pending.push_front(request);
                                return DisconnectReason::ConnectionError;
                            }
                        }
                        Some(SupervisorCommand::Reconnect(next)) => {
                            let _ = write.close().await;
                            return DisconnectReason::Reconnect(next);
                        }
                        None => {
                            let _ = write.close().await;
                            return DisconnectReason::Shutdown;
                        }
                    }
                }

                _ = keepalive.tick() => {
                    if let Err(e) = ping(&mut write).await {
                        warn!("Ping failed: {e}");
                        return DisconnectReason::ConnectionError;
                    }
                }
            }
        }
    }
}

//! Async WebSocket plumbing for the order channel.
//!
//! This module is organized by concern:
//! - [`backoff`] - Reconnect delay and cooldown policy
//! - [`connection`] - Connection lifecycle supervision
//! - [`handler`] - Inbound frame parsing

mod backoff;
mod connection;
mod handler;

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info};
use tungstenite::Message;

use crate::Result;
use crate::models::event::StatusUpdateRequest;

pub use backoff::{
    Backoff, BackoffPolicy, DEFAULT_COOLDOWN, DEFAULT_MAX_ATTEMPTS, INITIAL_BACKOFF, MAX_BACKOFF,
};
pub use connection::{ConnectionState, ConnectionSupervisor, SupervisorCommand};
pub use handler::handle_text;

/// Write half of an order channel connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of an order channel connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the given URL.
///
/// `tls_config` is used for `wss://` URLs; without it the bundled web PKI
/// roots apply.
///
/// # Errors
///
/// Returns a [`GalleyError`](crate::GalleyError) if the connection or TLS handshake fails.
pub async fn connect(
    url: &str,
    tls_config: Option<Arc<rustls::ClientConfig>>,
) -> Result<(WsWriter, WsReader)> {
    let connector = tls_config.map(Connector::Rustls);
    let (ws_stream, _) = connect_async_tls_with_config(url, None, false, connector).await?;
    info!("WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Sends a ping frame to keep the connection alive through NAT and tunnels.
///
/// # Errors
///
/// Returns a [`GalleyError`](crate::GalleyError) if sending the frame fails.
pub async fn ping(write: &mut WsWriter) -> Result<()> {
    write.send(Message::Ping(Default::default())).await?;
    debug!("Sent ping");

    Ok(())
}

/// Sends a `status_update` command to the order server.
///
/// # Errors
///
/// Returns a [`GalleyError`](crate::GalleyError) if serializing or
/// sending the command fails.
pub async fn send_status_update(write: &mut WsWriter, request: &StatusUpdateRequest) -> Result<()> {
    let json = serde_json::to_string(request)?;
    write.send(Message::Text(json.into())).await?;
    info!(
        order_id = %request.order_id,
        status = ?request.status,
        "Sent status update"
    );

    Ok(())
}

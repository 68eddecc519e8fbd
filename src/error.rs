//! Crate-level error types.
//!
//! [`GalleyError`] unifies every error source (configuration, WebSocket,
//! JSON, discovery, persistence) behind a single enum so callers can match
//! on the variant they care about while still using the `?` operator for
//! easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GalleyError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum GalleyError {
    /// An environment variable was missing, inconsistent, or unparsable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An HTTP probe (tunnel URL check) failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading or writing a local file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The TLS client configuration could not be built.
    #[error("tls error: {0}")]
    Tls(String),

    /// No order-management server could be located.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// A manually entered address or tunnel URL was rejected.
    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    /// Reconnect attempts are exhausted and the cooldown window is running.
    #[error("connection lost, retrying in {remaining_secs}s")]
    ReconnectCooldown { remaining_secs: u64 },

    /// The durable order store rejected a read or write.
    #[error("store error: {0}")]
    Store(String),

    /// An inbound frame was not a recognizable server event.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

//! Kitchen display client for a restaurant order-management server.
//!
//! Receives orders over a WebSocket channel, reconciles resent orders
//! against what the kitchen already served, and drives each order through
//! its display lifecycle with durable persistence and automatic
//! reconnection.

pub mod config;
pub mod console;
pub mod discovery;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod reconcile;
pub mod runtime;
pub mod tls;
pub mod websocket;

pub use error::{GalleyError, Result};

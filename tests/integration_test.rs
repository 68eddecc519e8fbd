//! Live network checks for discovery probes and encrypted connects.
//!
//! These tests require outbound network access.
//! Run with: `cargo test --features integration-tests`

#![cfg(feature = "integration-tests")]

use std::sync::Arc;

use galley::GalleyError;
use galley::discovery::{Discovery, StaticDiscovery, manual_tunnel};
use galley::tls::build_tls_config;
use galley::websocket::connect;

/// Public WebSocket echo endpoint.
const ECHO_WS_URL: &str = "wss://echo.websocket.org";

fn discovery() -> StaticDiscovery {
    let tls = Arc::new(build_tls_config(None).expect("Failed to build TLS config"));
    StaticDiscovery::new(None, tls)
}

#[tokio::test]
async fn test_tunnel_probe_reaches_public_host() {
    assert!(discovery().check_tunnel_url("https://example.com").await);
}

#[tokio::test]
async fn test_manual_tunnel_rejects_unresolvable_host() {
    let err = manual_tunnel(&discovery(), "https://galley.invalid")
        .await
        .unwrap_err();
    assert!(matches!(err, GalleyError::InvalidAddress(_)));
}

#[tokio::test]
async fn test_encrypted_connect() {
    let tls = Arc::new(build_tls_config(None).expect("Failed to build TLS config"));
    let result = connect(ECHO_WS_URL, Some(tls)).await;
    assert!(result.is_ok(), "Failed to connect over TLS: {:?}", result.err());
}

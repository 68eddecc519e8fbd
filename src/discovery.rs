//! Locating the order-management server.
//!
//! LAN broadcast discovery lives outside this crate; [`Discovery`] is the
//! contract it fulfils. [`StaticDiscovery`] serves a configured address or
//! tunnel URL and performs the reachability checks used to validate
//! manual entries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::ServerConfig;
use crate::error::GalleyError;

/// How long a reachability probe may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where and how to reach the order server for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub address: String,
    pub tunnel: bool,
    pub encrypted: bool,
}

impl ConnectionDescriptor {
    /// A direct LAN address (`host:port` or a `ws(s)://` URL).
    #[must_use]
    pub fn direct(address: &str, encrypted: bool) -> Self {
        Self {
            address: address.trim().to_string(),
            tunnel: false,
            encrypted: encrypted || address.trim().starts_with("wss://"),
        }
    }

    /// A tunnel URL (`https://...`).
    #[must_use]
    pub fn tunnel(url: &str) -> Self {
        let url = url.trim();
        Self {
            address: url.to_string(),
            tunnel: true,
            encrypted: url.starts_with("https://") || url.starts_with("wss://"),
        }
    }

    /// WebSocket URL to dial.
    #[must_use]
    pub fn url(&self) -> String {
        let address = self.address.as_str();
        if address.starts_with("ws://") || address.starts_with("wss://") {
            return address.to_string();
        }
        if let Some(rest) = address.strip_prefix("https://") {
            return format!("wss://{rest}");
        }
        if let Some(rest) = address.strip_prefix("http://") {
            return format!("ws://{rest}");
        }
        let scheme = if self.encrypted { "wss" } else { "ws" };
        format!("{scheme}://{address}")
    }
}

/// Discovery collaborator contract.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Finds a server, or `None` if nothing answered.
    async fn discover(&self) -> Option<ConnectionDescriptor>;
    /// Whether a `host:port` address accepts connections.
    async fn check_address(&self, address: &str) -> bool;
    /// Whether a tunnel URL answers HTTP requests.
    async fn check_tunnel_url(&self, url: &str) -> bool;
}

/// Splits `host:port` out of an address, tolerating a `ws(s)://` prefix
/// and a trailing path.
///
/// # Errors
///
/// Returns [`GalleyError::InvalidAddress`] if the host is empty or the
/// port is missing or not a number.
pub fn parse_host_port(address: &str) -> Result<(String, u16)> {
    let trimmed = address.trim();
    let rest = trimmed
        .strip_prefix("wss://")
        .or_else(|| trimmed.strip_prefix("ws://"))
        .unwrap_or(trimmed);
    let authority = rest.split('/').next().unwrap_or_default();
    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| GalleyError::InvalidAddress(format!("{address}: missing port")))?;
    if host.is_empty() {
        return Err(GalleyError::InvalidAddress(format!("{address}: missing host")));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| GalleyError::InvalidAddress(format!("{address}: invalid port")))?;
    Ok((host.to_string(), port))
}

/// Checks that a tunnel URL is an absolute `http(s)://` URL with a host.
///
/// # Errors
///
/// Returns [`GalleyError::InvalidAddress`] otherwise.
pub fn validate_tunnel_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| GalleyError::InvalidAddress(format!("{url}: expected an http(s) URL")))?;
    if rest.split('/').next().unwrap_or_default().is_empty() {
        return Err(GalleyError::InvalidAddress(format!("{url}: missing host")));
    }
    Ok(())
}

/// Discovery that only knows what was configured.
pub struct StaticDiscovery {
    configured: Option<ConnectionDescriptor>,
    tls_config: Arc<rustls::ClientConfig>,
}

impl StaticDiscovery {
    #[must_use]
    pub fn new(
        configured: Option<ConnectionDescriptor>,
        tls_config: Arc<rustls::ClientConfig>,
    ) -> Self {
        Self {
            configured,
            tls_config,
        }
    }

    /// Uses the configured address, falling back to the tunnel URL.
    #[must_use]
    pub fn from_config(config: &ServerConfig, tls_config: Arc<rustls::ClientConfig>) -> Self {
        let configured = match (&config.address, &config.tunnel_url) {
            (Some(address), _) => Some(ConnectionDescriptor::direct(address, config.encrypted)),
            (None, Some(url)) => Some(ConnectionDescriptor::tunnel(url)),
            (None, None) => None,
        };
        Self::new(configured, tls_config)
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self) -> Option<ConnectionDescriptor> {
        let descriptor = self.configured.clone()?;
        let reachable = if descriptor.tunnel {
            self.check_tunnel_url(&descriptor.address).await
        } else {
            self.check_address(&descriptor.address).await
        };
        if reachable {
            info!(address = %descriptor.address, tunnel = descriptor.tunnel, "Order server found");
            Some(descriptor)
        } else {
            warn!(address = %descriptor.address, "Configured order server is unreachable");
            None
        }
    }

    async fn check_address(&self, address: &str) -> bool {
        let Ok((host, port)) = parse_host_port(address) else {
            return false;
        };
        match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((host.as_str(), port))).await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(address, "Address probe failed: {e}");
                false
            }
            Err(_) => {
                debug!(address, "Address probe timed out");
                false
            }
        }
    }

    async fn check_tunnel_url(&self, url: &str) -> bool {
        if validate_tunnel_url(url).is_err() {
            return false;
        }
        let client = match reqwest::Client::builder()
            .use_preconfigured_tls((*self.tls_config).clone())
            .timeout(PROBE_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build HTTP client: {e}");
                return false;
            }
        };
        match client.get(url.trim()).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                debug!(url, "Tunnel probe failed: {e}");
                false
            }
        }
    }
}

/// Validates a manually entered LAN address.
///
/// # Errors
///
/// Returns [`GalleyError::InvalidAddress`] if the address is malformed or
/// nothing accepts connections there. Never retried.
pub async fn manual_address(
    discovery: &dyn Discovery,
    address: &str,
    encrypted: bool,
) -> Result<ConnectionDescriptor> {
    parse_host_port(address)?;
    if !discovery.check_address(address).await {
        return Err(GalleyError::InvalidAddress(format!(
            "{address}: no order server is listening"
        )));
    }
    Ok(ConnectionDescriptor::direct(address, encrypted))
}

/// Validates a manually entered tunnel URL.
///
/// # Errors
///
/// Returns [`GalleyError::InvalidAddress`] if the URL is malformed or the
/// tunnel does not answer. Never retried.
pub async fn manual_tunnel(discovery: &dyn Discovery, url: &str) -> Result<ConnectionDescriptor> {
    validate_tunnel_url(url)?;
    if !discovery.check_tunnel_url(url).await {
        return Err(GalleyError::InvalidAddress(format!("{url}: tunnel is unreachable")));
    }
    Ok(ConnectionDescriptor::tunnel(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::build_tls_config;

    fn discovery(configured: Option<ConnectionDescriptor>) -> StaticDiscovery {
        StaticDiscovery::new(configured, Arc::new(build_tls_config(None).unwrap()))
    }

    #[test]
    fn descriptor_urls() {
        assert_eq!(
            ConnectionDescriptor::direct("10.0.0.5:8080", false).url(),
            "ws://10.0.0.5:8080"
        );
        assert_eq!(
            ConnectionDescriptor::direct("10.0.0.5:8443", true).url(),
            "wss://10.0.0.5:8443"
        );
        assert_eq!(
            ConnectionDescriptor::direct("ws://pos.local:9000/kds", false).url(),
            "ws://pos.local:9000/kds"
        );
        let tunnel = ConnectionDescriptor::tunnel("https://abc.trycloudflare.com/ws");
        assert!(tunnel.tunnel);
        assert!(tunnel.encrypted);
        assert_eq!(tunnel.url(), "wss://abc.trycloudflare.com/ws");
    }

    #[test]
    fn host_port_parsing() {
        assert_eq!(
            parse_host_port("192.168.1.20:8080").unwrap(),
            ("192.168.1.20".to_string(), 8080)
        );
        assert_eq!(
            parse_host_port("ws://pos.local:9000/kds").unwrap(),
            ("pos.local".to_string(), 9000)
        );
        assert!(parse_host_port("192.168.1.20").is_err());
        assert!(parse_host_port(":8080").is_err());
        assert!(parse_host_port("pos.local:http").is_err());
    }

    #[test]
    fn tunnel_url_validation() {
        assert!(validate_tunnel_url("https://abc.example.com").is_ok());
        assert!(validate_tunnel_url("abc.example.com").is_err());
        assert!(validate_tunnel_url("https://").is_err());
    }

    #[tokio::test]
    async fn check_address_sees_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        assert!(discovery(None).check_address(&address).await);
    }

    #[tokio::test]
    async fn manual_address_rejects_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = manual_address(&discovery(None), &address, false)
            .await
            .unwrap_err();
        assert!(matches!(err, GalleyError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn manual_address_rejects_malformed_input() {
        let err = manual_address(&discovery(None), "not an address", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing port"));
    }

    #[tokio::test]
    async fn discover_without_configuration_finds_nothing() {
        assert!(discovery(None).discover().await.is_none());
    }

    #[tokio::test]
    async fn discover_returns_reachable_configured_address() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let configured = ConnectionDescriptor::direct(&address, false);
        assert_eq!(
            discovery(Some(configured.clone())).discover().await,
            Some(configured)
        );
    }
}

//! Application configuration loaded from environment variables.
//!
//! - `GALLEY_SERVER_ADDRESS` - order server `host:port` or `ws(s)://` URL
//! - `GALLEY_TUNNEL_URL` - tunnel URL used when no address is set
//! - `GALLEY_ENCRYPTED` - dial plain addresses with `wss://` (default `false`)
//! - `GALLEY_CA_CERT` - extra PEM CA certificate for encrypted channels
//! - `GALLEY_STORE_PATH` - durable order store file
//! - `GALLEY_MAX_RECONNECT_ATTEMPTS` - reconnects before cooling down
//! - `GALLEY_RECONNECT_COOLDOWN_SECS` - cooldown length in seconds

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::GalleyError;
use crate::websocket::BackoffPolicy;

/// Default durable store location.
const DEFAULT_STORE_PATH: &str = "galley-orders.json";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store_path: PathBuf,
    pub reconnect: BackoffPolicy,
}

/// How to reach the order-management server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub address: Option<String>,
    pub tunnel_url: Option<String>,
    pub encrypted: bool,
    pub ca_cert: Option<PathBuf>,
}

/// Loads the application configuration from environment variables.
///
/// Every variable is optional. Without an address or tunnel URL the
/// client starts disconnected and waits for a manual connect.
///
/// # Errors
///
/// Returns [`GalleyError::Config`] if a boolean or numeric variable
/// cannot be parsed, or the attempt count is zero.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let encrypted = match non_empty_var("GALLEY_ENCRYPTED") {
        Some(value) => parse_bool("GALLEY_ENCRYPTED", &value)?,
        None => false,
    };

    let mut reconnect = BackoffPolicy::default();
    if let Some(value) = non_empty_var("GALLEY_MAX_RECONNECT_ATTEMPTS") {
        reconnect.max_attempts = parse_number("GALLEY_MAX_RECONNECT_ATTEMPTS", &value)?;
        if reconnect.max_attempts == 0 {
            return Err(GalleyError::Config(
                "GALLEY_MAX_RECONNECT_ATTEMPTS must be at least 1".to_string(),
            ));
        }
    }
    if let Some(value) = non_empty_var("GALLEY_RECONNECT_COOLDOWN_SECS") {
        reconnect.cooldown =
            Duration::from_secs(parse_number("GALLEY_RECONNECT_COOLDOWN_SECS", &value)?);
    }

    Ok(AppConfig {
        server: ServerConfig {
            address: non_empty_var("GALLEY_SERVER_ADDRESS"),
            tunnel_url: non_empty_var("GALLEY_TUNNEL_URL"),
            encrypted,
            ca_cert: non_empty_var("GALLEY_CA_CERT").map(PathBuf::from),
        },
        store_path: non_empty_var("GALLEY_STORE_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from),
        reconnect,
    })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parse_bool(name: &str, value: &str) -> crate::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GalleyError::Config(format!(
            "{name} must be true or false, got {value:?}"
        ))),
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| GalleyError::Config(format!("{name} must be a number, got {value:?}")))
}

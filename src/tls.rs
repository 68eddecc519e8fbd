//! TLS configuration for encrypted order channels and tunnel probes.
//!
//! Builds a [`rustls::ClientConfig`] trusting the bundled web PKI roots
//! plus, optionally, a site CA certificate, which is how order servers on
//! a restaurant LAN usually present self-issued certificates.

use std::path::Path;
use std::sync::Arc;

use rustls::ClientConfig;

use crate::Result;
use crate::error::GalleyError;

/// Builds a [`ClientConfig`] from the web PKI roots and an optional extra
/// CA certificate in PEM form.
///
/// # Errors
///
/// Returns [`GalleyError::Tls`] if the CA file cannot be read, holds no
/// certificate, or cannot be parsed.
pub fn build_tls_config(ca_cert: Option<&Path>) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = ca_cert {
        let pem = std::fs::read(path)
            .map_err(|e| GalleyError::Tls(format!("failed to read {}: {e}", path.display())))?;
        let certs: Vec<_> = rustls_pemfile::certs(&mut &pem[..])
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GalleyError::Tls(format!("failed to parse CA PEM: {e}")))?;
        if certs.is_empty() {
            return Err(GalleyError::Tls(format!(
                "no certificate found in {}",
                path.display()
            )));
        }
        root_store.add_parsable_certificates(certs);
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| GalleyError::Tls(format!("unsupported protocol versions: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(config)
}

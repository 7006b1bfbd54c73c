//! TLS client settings for IRC connections
//!
//! Server certificates are checked against the platform's root store unless
//! a store is supplied. AWS-LC is the only cryptography provider used.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};

use crate::common::SinkError;

/// Builds the `rustls` client configuration for the IRC connection
#[derive(Clone, Default)]
pub struct TlsClientConfigBuilder {
    root_cert_store: Option<RootCertStore>,
}

impl TlsClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust these roots instead of the platform store
    pub fn with_root_cert_store(mut self, store: RootCertStore) -> Self {
        self.root_cert_store = Some(store);
        self
    }

    /// # Errors
    ///
    /// Fails when the platform store yields no usable certificate, or the
    /// provider cannot offer the default protocol versions.
    pub fn build(self) -> Result<Arc<ClientConfig>, SinkError> {
        let root_cert_store = match self.root_cert_store {
            Some(store) => store,
            None => load_platform_root_certificates()?,
        };

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| SinkError::tls(e.to_string()))?
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        Ok(Arc::new(config))
    }
}

fn load_platform_root_certificates() -> Result<RootCertStore, SinkError> {
    let result = rustls_native_certs::load_native_certs();
    for error in &result.errors {
        tracing::debug!(error = %error, "skipping unreadable platform certificates");
    }

    let mut store = RootCertStore::empty();
    let (added, failed) = store.add_parsable_certificates(result.certs);
    if added == 0 {
        return Err(SinkError::tls(
            "no usable root certificates in the platform certificate store",
        ));
    }

    tracing::debug!(added, failed, "loaded platform root certificates");
    Ok(store)
}

/// Name the server certificate must match: the host part of `host:port`
pub(crate) fn server_name(address: &str) -> Result<ServerName<'static>, SinkError> {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        _ => address,
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');

    ServerName::try_from(host.to_owned())
        .map_err(|e| SinkError::tls(format!("invalid server name '{host}': {e}")))
}

//! Listener error types

use std::io;

use sysrelay_protocol::Port;
use thiserror::Error;

/// Listener errors
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind the listening socket
    #[error("failed to bind syslog port {port} on {address}: {source}")]
    Bind {
        port: Port,
        address: String,
        #[source]
        source: io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ListenerError {
    pub fn bind(port: Port, address: impl Into<String>, source: io::Error) -> Self {
        Self::Bind {
            port,
            address: address.into(),
            source,
        }
    }
}

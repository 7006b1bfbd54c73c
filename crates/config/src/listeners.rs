//! Listener configuration
//!
//! Applies to every port that appears in `[routes]`.

use std::time::Duration;

use serde::Deserialize;

/// Settings shared by all syslog listeners
///
/// # Example
///
/// ```toml
/// [listeners]
/// address = "0.0.0.0"
/// max_message_size = 8192
/// udp_workers = 2
/// tcp_connection_timeout = "5m"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenersConfig {
    /// Bind address for all listeners
    /// Default: "0.0.0.0"
    pub address: String,

    /// Largest datagram or TCP line accepted (bytes)
    /// Default: 8192
    pub max_message_size: usize,

    /// Receive workers per UDP port
    /// Default: 2
    pub udp_workers: usize,

    /// Close idle TCP connections after this long (0 = never)
    /// Default: 0s
    #[serde(with = "humantime_serde")]
    pub tcp_connection_timeout: Duration,
}

impl Default for ListenersConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            max_message_size: 8192,
            udp_workers: 2,
            tcp_connection_timeout: Duration::ZERO,
        }
    }
}

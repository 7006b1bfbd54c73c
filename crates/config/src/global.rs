//! Global configuration settings

use std::time::Duration;

use serde::Deserialize;

/// Settings that apply across all components
///
/// # Example
///
/// ```toml
/// [global]
/// queue_size = 10000
/// shutdown_timeout = "5s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Capacity of the dispatcher's event channel
    /// Default: 10000
    pub queue_size: usize,

    /// How long to wait for each task during shutdown
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            queue_size: 10_000,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

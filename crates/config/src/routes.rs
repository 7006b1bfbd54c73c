//! Route configuration
//!
//! ```toml
//! [routes]
//! "514/udp" = ["#ops", "#net"]
//! "55514/tcp" = ["#net"]
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use sysrelay_protocol::Port;
use sysrelay_routing::Route;

use crate::error::{ConfigError, Result};

/// Port string → channel names, as written in the file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RoutesConfig(BTreeMap<String, Vec<String>>);

impl RoutesConfig {
    /// Parse every entry into routes
    ///
    /// # Errors
    ///
    /// Returns `InvalidPort` for the first key that is not `<number>/<tcp|udp>`.
    pub fn routes(&self) -> Result<Vec<Route>> {
        let mut routes = Vec::new();
        for (port_str, channels) in &self.0 {
            let port: Port = port_str
                .parse()
                .map_err(|e| ConfigError::invalid_port(port_str, e))?;
            routes.extend(channels.iter().map(|c| Route::new(port, c)));
        }
        Ok(routes)
    }

    /// Whether no routes are configured at all
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

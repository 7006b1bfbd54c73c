//! Routing error types

use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors that can occur while building or gating the routing table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Destination name is not a target of any route
    #[error("no ports are routed to destination '{name}'")]
    UnknownDestination {
        /// Name of the destination
        name: String,
    },

    /// Route target was not registered as a destination
    #[error("route target '{name}' is not a configured destination")]
    UnregisteredDestination {
        /// Name of the route target
        name: String,
    },
}

impl RoutingError {
    /// Create an UnknownDestination error
    #[inline]
    pub fn unknown_destination(name: impl Into<String>) -> Self {
        Self::UnknownDestination { name: name.into() }
    }

    /// Create an UnregisteredDestination error
    #[inline]
    pub fn unregistered_destination(name: impl Into<String>) -> Self {
        Self::UnregisteredDestination { name: name.into() }
    }
}

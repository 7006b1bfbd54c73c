//! Destinations and routes
//!
//! A destination is identified by name only. The secret is opaque to routing
//! and handed to the sink when it joins.

use std::fmt;

use sysrelay_protocol::Port;

/// A named outbound destination (an IRC channel)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    name: String,
    secret: Option<String>,
}

impl Destination {
    /// Create a destination without a secret
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: None,
        }
    }

    /// Create a destination that needs a secret (channel key) to join
    #[inline]
    pub fn with_secret(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: Some(secret.into()),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }
}

// Keep secrets out of logs
impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One port to one destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route {
    pub port: Port,
    pub destination: String,
}

impl Route {
    #[inline]
    pub fn new(port: Port, destination: impl Into<String>) -> Self {
        Self {
            port,
            destination: destination.into(),
        }
    }
}

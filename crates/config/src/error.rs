//! Configuration error types

use std::io;

use sysrelay_protocol::PortParseError;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Route key is not a valid port
    #[error("invalid syslog port '{port}' in routes: {source}")]
    InvalidPort {
        /// The route key as written
        port: String,
        #[source]
        source: PortParseError,
    },

    /// Route targets a channel that is not configured to be joined
    #[error("route target channel '{channel}' is not configured to be joined")]
    UnknownChannel {
        /// Name of the channel
        channel: String,
    },

    /// Channel configured more than once
    #[error("channel '{channel}' is configured more than once")]
    DuplicateChannel {
        /// Name of the channel
        channel: String,
    },

    /// Validation error - required field missing
    #[error("{component} is missing required field '{field}'")]
    MissingField {
        /// Config section (e.g. "irc.bot")
        component: &'static str,
        /// Missing field name
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("{component} '{name}' has invalid {field}: {message}")]
    InvalidValue {
        /// Config section
        component: &'static str,
        /// Name of the component
        name: String,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },
}

impl ConfigError {
    /// Create an InvalidPort error
    pub fn invalid_port(port: impl Into<String>, source: PortParseError) -> Self {
        Self::InvalidPort {
            port: port.into(),
            source,
        }
    }

    /// Create an UnknownChannel error
    pub fn unknown_channel(channel: impl Into<String>) -> Self {
        Self::UnknownChannel {
            channel: channel.into(),
        }
    }

    /// Create a DuplicateChannel error
    pub fn duplicate_channel(channel: impl Into<String>) -> Self {
        Self::DuplicateChannel {
            channel: channel.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(component: &'static str, field: &'static str) -> Self {
        Self::MissingField { component, field }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component,
            name: name.into(),
            field,
            message: message.into(),
        }
    }
}

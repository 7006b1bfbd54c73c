//! Protocol error types

use thiserror::Error;

/// Errors from parsing a `"<number>/<transport>"` port string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortParseError {
    /// No `/` separating number and transport
    #[error("invalid port '{input}': expected '<number>/<tcp|udp>'")]
    MissingTransport { input: String },

    /// Number is not in 1-65535
    #[error("invalid port '{input}': number must be in 1-65535")]
    InvalidNumber { input: String },

    /// Transport is neither tcp nor udp
    #[error("unknown transport '{transport}': expected 'tcp' or 'udp'")]
    UnknownTransport { transport: String },
}

impl PortParseError {
    #[inline]
    pub fn missing_transport(input: impl Into<String>) -> Self {
        Self::MissingTransport {
            input: input.into(),
        }
    }

    #[inline]
    pub fn invalid_number(input: impl Into<String>) -> Self {
        Self::InvalidNumber {
            input: input.into(),
        }
    }

    #[inline]
    pub fn unknown_transport(transport: impl Into<String>) -> Self {
        Self::UnknownTransport {
            transport: transport.into(),
        }
    }
}

/// Errors that can occur when decoding a syslog record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing to decode
    #[error("empty message")]
    Empty,

    /// Message exceeds the maximum length for its format
    #[error("message size {size} exceeds maximum {max}")]
    TooLong { size: usize, max: usize },

    /// Missing or malformed `<PRI>` prefix
    #[error("invalid priority: {0}")]
    InvalidPriority(&'static str),

    /// RFC 5424 header could not be parsed
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),
}

impl DecodeError {
    #[inline]
    pub fn too_long(size: usize, max: usize) -> Self {
        Self::TooLong { size, max }
    }
}

//! Listening port identification
//!
//! A `Port` is the routing key for inbound traffic: the same number on TCP
//! and UDP are distinct ports.

use std::fmt;
use std::str::FromStr;

use crate::error::PortParseError;

/// Network transport of a listening port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    /// Lowercase name as used in configuration (`tcp`, `udp`)
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = PortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Self::Tcp)
        } else if s.eq_ignore_ascii_case("udp") {
            Ok(Self::Udp)
        } else {
            Err(PortParseError::unknown_transport(s))
        }
    }
}

/// A listening port: number plus transport
///
/// Ordered by number first, then transport, so sorted sets of ports read
/// naturally in logs.
///
/// # Example
///
/// ```
/// use sysrelay_protocol::{Port, Transport};
///
/// let port: Port = "514/UDP".parse().unwrap();
/// assert_eq!(port, Port::new(514, Transport::Udp));
/// assert_eq!(port.to_string(), "514/udp");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Port {
    number: u16,
    transport: Transport,
}

impl Port {
    /// Create a port
    ///
    /// Port number 0 is not a valid listening port; use `FromStr` when the
    /// value comes from user input.
    #[inline]
    pub const fn new(number: u16, transport: Transport) -> Self {
        Self { number, transport }
    }

    /// UDP port shorthand
    #[inline]
    pub const fn udp(number: u16) -> Self {
        Self::new(number, Transport::Udp)
    }

    /// TCP port shorthand
    #[inline]
    pub const fn tcp(number: u16) -> Self {
        Self::new(number, Transport::Tcp)
    }

    #[inline]
    pub fn number(&self) -> u16 {
        self.number
    }

    #[inline]
    pub fn transport(&self) -> Transport {
        self.transport
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.transport)
    }
}

impl FromStr for Port {
    type Err = PortParseError;

    /// Parse `"<number>/<transport>"`, e.g. `"514/udp"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, transport) = s
            .split_once('/')
            .ok_or_else(|| PortParseError::missing_transport(s))?;

        // u16 parsing alone would accept a leading '+'
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PortParseError::invalid_number(s));
        }
        let number: u16 = number
            .parse()
            .map_err(|_| PortParseError::invalid_number(s))?;
        if number == 0 {
            return Err(PortParseError::invalid_number(s));
        }

        let transport = transport.parse()?;
        Ok(Self::new(number, transport))
    }
}

#[cfg(test)]
#[path = "port_test.rs"]
mod port_test;

//! sysrelay - Protocol
//!
//! Shared vocabulary for the relay: listening ports, decoded syslog records,
//! and the events that flow from listeners and sinks into the dispatcher.
//!
//! # Example
//!
//! ```
//! use sysrelay_protocol::{decode, Facility, Port, Severity};
//!
//! let port: Port = "514/udp".parse().unwrap();
//! assert_eq!(port.number(), 514);
//!
//! let record = decode(b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed").unwrap();
//! assert_eq!(record.facility, Facility::Security4);
//! assert_eq!(record.severity, Severity::Critical);
//! assert_eq!(record.hostname.as_deref(), Some("mymachine"));
//! ```

mod decode;
mod error;
mod event;
mod port;
mod record;

pub use decode::{MAX_RFC3164_LENGTH, MAX_RFC5424_LENGTH, decode, decode_with_year};
pub use error::{DecodeError, PortParseError};
pub use event::{Envelope, Event};
pub use port::{Port, Transport};
pub use record::{Facility, LogRecord, Severity};

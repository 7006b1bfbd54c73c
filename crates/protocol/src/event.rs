//! Events consumed by the dispatcher
//!
//! Listeners and the sink share one typed channel into the dispatcher, so
//! received records and destination readiness are handled in arrival order.

use std::net::SocketAddr;

use crate::port::Port;
use crate::record::LogRecord;

/// A decoded record together with where it arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Listening port the record arrived on
    pub port: Port,
    /// Sender address
    pub source: SocketAddr,
    pub record: LogRecord,
}

impl Envelope {
    #[inline]
    pub fn new(port: Port, source: SocketAddr, record: LogRecord) -> Self {
        Self {
            port,
            source,
            record,
        }
    }
}

/// Dispatcher input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A record was received by a listener
    Received(Envelope),
    /// The sink can now deliver to the named destination
    DestinationReady(String),
}

impl Event {
    /// Readiness event for a destination
    #[inline]
    pub fn destination_ready(name: impl Into<String>) -> Self {
        Self::DestinationReady(name.into())
    }
}

impl From<Envelope> for Event {
    fn from(envelope: Envelope) -> Self {
        Self::Received(envelope)
    }
}

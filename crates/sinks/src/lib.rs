//! Sysrelay - Sinks
//!
//! Outbound messaging backends. A sink owns a fixed set of destinations,
//! tells the relay when each becomes deliverable, and delivers text to them.
//!
//! ```text
//! [Dispatcher] --send(destination, text)--> [Sink] --> IRC server / stdout
//!      ^                                      |
//!      +------- Event::DestinationReady ------+
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Purpose |
//! |------|---------|
//! | `irc` | Relay into IRC channels, optionally over TLS |
//! | `stdout` | Local echo when no server is configured |

/// IRC sink - one connection, one destination per channel
pub mod irc;

/// Stdout sink - local echo
pub mod stdout;

/// Sink trait and the handle sinks report back through
mod common;

pub use common::{Sink, SinkError, SinkEvents};
pub use irc::{
    IrcSink, IrcSinkConfig, IrcSinkMetrics, IrcSinkMetricsSnapshot, ShutdownPredicate,
    TlsClientConfigBuilder,
};
pub use stdout::{StdoutConfig, StdoutSink, StdoutSinkMetrics};

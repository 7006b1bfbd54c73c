//! sysrelay - Sources
//!
//! Syslog listeners that decode inbound messages and hand them to the
//! dispatcher as [`Event::Received`](sysrelay_protocol::Event) envelopes.
//!
//! # Available Listeners
//!
//! - **UDP** - one message per datagram, several workers per socket
//! - **TCP** - newline-delimited messages, one task per connection
//!
//! # Design Principles
//!
//! - **Bind, then run**: binding is separate from receiving so the process
//!   can fail fast, naming the port, before anything else starts
//! - **Decode at the edge**: undecodable input never reaches the dispatcher
//! - **Cancellation**: every loop observes a shared `CancellationToken`
//!
//! # Example
//!
//! ```ignore
//! use sysrelay_sources::{Listener, ListenerConfig};
//!
//! let listener = Listener::bind(ListenerConfig::with_port("514/udp".parse()?)).await?;
//! tokio::spawn(listener.run(events_tx, cancel.clone()));
//! ```

mod common;
mod error;
pub mod tcp;
pub mod udp;

use std::net::SocketAddr;
use std::sync::Arc;

use sysrelay_protocol::{Event, Port, Transport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use common::{ListenerConfig, ListenerMetrics, ListenerMetricsSnapshot, trim_trailing_newline};
pub use error::ListenerError;
pub use tcp::TcpListener;
pub use udp::UdpListener;

/// A bound listener of either transport
pub enum Listener {
    Udp(UdpListener),
    Tcp(TcpListener),
}

impl Listener {
    /// Bind a listener for the transport of `config.port`
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Bind` naming the port.
    pub async fn bind(config: ListenerConfig) -> Result<Self, ListenerError> {
        match config.transport() {
            Transport::Udp => UdpListener::bind(config).await.map(Self::Udp),
            Transport::Tcp => TcpListener::bind(config).await.map(Self::Tcp),
        }
    }

    pub fn port(&self) -> Port {
        match self {
            Self::Udp(l) => l.port(),
            Self::Tcp(l) => l.port(),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match self {
            Self::Udp(l) => l.local_addr(),
            Self::Tcp(l) => l.local_addr(),
        }
    }

    pub fn metrics(&self) -> &Arc<ListenerMetrics> {
        match self {
            Self::Udp(l) => l.metrics(),
            Self::Tcp(l) => l.metrics(),
        }
    }

    /// Run until cancelled
    pub async fn run(self, events: mpsc::Sender<Event>, cancel: CancellationToken) {
        match self {
            Self::Udp(l) => l.run(events, cancel).await,
            Self::Tcp(l) => l.run(events, cancel).await,
        }
    }
}

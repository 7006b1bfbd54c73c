//! Sink contract shared by all sink implementations

use async_trait::async_trait;
use sysrelay_protocol::Event;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors from starting a sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// `start` was called more than once
    #[error("sink '{0}' was already started")]
    AlreadyStarted(String),

    /// Could not reach the backend
    #[error("connection to {target} failed: {source}")]
    ConnectionFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS could not be set up
    #[error("TLS error: {0}")]
    Tls(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    pub fn connection_failed(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            source,
        }
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }
}

/// An outbound messaging backend
///
/// The destination set is fixed when the sink is built. `start` begins
/// joining; each destination that becomes deliverable is reported exactly
/// once per join through [`SinkEvents::destination_ready`].
#[async_trait]
pub trait Sink: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    /// Begin connecting and joining destinations
    async fn start(&self, events: SinkEvents) -> Result<(), SinkError>;

    /// Deliver text to a destination; best effort, never blocks
    fn send(&self, destination: &str, text: &str);

    /// Close the backend connection, returning once it is closed
    async fn disconnect(&self, reason: &str);
}

/// Handle a sink uses to talk back to the relay
#[derive(Debug, Clone)]
pub struct SinkEvents {
    sender: mpsc::Sender<Event>,
    shutdown: CancellationToken,
}

impl SinkEvents {
    pub fn new(sender: mpsc::Sender<Event>, shutdown: CancellationToken) -> Self {
        Self { sender, shutdown }
    }

    /// Report that `name` can now receive messages
    pub async fn destination_ready(&self, name: &str) {
        if self
            .sender
            .send(Event::destination_ready(name))
            .await
            .is_err()
        {
            tracing::debug!(destination = %name, "dispatcher gone, readiness not reported");
        }
    }

    /// Ask the whole process to shut down
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

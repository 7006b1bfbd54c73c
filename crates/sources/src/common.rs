//! Common types and utilities for listeners

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sysrelay_protocol::{Port, Transport};

// =============================================================================
// Configuration
// =============================================================================

/// Default bind address
const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default maximum syslog message size (8KB)
const DEFAULT_MAX_MESSAGE_SIZE: usize = 8192;

/// Default number of UDP receive workers
const DEFAULT_UDP_WORKERS: usize = 2;

/// Default socket receive buffer size (256KB)
const DEFAULT_SOCKET_BUFFER_SIZE: usize = 256 * 1024;

/// Listener configuration for one port
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub address: String,

    /// Port and transport; also the routing key of received messages
    pub port: Port,

    /// Largest accepted datagram or line
    pub max_message_size: usize,

    /// Receive workers sharing a UDP socket
    pub udp_workers: usize,

    /// Idle timeout for TCP connections (zero = none)
    pub connection_timeout: Duration,

    /// SO_RCVBUF size
    pub socket_buffer_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.into(),
            port: Port::udp(514),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            udp_workers: DEFAULT_UDP_WORKERS,
            connection_timeout: Duration::ZERO,
            socket_buffer_size: DEFAULT_SOCKET_BUFFER_SIZE,
        }
    }
}

impl ListenerConfig {
    /// Create config for a port
    pub fn with_port(port: Port) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port.number())
    }

    #[inline]
    pub fn transport(&self) -> Transport {
        self.port.transport()
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Counters shared by both listener kinds
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    /// Currently open TCP connections
    pub connections_active: AtomicU64,

    /// TCP connections accepted
    pub connections_total: AtomicU64,

    /// Messages decoded and handed to the dispatcher
    pub messages_received: AtomicU64,

    /// Raw bytes read
    pub bytes_received: AtomicU64,

    /// Messages that failed to decode or were oversized
    pub messages_malformed: AtomicU64,

    /// Messages dropped because the dispatcher queue was full
    pub messages_dropped: AtomicU64,

    /// Socket errors
    pub errors: AtomicU64,
}

impl ListenerMetrics {
    pub const fn new() -> Self {
        Self {
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_malformed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn bytes_read(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_malformed(&self) {
        self.messages_malformed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ListenerMetricsSnapshot {
        ListenerMetricsSnapshot {
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_malformed: self.messages_malformed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of listener metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerMetricsSnapshot {
    pub connections_active: u64,
    pub connections_total: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub messages_malformed: u64,
    pub messages_dropped: u64,
    pub errors: u64,
}

// =============================================================================
// Helpers
// =============================================================================

/// Trim trailing newline from message (LF or CRLF)
#[inline]
pub fn trim_trailing_newline(data: &[u8]) -> &[u8] {
    let mut end = data.len();

    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && data[end - 1] == b'\r' {
            end -= 1;
        }
    }

    &data[..end]
}

/// Check if error is a connection reset (expected during shutdown)
pub(crate) fn is_connection_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

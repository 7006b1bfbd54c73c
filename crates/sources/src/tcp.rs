//! Syslog TCP listener
//!
//! Each connection carries newline-delimited messages (LF or CRLF). A line
//! that fails to decode is skipped; the connection stays open. Read errors
//! and idle timeouts close only the affected connection.
//!
//! Unlike UDP, delivery waits for room in the dispatcher queue, pushing back
//! on the sender.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use sysrelay_protocol::{Envelope, Event, Port, decode};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::{ListenerConfig, ListenerMetrics, is_connection_reset, trim_trailing_newline};
use crate::error::ListenerError;

/// Per-connection read buffer (64KB)
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Keepalive idle time (30s)
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// A bound syslog TCP listener
pub struct TcpListener {
    config: ListenerConfig,
    listener: TokioTcpListener,
    metrics: Arc<ListenerMetrics>,
}

impl TcpListener {
    /// Bind the listening socket
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Bind` naming the port.
    pub async fn bind(config: ListenerConfig) -> Result<Self, ListenerError> {
        let bind_addr = config.bind_address();
        let listener = TokioTcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ListenerError::bind(config.port, &bind_addr, e))?;

        tracing::info!(
            port = %config.port,
            address = %bind_addr,
            max_message_size = config.max_message_size,
            "syslog TCP listener bound"
        );

        Ok(Self {
            config,
            listener,
            metrics: Arc::new(ListenerMetrics::new()),
        })
    }

    /// Address actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[inline]
    pub fn port(&self) -> Port {
        self.config.port
    }

    pub fn metrics(&self) -> &Arc<ListenerMetrics> {
        &self.metrics
    }

    /// Accept connections until cancelled
    pub async fn run(self, events: mpsc::Sender<Event>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            configure_socket(&stream);
                            self.metrics.connection_opened();

                            let handler = ConnectionHandler {
                                port: self.config.port,
                                max_message_size: self.config.max_message_size,
                                connection_timeout: self.config.connection_timeout,
                                events: events.clone(),
                                metrics: Arc::clone(&self.metrics),
                                cancel: cancel.clone(),
                                peer,
                            };
                            tokio::spawn(handler.handle(stream));
                        }
                        Err(e) => {
                            self.metrics.error();
                            tracing::warn!(port = %self.config.port, error = %e, "syslog TCP accept error");
                        }
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            port = %self.config.port,
            connections_total = snapshot.connections_total,
            messages_received = snapshot.messages_received,
            messages_malformed = snapshot.messages_malformed,
            "syslog TCP listener stopped"
        );
    }
}

/// Keepalive and nodelay on an accepted connection
fn configure_socket(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }

    let socket = SockRef::from(stream);
    let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_INTERVAL);
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        tracing::debug!(error = %e, "failed to set TCP keepalive");
    }
}

// =============================================================================
// Connection Handler
// =============================================================================

struct ConnectionHandler {
    port: Port,
    max_message_size: usize,
    connection_timeout: Duration,
    events: mpsc::Sender<Event>,
    metrics: Arc<ListenerMetrics>,
    cancel: CancellationToken,
    peer: SocketAddr,
}

impl ConnectionHandler {
    async fn handle(self, stream: TcpStream) {
        tracing::debug!(port = %self.port, peer = %self.peer, "syslog TCP connection opened");

        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, stream);
        let mut line_buf = Vec::with_capacity(self.max_message_size);
        let timeout = (!self.connection_timeout.is_zero()).then_some(self.connection_timeout);

        loop {
            let read_result = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                result = async {
                    let read = read_bounded_line(&mut reader, &mut line_buf, self.max_message_size);
                    match timeout {
                        Some(duration) => tokio::time::timeout(duration, read).await,
                        None => Ok(read.await),
                    }
                } => result,
            };

            match read_result {
                Ok(Ok(ReadLineResult::Line(bytes_read))) => {
                    self.metrics.bytes_read(bytes_read as u64);
                    if !self.process_line(trim_trailing_newline(&line_buf)).await {
                        break;
                    }
                }
                Ok(Ok(ReadLineResult::TooLong)) => {
                    self.metrics.message_malformed();
                    tracing::debug!(
                        port = %self.port,
                        peer = %self.peer,
                        max = self.max_message_size,
                        "syslog message too large, dropped"
                    );
                }
                Ok(Ok(ReadLineResult::Eof)) => break,
                Ok(Err(e)) => {
                    if !is_connection_reset(&e) {
                        self.metrics.error();
                        tracing::debug!(port = %self.port, peer = %self.peer, error = %e, "syslog TCP read error");
                    }
                    break;
                }
                Err(_) => {
                    tracing::debug!(port = %self.port, peer = %self.peer, "syslog TCP connection timeout");
                    break;
                }
            }
        }

        self.metrics.connection_closed();
        tracing::debug!(port = %self.port, peer = %self.peer, "syslog TCP connection closed");
    }

    /// Decode and forward one line; returns false once the dispatcher is gone
    async fn process_line(&self, line: &[u8]) -> bool {
        if line.is_empty() {
            return true;
        }

        let record = match decode(line) {
            Ok(record) => record,
            Err(e) => {
                self.metrics.message_malformed();
                tracing::debug!(port = %self.port, peer = %self.peer, error = %e, "undecodable syslog line skipped");
                return true;
            }
        };

        let event = Event::Received(Envelope::new(self.port, self.peer, record));
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.events.send(event) => {
                if sent.is_ok() {
                    self.metrics.message_received();
                }
                sent.is_ok()
            }
        }
    }
}

// =============================================================================
// Bounded Line Reading
// =============================================================================

/// Result of reading a bounded line
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadLineResult {
    /// A line was read (byte count including the newline)
    Line(usize),
    /// Line exceeded the limit and was consumed and discarded
    TooLong,
    /// End of stream
    Eof,
}

/// Read one line into `buf`, never buffering more than `max_size` bytes
///
/// An overlong line is consumed up to and including its newline so the
/// next read starts on a fresh line. A final line without a newline is
/// returned as a line at EOF.
pub(crate) async fn read_bounded_line<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_size: usize,
) -> io::Result<ReadLineResult> {
    buf.clear();

    let mut total_bytes = 0;
    let mut exceeded_limit = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if total_bytes == 0 {
                return Ok(ReadLineResult::Eof);
            }
            break;
        }

        let (consume, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        if !exceeded_limit {
            // Line content excludes the newline for the limit check
            let content = if done { consume - 1 } else { consume };
            if buf.len() + content <= max_size {
                buf.extend_from_slice(&available[..consume]);
            } else {
                exceeded_limit = true;
                buf.clear();
            }
        }

        total_bytes += consume;
        reader.consume(consume);

        if done {
            break;
        }
    }

    if exceeded_limit {
        return Ok(ReadLineResult::TooLong);
    }
    Ok(ReadLineResult::Line(total_bytes))
}

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tcp_test;
